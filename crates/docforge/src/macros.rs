//! Macros for declaring models and catalogs

/// Implement [`Model`](crate::Model) for a type, naming its namespace
///
/// # Examples
///
/// ```rust
/// use docforge::impl_model;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// pub struct PayslipInstance {
///     pub employee: String,
/// }
///
/// impl_model!(PayslipInstance in "Payroll");
/// ```
#[macro_export]
macro_rules! impl_model {
    ($model:ident in $namespace:expr) => {
        impl $crate::Model for $model {
            const NAME: &'static str = stringify!($model);
            const NAMESPACE: &'static str = $namespace;
        }
    };
}

/// Build a [`ModelCatalog`](crate::ModelCatalog) from a list of model types
///
/// # Examples
///
/// ```rust
/// use docforge::model_catalog;
/// use docforge::builtin::{InvoiceInstance, ReceiptInstance};
///
/// let catalog = model_catalog![InvoiceInstance, ReceiptInstance];
/// assert_eq!(catalog.len(), 2);
/// ```
#[macro_export]
macro_rules! model_catalog {
    () => {
        $crate::ModelCatalog::new()
    };

    ($($model:ty),+ $(,)?) => {
        {
            let mut catalog = $crate::ModelCatalog::new();
            $(
                catalog.register::<$model>();
            )+
            catalog
        }
    };
}
