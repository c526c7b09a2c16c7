//! Data models and their binding to templates
//!
//! Models are declared up front in a [`ModelCatalog`]. A [`ModelResolver`]
//! binds each registered template to at most one model, either from an
//! explicit binding or by naming convention over the catalog, and produces
//! the read-only [`ModelBindings`] table used for the rest of the process.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::coerce::{CoercedModel, RawPayload, coerce};
use crate::template::{TemplateId, TemplateRegistry};

/// Suffix appended to a template's base name to form the model type name
pub const DEFAULT_MODEL_SUFFIX: &str = "Instance";

/// A strongly-typed shape a template renders from
pub trait Model: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Simple type name, e.g. `InvoiceInstance`
    const NAME: &'static str;

    /// `::`-separated namespace, e.g. `Invoices` or `Reports::Finance`
    const NAMESPACE: &'static str;

    /// Value used when no coercion strategy succeeds.
    ///
    /// Returning `None` makes coercion hand back the original payload.
    fn fallback() -> Option<Self> {
        Some(Self::default())
    }
}

/// Type-erased handle to a [`Model`]
pub trait ModelDescriptor: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn namespace(&self) -> &'static str;

    fn qualified_name(&self) -> String {
        match self.namespace() {
            "" => self.name().to_string(),
            namespace => format!("{}::{}", namespace, self.name()),
        }
    }

    fn coerce(&self, raw: RawPayload) -> CoercedModel;
}

/// Descriptor for the model type `T`
pub struct ModelType<T>(PhantomData<fn() -> T>);

impl<T: Model> ModelType<T> {
    pub fn new() -> Self {
        ModelType(PhantomData)
    }

    pub fn shared() -> Arc<dyn ModelDescriptor> {
        Arc::new(Self::new())
    }
}

impl<T: Model> Default for ModelType<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Model> fmt::Debug for ModelType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelType").field(&self.qualified_name()).finish()
    }
}

impl<T: Model> ModelDescriptor for ModelType<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn namespace(&self) -> &'static str {
        T::NAMESPACE
    }

    fn coerce(&self, raw: RawPayload) -> CoercedModel {
        coerce::<T>(raw).into_model()
    }
}

/// The declared set of model types, ordered by qualified name
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<Arc<dyn ModelDescriptor>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self { models: Vec::new() }
    }

    /// Declare a model type. Declaring the same qualified name twice keeps
    /// the first declaration.
    pub fn register<T: Model>(&mut self) -> &mut Self {
        self.register_descriptor(ModelType::<T>::shared())
    }

    pub fn register_descriptor(&mut self, descriptor: Arc<dyn ModelDescriptor>) -> &mut Self {
        let qualified = descriptor.qualified_name();
        if self.find(&qualified).is_some() {
            debug!(model = %qualified, "model already declared");
            return self;
        }
        let at = self
            .models
            .partition_point(|m| m.qualified_name() < qualified);
        self.models.insert(at, descriptor);
        self
    }

    pub fn with<T: Model>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Catalog of the built-in models
    pub fn builtin() -> Self {
        crate::builtin::catalog()
    }

    /// Look up a model by qualified name (case-insensitive)
    pub fn find(&self, qualified: &str) -> Option<&Arc<dyn ModelDescriptor>> {
        self.models
            .iter()
            .find(|m| m.qualified_name().eq_ignore_ascii_case(qualified))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ModelDescriptor>> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Binds templates to models.
///
/// Explicit bindings always win. Otherwise the candidate type name is the
/// template's base name plus the suffix, and candidates are matched in tiers:
/// namespace equal to the template's full category, equal to its leading
/// segment, nested under either, and finally the simple name alone. Ties
/// within a tier go to the first model by qualified name.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    catalog: ModelCatalog,
    suffix: String,
    explicit: HashMap<TemplateId, Arc<dyn ModelDescriptor>>,
}

impl ModelResolver {
    pub fn new(catalog: ModelCatalog) -> Self {
        Self {
            catalog,
            suffix: DEFAULT_MODEL_SUFFIX.to_string(),
            explicit: HashMap::new(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Declare the model for a template explicitly
    pub fn bind<T: Model>(self, id: TemplateId) -> Self {
        self.bind_descriptor(id, ModelType::<T>::shared())
    }

    pub fn bind_descriptor(mut self, id: TemplateId, descriptor: Arc<dyn ModelDescriptor>) -> Self {
        self.explicit.insert(id, descriptor);
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Resolve the model for one template, `None` if nothing matches
    pub fn resolve(&self, id: &TemplateId) -> Option<Arc<dyn ModelDescriptor>> {
        if let Some(descriptor) = self.explicit.get(id) {
            return Some(Arc::clone(descriptor));
        }

        let type_name = format!("{}{}", id.base_name(), self.suffix);
        let namespaces = candidate_namespaces(id);

        let named: Vec<&Arc<dyn ModelDescriptor>> = self
            .catalog
            .iter()
            .filter(|m| m.name().eq_ignore_ascii_case(&type_name))
            .collect();

        let mut tiers: Vec<Vec<&Arc<dyn ModelDescriptor>>> = namespaces
            .iter()
            .map(|candidate| {
                named
                    .iter()
                    .copied()
                    .filter(|m| normalize_namespace(m.namespace()) == *candidate)
                    .collect()
            })
            .collect();
        tiers.push(
            named
                .iter()
                .copied()
                .filter(|m| {
                    let ns = normalize_namespace(m.namespace());
                    namespaces
                        .iter()
                        .any(|candidate| ns.starts_with(&format!("{candidate}::")))
                })
                .collect(),
        );
        tiers.push(named);

        let matches = tiers.into_iter().find(|tier| !tier.is_empty())?;
        if matches.len() > 1 {
            let candidates: Vec<String> = matches.iter().map(|m| m.qualified_name()).collect();
            warn!(
                template = %id,
                chosen = %candidates[0],
                candidates = ?candidates,
                "ambiguous model binding, using first by qualified name"
            );
        }
        matches.first().map(|m| Arc::clone(*m))
    }

    /// Resolve every registered template once
    pub fn build(&self, registry: &TemplateRegistry) -> ModelBindings {
        let mut bindings = HashMap::new();
        for id in registry.all() {
            match self.resolve(id) {
                Some(descriptor) => {
                    debug!(template = %id, model = %descriptor.qualified_name(), "model bound");
                    bindings.insert(id.clone(), descriptor);
                }
                None => debug!(template = %id, "no model bound"),
            }
        }
        ModelBindings { bindings }
    }
}

/// Read-only template to model table built at startup
#[derive(Debug, Clone, Default)]
pub struct ModelBindings {
    bindings: HashMap<TemplateId, Arc<dyn ModelDescriptor>>,
}

impl ModelBindings {
    pub fn get(&self, id: &str) -> Option<&Arc<dyn ModelDescriptor>> {
        self.bindings.get(id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// `Reports/Finance/Monthly` yields `reports::finance` and `reports`
fn candidate_namespaces(id: &TemplateId) -> Vec<String> {
    let Some(category) = id.category() else {
        return Vec::new();
    };
    let full = normalize_namespace(category);
    let mut namespaces = vec![full.clone()];
    if let Some(leading) = id.segments().next().map(normalize_namespace) {
        if leading != full {
            namespaces.push(leading);
        }
    }
    namespaces
}

fn normalize_namespace(namespace: &str) -> String {
    namespace
        .split(['/', '.', ':'])
        .filter(|segment| !segment.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("::")
}
