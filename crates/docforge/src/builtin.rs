//! Models for the built-in templates

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::model::ModelCatalog;

static BUILTIN_CATALOG: Lazy<ModelCatalog> = Lazy::new(|| {
    crate::model_catalog![
        InvoiceInstance,
        ReceiptInstance,
        WelcomeInstance,
        MonthlySummaryInstance,
    ]
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceInstance {
    pub invoice_number: String,
    pub customer_name: String,
    pub amount: f64,
    pub currency: String,
    pub issued_at: Option<String>,
    pub due_date: Option<String>,
    pub items: Vec<LineItem>,
    pub notes: Option<String>,
}

crate::impl_model!(InvoiceInstance in "Invoices");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptInstance {
    pub receipt_number: String,
    pub customer_name: String,
    pub amount: f64,
    pub payment_method: String,
    pub paid_at: Option<String>,
}

crate::impl_model!(ReceiptInstance in "Invoices");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WelcomeInstance {
    pub recipient_name: String,
    pub company_name: String,
    pub start_date: Option<String>,
    pub sender_name: String,
}

crate::impl_model!(WelcomeInstance in "Letters");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthlySummaryInstance {
    pub month: String,
    pub total_revenue: f64,
    pub total_orders: u64,
    pub highlights: Vec<String>,
}

crate::impl_model!(MonthlySummaryInstance in "Reports");

/// Catalog of every built-in model
pub fn catalog() -> ModelCatalog {
    BUILTIN_CATALOG.clone()
}
