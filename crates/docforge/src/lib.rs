//! Docforge is a PDF generation library that renders Handlebars HTML
//! templates with typed data models and converts the result to PDF.

pub mod builtin;
pub mod coerce;
pub mod convert;
pub mod error;
pub mod generator;
pub mod locator;
mod macros;
pub mod metrics;
pub mod model;
pub mod render;
pub mod system;
pub mod template;

// Re-export core types
pub use coerce::{
    Coerced, CoercedModel, Coercer, RawPayload, Resolution, Strategy, TypedPayload, coerce,
};
pub use convert::{HtmlPdfConverter, PdfConverter};
pub use error::{
    ConfigError, ConversionError, DataError, DocforgeError, RenderError, Result, TemplateError,
};
pub use generator::{
    FailureKind, GenerationOutcome, GenerationStage, Generator, GeneratorBuilder,
    GeneratorConfig, HealthReport, HealthStatus, TemplateInfo,
};
pub use locator::TemplateLocator;
pub use metrics::{
    GenerationLogEntry, GenerationMetrics, RECENT_CAPACITY, RecentSnapshot, TemplateTiming,
};
pub use model::{Model, ModelBindings, ModelCatalog, ModelDescriptor, ModelResolver, ModelType};
pub use render::{HandlebarsEngine, TemplateEngine};
pub use system::{SystemMetrics, SystemSampler};
pub use template::{BUILTIN_TEMPLATES, TemplateId, TemplateRegistry};

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
