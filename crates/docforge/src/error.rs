//! Error types for the docforge library
//!
//! Errors are organized by domain so callers can tell a missing template
//! apart from a rendering or conversion failure.

use thiserror::Error;

/// Main error type for the docforge library
#[derive(Error, Debug)]
pub enum DocforgeError {
    /// Template-related errors (identifiers, lookup, loading)
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Handlebars compilation and rendering errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// HTML to PDF conversion errors
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Data serialization errors
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Configuration and initialization errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Template-related errors
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template '{id}' does not exist")]
    NotFound { id: String },

    #[error("Template file for '{id}' was not found")]
    FileMissing { id: String },

    #[error("Invalid template identifier '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    #[error("Template file could not be read: {path} - {reason}")]
    Unreadable { path: String, reason: String },
}

/// Handlebars errors, raised either while compiling the template source or
/// while binding data to it
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template '{template}' failed to compile: {message}")]
    Compile { template: String, message: String },

    #[error("Template '{template}' failed to render: {message}")]
    Render { template: String, message: String },

    #[error("Template engine is unavailable: {reason}")]
    Unavailable { reason: String },
}

/// HTML to PDF conversion errors
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("HTML could not be laid out: {message}")]
    Html { message: String },

    #[error("PDF conversion produced no output")]
    EmptyOutput,
}

/// Data serialization errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("JSON serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("JSON deserialization failed: {reason}")]
    Deserialization { reason: String },
}

/// Configuration and initialization errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {setting} - {reason}")]
    InvalidConfig { setting: String, reason: String },
}

/// Shorthand result type for docforge operations
pub type Result<T> = std::result::Result<T, DocforgeError>;

/// Convert std::io::Error to DocforgeError
impl From<std::io::Error> for DocforgeError {
    fn from(error: std::io::Error) -> Self {
        DocforgeError::Template(TemplateError::Unreadable {
            path: "<unknown>".to_string(),
            reason: error.to_string(),
        })
    }
}

/// Convert serde_json::Error to DocforgeError
impl From<serde_json::Error> for DocforgeError {
    fn from(error: serde_json::Error) -> Self {
        let reason = error.to_string();
        if error.is_syntax() || error.is_data() || error.is_eof() {
            DocforgeError::Data(DataError::Deserialization { reason })
        } else {
            DocforgeError::Data(DataError::Serialization { reason })
        }
    }
}

impl DocforgeError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            DocforgeError::Template(e) => e.to_string(),
            DocforgeError::Render(RenderError::Compile { template, .. }) => {
                format!("Template '{}' contains invalid Handlebars syntax", template)
            }
            DocforgeError::Render(e) => e.to_string(),
            DocforgeError::Conversion(_) => {
                "The rendered document could not be converted to PDF".to_string()
            }
            DocforgeError::Data(DataError::Deserialization { .. }) => {
                "Failed to parse data. Please check your JSON format.".to_string()
            }
            DocforgeError::Data(e) => format!("Data error: {}", e),
            DocforgeError::Config(e) => e.to_string(),
        }
    }
}

/// Create a not-found error for a template identifier
pub fn template_not_found<S: Into<String>>(id: S) -> DocforgeError {
    DocforgeError::Template(TemplateError::NotFound { id: id.into() })
}
