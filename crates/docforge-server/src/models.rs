//! API models for requests and responses

pub mod api;
pub mod generate;

// Re-export commonly used types
pub use api::*;
pub use generate::*;
