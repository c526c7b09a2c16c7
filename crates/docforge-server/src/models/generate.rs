//! Generation request and response models

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use docforge::GenerationOutcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/pdf/generate`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(alias = "template_name")]
    pub template_name: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Pdf,
    Json,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQuery {
    #[serde(default)]
    pub format: ResponseFormat,
}

/// JSON rendition of a successful generation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub id: String,
    pub success: bool,
    pub message: String,
    pub pdf_base64: String,
    pub warnings: Vec<String>,
    pub model: Option<String>,
    pub duration_ms: u64,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            pdf_base64: STANDARD.encode(&outcome.pdf),
            id: outcome.id,
            success: outcome.success,
            message: outcome.message,
            warnings: outcome.warnings,
            model: outcome.model,
            duration_ms: outcome.duration_ms,
        }
    }
}
