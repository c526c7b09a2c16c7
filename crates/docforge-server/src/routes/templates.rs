//! Template listing routes

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use docforge::TemplateInfo;
use tracing::debug;

use crate::{
    AppState,
    error::{ApiError, Result},
    models::ApiResponse,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_templates))
}

/// List registered templates with their resolved files and models
async fn list_templates(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<TemplateInfo>>>> {
    // Resolving files probes the file system
    let generator = Arc::clone(&state.generator);
    let templates = tokio::task::spawn_blocking(move || generator.templates())
        .await
        .map_err(|e| ApiError::internal(&format!("template listing failed: {}", e)))?;
    debug!("Listing {} templates", templates.len());

    let message = format!("{} templates available", templates.len());
    Ok(Json(ApiResponse::with_message(templates, message)))
}
