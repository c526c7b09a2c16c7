//! Health check route

use std::sync::Arc;

use axum::{Json, extract::State};
use docforge::HealthReport;

use crate::{
    AppState,
    error::{ApiError, Result},
};

/// Generation statistics and host resource usage
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthReport>> {
    let generator = Arc::clone(&state.generator);
    let report = tokio::task::spawn_blocking(move || generator.health())
        .await
        .map_err(|e| ApiError::internal(&format!("health sampling failed: {}", e)))?;
    Ok(Json(report))
}
