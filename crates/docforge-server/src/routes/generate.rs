//! PDF generation routes

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{
        HeaderName, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::post,
};
use docforge::{GenerationOutcome, RawPayload};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    AppState,
    error::{ApiError, Result},
    models::{GenerateQuery, GenerateRequest, GenerateResponse, ResponseFormat},
};

/// Carries generation warnings on PDF responses
pub const WARNING_HEADER: HeaderName = HeaderName::from_static("x-docforge-warning");

/// Id of the generation log entry
pub const GENERATION_ID_HEADER: HeaderName = HeaderName::from_static("x-generation-id");

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/generate/{*template}", post(generate_by_path))
}

/// Generate a PDF from `{ templateName, data }`
async fn generate(
    State(state): State<AppState>,
    query: std::result::Result<Query<GenerateQuery>, QueryRejection>,
    request: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    let Json(request) = request.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    debug!("Generating '{}' ({:?})", request.template_name, query.format);

    let data = match request.data {
        Value::Null => Value::Object(Map::new()),
        data => data,
    };
    let outcome = state
        .generator
        .generate(&request.template_name, data)
        .await;

    respond(outcome, query.format)
}

/// Generate a PDF for the template named by the path, the body being the data
async fn generate_by_path(
    State(state): State<AppState>,
    Path(template): Path<String>,
    query: std::result::Result<Query<GenerateQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    debug!("Generating '{}' from a {} byte document", template, body.len());

    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        RawPayload::Json(Value::Object(Map::new()))
    } else {
        RawPayload::Document(body.to_vec())
    };
    let outcome = state.generator.generate(&template, payload).await;

    respond(outcome, query.format)
}

fn respond(outcome: GenerationOutcome, format: ResponseFormat) -> Result<Response> {
    if !outcome.success {
        return Err(ApiError::from(outcome));
    }
    info!(
        "Generated '{}' ({} bytes) in {}ms",
        outcome.template,
        outcome.pdf.len(),
        outcome.duration_ms
    );

    match format {
        ResponseFormat::Json => Ok(Json(GenerateResponse::from(outcome)).into_response()),
        ResponseFormat::Pdf => pdf_response(outcome),
    }
}

fn pdf_response(outcome: GenerationOutcome) -> Result<Response> {
    let base_name = outcome
        .template
        .rsplit('/')
        .next()
        .unwrap_or(outcome.template.as_str());

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/pdf")
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.pdf\"", header_safe(base_name)),
        )
        .header(GENERATION_ID_HEADER, header_safe(&outcome.id));

    if !outcome.warnings.is_empty() {
        response = response.header(WARNING_HEADER, header_safe(&outcome.warnings.join("; ")));
    }

    response
        .body(Body::from(outcome.pdf))
        .map_err(|e| ApiError::internal(&format!("failed to build PDF response: {}", e)))
}

// Header values must be visible ASCII
fn header_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect()
}
