//! Docforge HTTP API
//!
//! Exposes PDF generation, the template listing and a health report over
//! axum. The binary in `main.rs` wires this router to a TCP listener.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::get,
};
use docforge::{Generator, TemplateRegistry};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod models;
pub mod routes;

use config::ServerConfig;
use error::{ApiError, Result};
use routes::generate::{GENERATION_ID_HEADER, WARNING_HEADER};

/// Main application state
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<Generator>,
    pub config: ServerConfig,
}

impl AppState {
    /// Build the generator described by `config`
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let registry = TemplateRegistry::builtin()
            .with_extra(&config.extra_templates)
            .map_err(|e| ApiError::Config(e.user_message()))?;
        let generator = Generator::builder(config.generator_config())
            .registry(registry)
            .build();

        let missing: Vec<String> = generator
            .templates()
            .into_iter()
            .filter(|t| t.path.is_none())
            .map(|t| t.id)
            .collect();
        if !missing.is_empty() {
            warn!("Templates without a file under {}: {:?}", config.templates_dir.display(), missing);
        }
        info!("Loaded {} templates", generator.registry().count());

        Ok(Self {
            generator: Arc::new(generator),
            config,
        })
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let body_limit = state.config.max_body_bytes;

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // API routes
        .nest("/api", api_routes())
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// API routes
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/pdf", routes::generate::router())
        .nest("/templates", routes::templates::router())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive().expose_headers([WARNING_HEADER, GENERATION_ID_HEADER]);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([WARNING_HEADER, GENERATION_ID_HEADER])
}
