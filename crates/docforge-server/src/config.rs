//! Server configuration management

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use docforge::GeneratorConfig;

use crate::error::{ApiError, Result};

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Root directory of the template files
    pub templates_dir: PathBuf,

    /// Template file extension
    pub template_extension: String,

    /// Suffix used to match templates to model types
    pub model_suffix: String,

    /// Template ids registered in addition to the built-in ones
    pub extra_templates: Vec<String>,

    /// Deadline for rendering and converting one document, in seconds
    pub render_timeout_seconds: u64,

    /// Largest accepted request body
    pub max_body_bytes: usize,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(&var, "PORT", defaults.port)?,
            templates_dir: var("TEMPLATES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.templates_dir),
            template_extension: var("TEMPLATE_EXTENSION").unwrap_or(defaults.template_extension),
            model_suffix: var("MODEL_SUFFIX").unwrap_or(defaults.model_suffix),
            extra_templates: var("EXTRA_TEMPLATES")
                .map(|s| list(&s))
                .unwrap_or(defaults.extra_templates),
            render_timeout_seconds: parse(
                &var,
                "RENDER_TIMEOUT_SECONDS",
                defaults.render_timeout_seconds,
            )?,
            max_body_bytes: parse(&var, "MAX_BODY_BYTES", defaults.max_body_bytes)?,
            cors_origins: var("CORS_ORIGINS")
                .map(|s| list(&s))
                .unwrap_or(defaults.cors_origins),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ApiError::Config(format!("Invalid HOST value: {}", self.host)))
    }

    /// Library settings derived from this configuration
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new(&self.templates_dir)
            .with_extension(&self.template_extension)
            .with_model_suffix(&self.model_suffix)
            .with_render_timeout(Duration::from_secs(self.render_timeout_seconds))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            templates_dir: PathBuf::from("templates"),
            template_extension: "hbs".to_string(),
            model_suffix: "Instance".to_string(),
            extra_templates: Vec::new(),
            render_timeout_seconds: 30,
            max_body_bytes: 10 * 1024 * 1024,
            cors_origins: vec!["*".to_string()],
        }
    }
}

fn parse<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ApiError::Config(format!("Invalid {} value", key))),
        None => Ok(default),
    }
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
