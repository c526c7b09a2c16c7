//! Render and convert orchestration
//!
//! A [`Generator`] owns the immutable lookup tables built at startup (the
//! template registry, the file locator and the model bindings) together
//! with the rendering seams and a shared metrics store. Each call to
//! [`Generator::generate`] walks the stages below and always ends in a
//! [`GenerationOutcome`], never an `Err`:
//!
//! ```text
//! Validating -> Resolving -> Coercing -> Rendering -> Converting -> Done
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::coerce::{CoercedModel, RawPayload, Resolution};
use crate::convert::{HtmlPdfConverter, PdfConverter};
use crate::error::{DocforgeError, TemplateError, template_not_found};
use crate::locator::{DEFAULT_EXTENSION, TemplateLocator};
use crate::metrics::{GenerationLogEntry, GenerationMetrics, TemplateTiming};
use crate::model::{DEFAULT_MODEL_SUFFIX, ModelBindings, ModelCatalog, ModelResolver};
use crate::render::{HandlebarsEngine, TemplateEngine};
use crate::system::{SystemMetrics, SystemSampler};
use crate::template::{TemplateId, TemplateRegistry};

/// Default deadline for the render and convert step
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Library-side settings for a [`Generator`]
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root directory searched for template files
    pub templates_dir: PathBuf,
    /// Template file extension, without the leading dot
    pub extension: String,
    /// Suffix appended to a template's base name to find its model
    pub model_suffix: String,
    pub render_timeout: Duration,
}

impl GeneratorConfig {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_model_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.model_suffix = suffix.into();
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            extension: DEFAULT_EXTENSION.to_string(),
            model_suffix: DEFAULT_MODEL_SUFFIX.to_string(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }
}

/// Position of a generation in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStage {
    NotStarted,
    Validating,
    Resolving,
    Coercing,
    Rendering,
    Converting,
    Done,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStage::NotStarted => "not-started",
            GenerationStage::Validating => "validating",
            GenerationStage::Resolving => "resolving",
            GenerationStage::Coercing => "coercing",
            GenerationStage::Rendering => "rendering",
            GenerationStage::Converting => "converting",
            GenerationStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a generation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    TemplateNotFound,
    TemplateFileMissing,
    Rendering,
    Conversion,
    Timeout,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TemplateNotFound => "template-not-found",
            FailureKind::TemplateFileMissing => "template-file-missing",
            FailureKind::Rendering => "rendering",
            FailureKind::Conversion => "conversion",
            FailureKind::Timeout => "timeout",
            FailureKind::Internal => "internal",
        }
    }

    /// The stage a failure of this kind is raised from
    pub fn stage(&self) -> GenerationStage {
        match self {
            FailureKind::TemplateNotFound | FailureKind::TemplateFileMissing => {
                GenerationStage::Validating
            }
            FailureKind::Rendering | FailureKind::Timeout | FailureKind::Internal => {
                GenerationStage::Rendering
            }
            FailureKind::Conversion => GenerationStage::Converting,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&DocforgeError> for FailureKind {
    fn from(error: &DocforgeError) -> Self {
        match error {
            DocforgeError::Template(TemplateError::NotFound { .. }) => FailureKind::TemplateNotFound,
            DocforgeError::Template(TemplateError::FileMissing { .. }) => {
                FailureKind::TemplateFileMissing
            }
            DocforgeError::Render(_) => FailureKind::Rendering,
            DocforgeError::Conversion(_) => FailureKind::Conversion,
            _ => FailureKind::Internal,
        }
    }
}

/// Terminal result of one generation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    /// Id of the log entry recorded for this attempt
    pub id: String,
    pub template: String,
    pub success: bool,
    /// PDF bytes, empty on failure
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub message: String,
    pub failure: Option<FailureKind>,
    pub warnings: Vec<String>,
    /// Qualified name of the model the payload was coerced into
    pub model: Option<String>,
    pub duration_ms: u64,
}

impl GenerationOutcome {
    /// Stage the generation stopped in
    pub fn stage(&self) -> GenerationStage {
        match self.failure {
            Some(kind) => kind.stage(),
            None => GenerationStage::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Snapshot of the generator's state for health endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: &'static str,
    pub template_count: usize,
    pub available_templates: Vec<String>,
    pub pdfs_generated: u64,
    pub errors_logged: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_generation_time: Option<OffsetDateTime>,
    pub last_generation_status: Option<String>,
    pub recent_generations: Vec<GenerationLogEntry>,
    pub template_timings: BTreeMap<String, TemplateTiming>,
    pub requests_in_flight: u64,
    pub uptime_seconds: u64,
    pub system: SystemMetrics,
}

/// A registered template with its resolved file and model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub id: String,
    pub path: Option<String>,
    pub model: Option<String>,
}

struct Failure {
    kind: FailureKind,
    message: String,
}

impl Failure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<DocforgeError> for Failure {
    fn from(error: DocforgeError) -> Self {
        let message = match &error {
            DocforgeError::Template(inner) => inner.to_string(),
            other => other.to_string(),
        };
        Failure::new(FailureKind::from(&error), message)
    }
}

struct Rendered {
    pdf: Vec<u8>,
    model: Option<String>,
}

/// Template to PDF pipeline
pub struct Generator {
    config: GeneratorConfig,
    registry: Arc<TemplateRegistry>,
    locator: TemplateLocator,
    bindings: ModelBindings,
    engine: Arc<dyn TemplateEngine>,
    converter: Arc<dyn PdfConverter>,
    metrics: Arc<GenerationMetrics>,
    sampler: SystemSampler,
}

impl Generator {
    /// Generator over the built-in templates and models
    pub fn new(config: GeneratorConfig) -> Self {
        GeneratorBuilder::new(config).build()
    }

    pub fn builder(config: GeneratorConfig) -> GeneratorBuilder {
        GeneratorBuilder::new(config)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn locator(&self) -> &TemplateLocator {
        &self.locator
    }

    pub fn bindings(&self) -> &ModelBindings {
        &self.bindings
    }

    pub fn metrics(&self) -> &Arc<GenerationMetrics> {
        &self.metrics
    }

    /// Render `template` with `data` and convert the HTML to PDF
    pub async fn generate(&self, template: &str, data: impl Into<RawPayload>) -> GenerationOutcome {
        let started = Instant::now();
        self.metrics.request_started();

        let mut warnings = Vec::new();
        let result = self.run(template, data.into(), &mut warnings).await;
        let elapsed = started.elapsed();

        match result {
            Ok(rendered) => {
                let entry = self.metrics.record_success(
                    template,
                    elapsed,
                    format!("PDF generated successfully for template '{}'", template),
                );
                info!(
                    template,
                    bytes = rendered.pdf.len(),
                    duration_ms = entry.duration_ms,
                    "PDF generated"
                );
                GenerationOutcome {
                    id: entry.id,
                    template: template.to_string(),
                    success: true,
                    pdf: rendered.pdf,
                    message: entry.message,
                    failure: None,
                    warnings,
                    model: rendered.model,
                    duration_ms: entry.duration_ms,
                }
            }
            Err(failure) => {
                let entry = self.metrics.record_failure(template, elapsed, failure.message);
                match failure.kind {
                    FailureKind::TemplateNotFound | FailureKind::TemplateFileMissing => {
                        warn!(template, kind = %failure.kind, "{}", entry.message)
                    }
                    _ => error!(template, kind = %failure.kind, "{}", entry.message),
                }
                GenerationOutcome {
                    id: entry.id,
                    template: template.to_string(),
                    success: false,
                    pdf: Vec::new(),
                    message: entry.message,
                    failure: Some(failure.kind),
                    warnings,
                    model: None,
                    duration_ms: entry.duration_ms,
                }
            }
        }
    }

    async fn run(
        &self,
        template: &str,
        payload: RawPayload,
        warnings: &mut Vec<String>,
    ) -> Result<Rendered, Failure> {
        debug!(template, stage = %GenerationStage::Validating);
        let id = self
            .registry
            .get(template)
            .cloned()
            .ok_or_else(|| template_not_found(template))?;
        let path = self
            .locator
            .resolve_async(id.as_str())
            .await
            .ok_or_else(|| DocforgeError::from(TemplateError::FileMissing { id: id.to_string() }))?;
        let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Failure::new(
                FailureKind::Internal,
                TemplateError::Unreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .to_string(),
            )
        })?;

        debug!(template, stage = %GenerationStage::Resolving);
        let descriptor = self.bindings.get(id.as_str()).cloned();

        debug!(template, stage = %GenerationStage::Coercing, payload = payload.kind());
        let coerced = match &descriptor {
            Some(descriptor) => descriptor.coerce(payload),
            None => {
                warn!(template, "no model bound, rendering the payload as-is");
                warnings.push(format!(
                    "No model type is bound to template '{}'; the payload was rendered as-is",
                    id
                ));
                CoercedModel::raw(payload)
            }
        };
        let model = descriptor.as_ref().map(|d| d.qualified_name());
        if let (Some(name), resolution) = (&model, coerced.resolution) {
            match resolution {
                Resolution::Defaulted => warnings.push(format!(
                    "The payload could not be converted to {}; default values were rendered",
                    name
                )),
                Resolution::Uncoerced => warnings.push(format!(
                    "The payload could not be converted to {}; it was rendered as-is",
                    name
                )),
                Resolution::Strategy(_) => {}
            }
        }

        let pdf = self.render_and_convert(&id, source, coerced).await?;
        Ok(Rendered { pdf, model })
    }

    async fn render_and_convert(
        &self,
        id: &TemplateId,
        source: String,
        coerced: CoercedModel,
    ) -> Result<Vec<u8>, Failure> {
        let engine = Arc::clone(&self.engine);
        let converter = Arc::clone(&self.converter);
        let key = id.to_string();

        let task = tokio::task::spawn_blocking(move || {
            debug!(template = %key, stage = %GenerationStage::Rendering);
            let html = engine.render(&key, &source, &coerced.value)?;
            debug!(template = %key, stage = %GenerationStage::Converting, html_bytes = html.len());
            converter.convert(&html)
        });

        // On expiry the blocking task is detached and its result dropped
        match tokio::time::timeout(self.config.render_timeout, task).await {
            Err(_) => Err(Failure::new(
                FailureKind::Timeout,
                format!(
                    "Generation of template '{}' timed out after {} ms",
                    id,
                    self.config.render_timeout.as_millis()
                ),
            )),
            Ok(Err(join_error)) => Err(Failure::new(
                FailureKind::Internal,
                format!("Render task for template '{}' failed: {}", id, join_error),
            )),
            Ok(Ok(result)) => result.map_err(Failure::from),
        }
    }

    /// Registered templates with their resolved files and models
    pub fn templates(&self) -> Vec<TemplateInfo> {
        self.registry
            .all()
            .map(|id| TemplateInfo {
                id: id.to_string(),
                path: self
                    .locator
                    .resolve(id.as_str())
                    .map(|path| path.display().to_string()),
                model: self
                    .bindings
                    .get(id.as_str())
                    .map(|descriptor| descriptor.qualified_name()),
            })
            .collect()
    }

    pub fn health(&self) -> HealthReport {
        let recent = self.metrics.recent_snapshot();
        let status = match recent.entries.last() {
            Some(entry) if !entry.success => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        };

        HealthReport {
            status,
            version: crate::version(),
            template_count: self.registry.count(),
            available_templates: self.registry.all().map(|id| id.to_string()).collect(),
            pdfs_generated: self.metrics.pdfs_generated(),
            errors_logged: self.metrics.errors_logged(),
            last_generation_time: recent.last_success,
            last_generation_status: recent.last_status,
            recent_generations: recent.entries,
            template_timings: self.metrics.template_timings(),
            requests_in_flight: self.metrics.in_flight(),
            uptime_seconds: self.metrics.uptime().as_secs(),
            system: self.sampler.sample(),
        }
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("config", &self.config)
            .field("templates", &self.registry.count())
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Generator`], every part defaults to the built-in one
pub struct GeneratorBuilder {
    config: GeneratorConfig,
    registry: Option<TemplateRegistry>,
    resolver: Option<ModelResolver>,
    engine: Option<Arc<dyn TemplateEngine>>,
    converter: Option<Arc<dyn PdfConverter>>,
    metrics: Option<Arc<GenerationMetrics>>,
}

impl GeneratorBuilder {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            registry: None,
            resolver: None,
            engine: None,
            converter: None,
            metrics: None,
        }
    }

    pub fn registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a custom resolver; the configured model suffix is not applied to it
    pub fn resolver(mut self, resolver: ModelResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    pub fn converter(mut self, converter: impl PdfConverter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Share an existing metrics store
    pub fn metrics(mut self, metrics: Arc<GenerationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Generator {
        let registry = Arc::new(self.registry.unwrap_or_else(TemplateRegistry::builtin));
        let resolver = self.resolver.unwrap_or_else(|| {
            ModelResolver::new(ModelCatalog::builtin()).with_suffix(self.config.model_suffix.clone())
        });
        let bindings = resolver.build(&registry);
        let locator = TemplateLocator::new(&self.config.templates_dir, Arc::clone(&registry))
            .with_extension(&self.config.extension);

        info!(
            templates = registry.count(),
            bound = bindings.len(),
            root = %locator.root().display(),
            "generator initialized"
        );

        Generator {
            config: self.config,
            registry,
            locator,
            bindings,
            engine: self
                .engine
                .unwrap_or_else(|| Arc::new(HandlebarsEngine::new())),
            converter: self
                .converter
                .unwrap_or_else(|| Arc::new(HtmlPdfConverter::new())),
            metrics: self
                .metrics
                .unwrap_or_else(|| Arc::new(GenerationMetrics::new())),
            sampler: SystemSampler::new(),
        }
    }
}
