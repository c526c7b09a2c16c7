//! HTML rendering of templates
//!
//! The [`TemplateEngine`] trait is the seam to the templating library. The
//! default implementation compiles Handlebars templates by key and keeps
//! them registered until their source text changes.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, no_escape,
};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::error::{RenderError, Result};

/// Renders a named template source with a data context into HTML
pub trait TemplateEngine: Send + Sync {
    fn render(&self, key: &str, source: &str, context: &Value) -> Result<String>;
}

struct Compiled {
    handlebars: Handlebars<'static>,
    digests: HashMap<String, u64>,
}

/// Handlebars-backed [`TemplateEngine`]
pub struct HandlebarsEngine {
    compiled: RwLock<Compiled>,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        handlebars.register_helper("money", Box::new(money_helper));
        handlebars.register_helper("multiply", Box::new(multiply_helper));
        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));
        handlebars.register_helper("date", Box::new(date_helper));

        Self {
            compiled: RwLock::new(Compiled {
                handlebars,
                digests: HashMap::new(),
            }),
        }
    }

    /// Disable HTML escaping, for templates that emit trusted markup only
    pub fn without_escaping(self) -> Self {
        if let Ok(mut compiled) = self.compiled.write() {
            compiled.handlebars.register_escape_fn(no_escape);
        }
        self
    }

    /// Whether `key` is compiled from exactly `source`
    pub fn is_compiled(&self, key: &str, source: &str) -> bool {
        self.compiled
            .read()
            .map(|compiled| compiled.digests.get(key) == Some(&digest(source)))
            .unwrap_or(false)
    }

    fn ensure_compiled(&self, key: &str, source: &str) -> Result<()> {
        if self.is_compiled(key, source) {
            return Ok(());
        }

        let mut compiled = self.compiled.write().map_err(|_| RenderError::Unavailable {
            reason: "template cache lock poisoned".to_string(),
        })?;
        compiled
            .handlebars
            .register_template_string(key, source)
            .map_err(|e| RenderError::Compile {
                template: key.to_string(),
                message: e.to_string(),
            })?;
        compiled.digests.insert(key.to_string(), digest(source));
        debug!(template = key, "template compiled");
        Ok(())
    }
}

impl Default for HandlebarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn render(&self, key: &str, source: &str, context: &Value) -> Result<String> {
        self.ensure_compiled(key, source)?;

        let compiled = self.compiled.read().map_err(|_| RenderError::Unavailable {
            reason: "template cache lock poisoned".to_string(),
        })?;
        let html = compiled
            .handlebars
            .render(key, context)
            .map_err(|e| RenderError::Render {
                template: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(html)
    }
}

fn digest(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

fn number_param(h: &Helper, index: usize) -> f64 {
    match h.param(index).map(|p| p.value()) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// `{{money amount}}` formats a number with two decimals
fn money_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&format!("{:.2}", number_param(h, 0)))?;
    Ok(())
}

/// `{{multiply quantity unitPrice}}` formats the product with two decimals
fn multiply_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&format!("{:.2}", number_param(h, 0) * number_param(h, 1)))?;
    Ok(())
}

fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&param.to_uppercase())?;
    Ok(())
}

fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&param.to_lowercase())?;
    Ok(())
}

/// `{{date issuedAt}}` prints the calendar date of an RFC 3339 timestamp,
/// anything else is printed unchanged
fn date_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    match OffsetDateTime::parse(param, &Rfc3339) {
        Ok(timestamp) => out.write(&timestamp.date().to_string())?,
        Err(_) => out.write(param)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_with_helpers() {
        let engine = HandlebarsEngine::new();
        let html = engine
            .render(
                "Invoice",
                "<p>{{upper customerName}} owes {{money amount}} since {{date issuedAt}}; {{multiply 3 2.5}}</p>",
                &json!({
                    "customerName": "John Doe",
                    "amount": 100,
                    "issuedAt": "2024-03-05T10:00:00Z"
                }),
            )
            .unwrap();
        assert_eq!(html, "<p>JOHN DOE owes 100.00 since 2024-03-05; 7.50</p>");
    }

    #[test]
    fn escapes_html_by_default() {
        let engine = HandlebarsEngine::new();
        let html = engine
            .render("x", "{{name}}", &json!({ "name": "<b>" }))
            .unwrap();
        assert_eq!(html, "&lt;b&gt;");

        let raw = HandlebarsEngine::new().without_escaping();
        assert_eq!(raw.render("x", "{{name}}", &json!({ "name": "<b>" })).unwrap(), "<b>");
    }

    #[test]
    fn recompiles_when_source_changes() {
        let engine = HandlebarsEngine::new();
        assert_eq!(engine.render("greet", "Hi {{n}}", &json!({"n": 1})).unwrap(), "Hi 1");
        assert!(engine.is_compiled("greet", "Hi {{n}}"));
        assert_eq!(engine.render("greet", "Bye {{n}}", &json!({"n": 1})).unwrap(), "Bye 1");
        assert!(!engine.is_compiled("greet", "Hi {{n}}"));
    }

    #[test]
    fn compile_errors_name_the_template() {
        let engine = HandlebarsEngine::new();
        let error = engine.render("broken", "{{#if}}", &json!({})).unwrap_err();
        assert!(error.to_string().contains("broken"));
        assert!(!engine.is_compiled("broken", "{{#if}}"));
    }
}
