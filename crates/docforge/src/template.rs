//! Template identifiers and the registry of known templates

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DocforgeError, Result, TemplateError};

/// Templates compiled into the service. Each has a shipping file under
/// `templates/` and a model in [`crate::builtin`].
pub const BUILTIN_TEMPLATES: &[&str] = &["Invoice", "Receipt", "Letters/Welcome", "Reports/MonthlySummary"];

/// Unique identifier for a template, optionally hierarchical (`Category/Name`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateId(String);

impl TemplateId {
    /// Validate and create a template identifier
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let invalid = |reason: &str| {
            DocforgeError::Template(TemplateError::InvalidId {
                id: id.clone(),
                reason: reason.to_string(),
            })
        };

        if id.trim().is_empty() {
            return Err(invalid("identifier is empty"));
        }
        if id.contains('\\') {
            return Err(invalid("backslashes are not allowed"));
        }
        if id.starts_with('/') {
            return Err(invalid("identifier must be relative"));
        }
        for segment in id.split('/') {
            match segment {
                "" => return Err(invalid("empty path segment")),
                "." | ".." => return Err(invalid("relative path segments are not allowed")),
                s if s.trim() != s => return Err(invalid("segments may not be padded with whitespace")),
                _ => {}
            }
        }

        Ok(TemplateId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment (`Welcome` for `Letters/Welcome`)
    pub fn base_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the last segment, if the identifier is hierarchical
    pub fn category(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(category, _)| category)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TemplateId {
    type Err = DocforgeError;

    fn from_str(s: &str) -> Result<Self> {
        TemplateId::new(s)
    }
}

impl TryFrom<String> for TemplateId {
    type Error = DocforgeError;

    fn try_from(s: String) -> Result<Self> {
        TemplateId::new(s)
    }
}

impl From<TemplateId> for String {
    fn from(id: TemplateId) -> Self {
        id.0
    }
}

impl AsRef<str> for TemplateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TemplateId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The fixed set of templates the service knows about.
///
/// Populated once at startup from [`BUILTIN_TEMPLATES`] and configuration,
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    ids: BTreeSet<TemplateId>,
}

impl TemplateRegistry {
    /// Create a registry from a list of identifiers
    pub fn new<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = ids
            .into_iter()
            .map(|id| TemplateId::new(id.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self { ids })
    }

    /// Registry containing the built-in templates
    pub fn builtin() -> Self {
        Self {
            ids: BUILTIN_TEMPLATES
                .iter()
                .filter_map(|id| TemplateId::new(*id).ok())
                .collect(),
        }
    }

    /// Add more identifiers, typically from configuration
    pub fn with_extra<I, S>(mut self, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in extra {
            let id = TemplateId::new(id.as_ref()).map_err(|e| match e {
                DocforgeError::Template(TemplateError::InvalidId { id, reason }) => {
                    DocforgeError::Config(ConfigError::InvalidConfig {
                        setting: "extra templates".to_string(),
                        reason: format!("'{}' {}", id, reason),
                    })
                }
                other => other,
            })?;
            self.ids.insert(id);
        }
        Ok(self)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&TemplateId> {
        self.ids.get(id)
    }

    /// All identifiers in sorted order
    pub fn all(&self) -> impl Iterator<Item = &TemplateId> {
        self.ids.iter()
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchical_ids_split_into_category_and_base() {
        let id = TemplateId::new("Reports/Finance/MonthlySummary").unwrap();
        assert_eq!(id.base_name(), "MonthlySummary");
        assert_eq!(id.category(), Some("Reports/Finance"));
        assert_eq!(id.segments().count(), 3);

        let flat = TemplateId::new("Invoice").unwrap();
        assert_eq!(flat.base_name(), "Invoice");
        assert_eq!(flat.category(), None);
    }

    #[test]
    fn rejects_path_escapes() {
        for bad in ["", "  ", "../secrets", "a//b", "/abs", "a\\b", "a/./b", "a/ b"] {
            assert!(TemplateId::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn deserializing_validates() {
        let ok: TemplateId = serde_json::from_str("\"Letters/Welcome\"").unwrap();
        assert_eq!(ok.as_str(), "Letters/Welcome");
        assert!(serde_json::from_str::<TemplateId>("\"../x\"").is_err());
    }

    #[test]
    fn builtin_registry_contains_every_builtin() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.count(), BUILTIN_TEMPLATES.len());
        for id in BUILTIN_TEMPLATES {
            assert!(registry.exists(id));
        }
        assert!(!registry.exists("DoesNotExist"));
        assert!(!registry.exists("../Invoice"));
    }

    #[test]
    fn extra_templates_are_merged_and_sorted() {
        let registry = TemplateRegistry::builtin()
            .with_extra(["Contracts/Nda", "Invoice"])
            .unwrap();
        assert_eq!(registry.count(), BUILTIN_TEMPLATES.len() + 1);

        let all: Vec<&str> = registry.all().map(TemplateId::as_str).collect();
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);

        let error = TemplateRegistry::builtin()
            .with_extra(["bad//id"])
            .unwrap_err();
        assert!(matches!(
            error,
            DocforgeError::Config(ConfigError::InvalidConfig { .. })
        ));
        assert_eq!(
            error.user_message(),
            "Invalid configuration: extra templates - 'bad//id' empty path segment"
        );
    }
}
