//! Resolves template identifiers to files on disk by naming convention

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::template::{TemplateId, TemplateRegistry};

pub const DEFAULT_EXTENSION: &str = "hbs";

/// Finds the source file for a registered template.
///
/// Candidates are tried in a fixed order and the first existing file wins:
///
/// 1. `<root>/<id>.<ext>`
/// 2. `<root>/<id>Template.<ext>`
/// 3. `<root>/<id>/<base>.<ext>`
/// 4. `<root>/<id>/<base>Template.<ext>`
/// 5. `<root>/<category>/Templates/<base>.<ext>` (hierarchical ids only)
#[derive(Debug, Clone)]
pub struct TemplateLocator {
    root: PathBuf,
    extension: String,
    registry: Arc<TemplateRegistry>,
}

impl TemplateLocator {
    pub fn new(root: impl AsRef<Path>, registry: Arc<TemplateRegistry>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension: DEFAULT_EXTENSION.to_string(),
            registry,
        }
    }

    /// Set the template file extension (with or without the leading dot)
    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = extension.as_ref().trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Every path tried for `id`, in priority order
    pub fn candidates(&self, id: &TemplateId) -> Vec<PathBuf> {
        let segments: Vec<&str> = id.segments().collect();
        let base = id.base_name();
        let ext = &self.extension;

        let mut candidates = vec![
            self.nested(&segments, |last| format!("{last}.{ext}")),
            self.nested(&segments, |last| format!("{last}Template.{ext}")),
            self.under(&segments).join(format!("{base}.{ext}")),
            self.under(&segments).join(format!("{base}Template.{ext}")),
        ];

        if let Some((_, parents)) = segments.split_last() {
            if !parents.is_empty() {
                candidates.push(
                    self.under(parents)
                        .join("Templates")
                        .join(format!("{base}.{ext}")),
                );
            }
        }

        candidates
    }

    /// Resolve a registered template to its source file.
    ///
    /// Unregistered identifiers short-circuit to `None` without touching the
    /// file system.
    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        let id = self.registry.get(id)?;
        let found = self.candidates(id).into_iter().find(|path| path.is_file());
        match &found {
            Some(path) => debug!(template = %id, path = %path.display(), "template file resolved"),
            None => debug!(template = %id, root = %self.root.display(), "no template file matched"),
        }
        found
    }

    /// [`resolve`](Self::resolve) without blocking the async runtime
    pub async fn resolve_async(&self, id: &str) -> Option<PathBuf> {
        let id = self.registry.get(id)?;
        for path in self.candidates(id) {
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                if metadata.is_file() {
                    debug!(template = %id, path = %path.display(), "template file resolved");
                    return Some(path);
                }
            }
        }
        debug!(template = %id, root = %self.root.display(), "no template file matched");
        None
    }

    fn under(&self, segments: &[&str]) -> PathBuf {
        segments
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    // Joins all but the last segment as directories and names the file from the last one
    fn nested(&self, segments: &[&str], file: impl Fn(&str) -> String) -> PathBuf {
        match segments.split_last() {
            Some((last, parents)) => self.under(parents).join(file(last)),
            None => self.root.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn registry() -> Arc<TemplateRegistry> {
        Arc::new(TemplateRegistry::new(["Invoice", "Receipt", "Letters/Welcome", "Reports/MonthlySummary"]).unwrap())
    }

    #[test]
    fn candidates_follow_priority_order() {
        let locator = TemplateLocator::new("/t", registry());
        let id = TemplateId::new("Letters/Welcome").unwrap();
        let candidates = locator.candidates(&id);
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/t/Letters/Welcome.hbs"),
                PathBuf::from("/t/Letters/WelcomeTemplate.hbs"),
                PathBuf::from("/t/Letters/Welcome/Welcome.hbs"),
                PathBuf::from("/t/Letters/Welcome/WelcomeTemplate.hbs"),
                PathBuf::from("/t/Letters/Templates/Welcome.hbs"),
            ]
        );

        let flat = TemplateId::new("Invoice").unwrap();
        assert_eq!(locator.candidates(&flat).len(), 4);
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ReceiptTemplate.hbs"), "b").unwrap();
        fs::create_dir_all(dir.path().join("Receipt")).unwrap();
        fs::write(dir.path().join("Receipt/Receipt.hbs"), "c").unwrap();

        let locator = TemplateLocator::new(dir.path(), registry());
        assert_eq!(
            locator.resolve("Receipt"),
            Some(dir.path().join("ReceiptTemplate.hbs"))
        );

        fs::write(dir.path().join("Receipt.hbs"), "a").unwrap();
        assert_eq!(locator.resolve("Receipt"), Some(dir.path().join("Receipt.hbs")));
    }

    #[test]
    fn category_templates_directory_is_last_resort() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Reports/Templates")).unwrap();
        fs::write(dir.path().join("Reports/Templates/MonthlySummary.html"), "x").unwrap();

        let locator = TemplateLocator::new(dir.path(), registry()).with_extension(".html");
        assert_eq!(locator.extension(), "html");
        assert_eq!(
            locator.resolve("Reports/MonthlySummary"),
            Some(dir.path().join("Reports/Templates/MonthlySummary.html"))
        );
    }

    #[tokio::test]
    async fn async_resolution_matches_blocking_resolution() {
        let dir = tempdir().unwrap();
        // A directory shadowing the first candidate is skipped
        fs::create_dir_all(dir.path().join("Letters/Welcome.hbs")).unwrap();
        fs::create_dir_all(dir.path().join("Letters/Welcome")).unwrap();
        fs::write(dir.path().join("Letters/Welcome/Welcome.hbs"), "w").unwrap();

        let locator = TemplateLocator::new(dir.path(), registry());
        let expected = Some(dir.path().join("Letters/Welcome/Welcome.hbs"));
        assert_eq!(locator.resolve_async("Letters/Welcome").await, expected);
        assert_eq!(locator.resolve("Letters/Welcome"), expected);
        assert_eq!(locator.resolve_async("Invoice").await, None);
        assert_eq!(locator.resolve_async("Unknown").await, None);
    }

    #[test]
    fn unregistered_or_missing_templates_resolve_to_none() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Unknown.hbs"), "x").unwrap();

        let locator = TemplateLocator::new(dir.path(), registry());
        assert_eq!(locator.resolve("Unknown"), None);
        assert_eq!(locator.resolve("Invoice"), None);
    }
}
