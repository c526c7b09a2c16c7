//! HTML to PDF conversion

use std::collections::BTreeMap;

use printpdf::{GeneratePdfOptions, PdfDocument, PdfSaveOptions};
use tracing::debug;

use crate::error::{ConversionError, Result};

/// Converts rendered HTML into PDF bytes
pub trait PdfConverter: Send + Sync {
    fn convert(&self, html: &str) -> Result<Vec<u8>>;
}

/// [`PdfConverter`] backed by printpdf's HTML layout
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPdfConverter;

impl HtmlPdfConverter {
    pub fn new() -> Self {
        HtmlPdfConverter
    }
}

impl PdfConverter for HtmlPdfConverter {
    fn convert(&self, html: &str) -> Result<Vec<u8>> {
        let images = BTreeMap::new();
        let fonts = BTreeMap::new();
        let mut layout_warnings = Vec::new();

        let document = PdfDocument::from_html(
            html,
            &images,
            &fonts,
            &GeneratePdfOptions::default(),
            &mut layout_warnings,
        )
        .map_err(|e| ConversionError::Html {
            message: e.to_string(),
        })?;

        let mut save_warnings = Vec::new();
        let bytes = document.save(&PdfSaveOptions::default(), &mut save_warnings);

        debug!(
            layout_warnings = layout_warnings.len(),
            save_warnings = save_warnings.len(),
            size = bytes.len(),
            "html converted to pdf"
        );

        if bytes.is_empty() {
            return Err(ConversionError::EmptyOutput.into());
        }
        Ok(bytes)
    }
}
