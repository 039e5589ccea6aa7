//! Common types for PDF layout extraction

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single text item with spatial information.
///
/// Coordinates are PDF page coordinates: origin bottom-left, y grows upward,
/// `(x, y)` is the baseline start of the run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
}

impl TextItem {
    pub fn is_bold(&self) -> bool {
        self.font_name
            .as_deref()
            .map(|n| n.to_lowercase().contains("bold"))
            .unwrap_or(false)
    }

    pub fn is_italic(&self) -> bool {
        self.font_name
            .as_deref()
            .map(|n| {
                let n = n.to_lowercase();
                n.contains("italic") || n.contains("oblique")
            })
            .unwrap_or(false)
    }
}

/// Positioned content extracted from a single page
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageContent {
    pub page_number: u32,
    pub text_items: Vec<TextItem>,
    pub width: f64,
    pub height: f64,
}

/// Layout extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF parse error: {0}")]
    Parse(String),

    #[error("PDF is encrypted")]
    Encrypted,

    #[error("PDF contains no pages")]
    Empty,
}

/// Source of positioned text primitives.
///
/// The block extractor is backend-agnostic; any library able to produce
/// per-page positioned spans can sit behind this trait.
pub trait LayoutBackend {
    /// Backend identifier for logs
    fn name(&self) -> &'static str;

    /// Extract positioned text items for every page, in page order
    fn extract(&self, data: &[u8]) -> Result<Vec<PageContent>, ExtractError>;
}
