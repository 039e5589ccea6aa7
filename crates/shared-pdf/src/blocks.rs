//! Grouping of positioned text items into paragraph-like blocks
//!
//! Items are sorted into reading order, merged into lines by baseline, and
//! lines are merged into blocks by vertical gap. Each block carries the
//! merged bounding box later stages use to place annotations.

use shared_types::{BBox, TextBlock};
use tracing::debug;

use crate::layout::{ExtractError, LayoutBackend, PageContent, TextItem};

/// Pages processed per document; pages beyond this are silently ignored
pub const MAX_PAGES: usize = 10;

/// Blocks with less text than this are treated as noise and dropped
pub const MIN_BLOCK_CHARS: usize = 10;

/// Items within this baseline distance belong to the same line
const LINE_TOLERANCE: f64 = 3.0;

/// Vertical gap between lines that starts a new block
const BLOCK_GAP: f64 = 12.0;

/// Page geometry needed by downstream classifiers
#[derive(Debug, Clone, Copy)]
pub struct PageSize {
    pub page_number: u32,
    pub width: f64,
    pub height: f64,
}

/// Blocks plus the page geometry they were extracted from
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub blocks: Vec<TextBlock>,
    pub page_sizes: Vec<PageSize>,
}

impl ExtractedDocument {
    /// Height of the given page, if it was processed
    pub fn page_height(&self, page_number: u32) -> Option<f64> {
        self.page_sizes
            .iter()
            .find(|p| p.page_number == page_number)
            .map(|p| p.height)
    }
}

/// Turns raw PDF bytes into ordered [`TextBlock`]s via a [`LayoutBackend`]
pub struct BlockExtractor<B: LayoutBackend> {
    backend: B,
    max_pages: usize,
}

impl<B: LayoutBackend> BlockExtractor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_pages: MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Extract text blocks from PDF bytes.
    ///
    /// `block_index` is unique and monotonically increasing in extraction
    /// order across the whole document.
    pub fn extract(&self, data: &[u8]) -> Result<ExtractedDocument, ExtractError> {
        let pages = self.backend.extract(data)?;
        let page_count = pages.len();

        let mut blocks = Vec::new();
        let mut page_sizes = Vec::new();
        let mut block_index = 0usize;

        for page in pages.into_iter().take(self.max_pages) {
            page_sizes.push(PageSize {
                page_number: page.page_number,
                width: page.width,
                height: page.height,
            });
            let page_blocks = blocks_for_page(&page);
            for (bbox, lines) in page_blocks {
                let text = lines
                    .iter()
                    .map(|l| l.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let trimmed = text.trim();
                if trimmed.len() < MIN_BLOCK_CHARS {
                    continue;
                }

                let font_sizes: Vec<f64> = lines
                    .iter()
                    .flat_map(|l| l.font_sizes.iter().copied())
                    .collect();
                let is_bold = lines.iter().any(|l| l.is_bold);
                let is_italic = lines.iter().any(|l| l.is_italic);
                let line_count = lines.len();

                blocks.push(TextBlock {
                    page_number: page.page_number,
                    block_index,
                    char_count: trimmed.len(),
                    text: trimmed.to_string(),
                    bbox,
                    font_sizes,
                    is_bold,
                    is_italic,
                    is_header: false,
                    is_footer: false,
                    is_toc: false,
                    is_boilerplate: false,
                    line_count,
                });
                block_index += 1;
            }
        }

        debug!(
            "extracted {} blocks from {} pages ({} processed)",
            blocks.len(),
            page_count,
            page_count.min(self.max_pages)
        );

        Ok(ExtractedDocument { blocks, page_sizes })
    }
}

/// One assembled line of text
struct Line {
    text: String,
    bbox: BBox,
    font_sizes: Vec<f64>,
    is_bold: bool,
    is_italic: bool,
}

fn blocks_for_page(page: &PageContent) -> Vec<(BBox, Vec<Line>)> {
    let lines = group_lines(&page.text_items);
    group_blocks(lines)
}

/// Sort items into reading order and merge same-baseline runs into lines
fn group_lines(items: &[TextItem]) -> Vec<Line> {
    let mut sorted: Vec<&TextItem> = items.iter().filter(|i| !i.text.trim().is_empty()).collect();
    // Reading order: top of the page first (PDF y grows upward), then left
    // to right.
    sorted.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<Line> = Vec::new();
    let mut current: Option<(f64, Line)> = None;

    for item in sorted {
        let item_bbox = BBox::new(item.x, item.y, item.x + item.width, item.y + item.height);
        let same_line = current
            .as_ref()
            .map(|(baseline, _)| (baseline - item.y).abs() <= LINE_TOLERANCE)
            .unwrap_or(false);

        if same_line {
            if let Some((_, line)) = current.as_mut() {
                line.text.push(' ');
                line.text.push_str(item.text.trim());
                line.bbox.merge(&item_bbox);
                if let Some(size) = item.font_size {
                    line.font_sizes.push(size);
                }
                line.is_bold |= item.is_bold();
                line.is_italic |= item.is_italic();
            }
        } else {
            if let Some((_, done)) = current.take() {
                lines.push(done);
            }
            current = Some((
                item.y,
                Line {
                    text: item.text.trim().to_string(),
                    bbox: item_bbox,
                    font_sizes: item.font_size.into_iter().collect(),
                    is_bold: item.is_bold(),
                    is_italic: item.is_italic(),
                },
            ));
        }
    }
    if let Some((_, done)) = current.take() {
        lines.push(done);
    }

    lines
}

/// Merge consecutive lines separated by less than [`BLOCK_GAP`] into blocks
fn group_blocks(lines: Vec<Line>) -> Vec<(BBox, Vec<Line>)> {
    let mut blocks: Vec<(BBox, Vec<Line>)> = Vec::new();

    for line in lines {
        // Lines arrive top to bottom; gap is from the bottom of the running
        // block to the top of this line.
        let starts_new_block = match blocks.last() {
            Some((bbox, _)) => bbox.min_y - line.bbox.max_y > BLOCK_GAP,
            None => true,
        };

        if starts_new_block {
            blocks.push((line.bbox, vec![line]));
        } else if let Some((bbox, members)) = blocks.last_mut() {
            bbox.merge(&line.bbox);
            members.push(line);
        }
    }

    blocks
}
