//! Structural classification and relevance filtering of text blocks
//!
//! Classification tags headers, footers, table-of-contents entries, and
//! boilerplate. Filtering then keeps the compliance-relevant subset; this is
//! the main cost-control mechanism, since model calls are priced by input
//! size.

use lazy_static::lazy_static;
use regex::Regex;
use shared_pdf::PageSize;
use shared_types::TextBlock;
use std::collections::HashMap;
use tracing::debug;

use crate::keywords::{
    contains_any, ACTION_VERBS, COMPLIANCE_KEYWORDS, FOOTER_KEYWORDS, SECTION_TITLE_KEYWORDS,
};

/// Average font size above this suggests a heading
pub const HEADER_FONT_SIZE: f64 = 13.0;

const HEADER_MAX_CHARS: usize = 200;
const FOOTER_MAX_CHARS: usize = 100;
const TOC_MAX_CHARS: usize = 150;
const BOILERPLATE_MAX_CHARS: usize = 20;
const SECTION_TITLE_MAX_CHARS: usize = 60;

/// Fraction of the page height counted as the footer band
const FOOTER_BAND_RATIO: f64 = 0.10;

const LONG_PARAGRAPH_CHARS: usize = 100;
const LONG_PARAGRAPH_WORDS: usize = 15;

lazy_static! {
    /// Leader-dot runs used in tables of contents ("Introduction ..... 3")
    static ref LEADER_DOTS: Regex = Regex::new(r"\.{3,}|(\. ){3,}").unwrap();
    static ref ENDS_WITH_DIGIT: Regex = Regex::new(r"\d\s*$").unwrap();
    static ref BULLET_START: Regex = Regex::new(r"^\s*[\u{2022}\u{25CF}\u{25AA}\u{25E6}*-]\s+").unwrap();
}

/// Tags structural roles on extracted blocks
pub struct BlockClassifier {
    page_heights: HashMap<u32, f64>,
}

impl BlockClassifier {
    pub fn new(page_sizes: &[PageSize]) -> Self {
        Self {
            page_heights: page_sizes
                .iter()
                .map(|p| (p.page_number, p.height))
                .collect(),
        }
    }

    pub fn classify_all(&self, blocks: &mut [TextBlock]) {
        for block in blocks.iter_mut() {
            self.classify(block);
        }
    }

    /// Set the structural flags on one block
    pub fn classify(&self, block: &mut TextBlock) {
        block.is_header = is_header(block);
        block.is_footer = self.is_footer(block);
        block.is_toc = is_toc(block);
        block.is_boilerplate = block.is_footer
            || block.is_toc
            || block.char_count < BOILERPLATE_MAX_CHARS
            || is_section_title(block);
    }

    fn is_footer(&self, block: &TextBlock) -> bool {
        if let Some(&height) = self.page_heights.get(&block.page_number) {
            if block.bbox.max_y < height * FOOTER_BAND_RATIO {
                return true;
            }
        }
        let lower = block.text.to_lowercase();
        contains_any(&lower, FOOTER_KEYWORDS) && block.char_count < FOOTER_MAX_CHARS
    }
}

fn is_header(block: &TextBlock) -> bool {
    let prominent = block.avg_font_size() > HEADER_FONT_SIZE || block.is_bold;
    prominent
        && block.char_count < HEADER_MAX_CHARS
        && (is_all_uppercase(&block.text) || is_title_case(&block.text))
}

fn is_toc(block: &TextBlock) -> bool {
    if block.char_count >= TOC_MAX_CHARS {
        return false;
    }
    LEADER_DOTS.is_match(&block.text)
        || ENDS_WITH_DIGIT.is_match(&block.text)
        || BULLET_START.is_match(&block.text)
}

fn is_section_title(block: &TextBlock) -> bool {
    block.line_count == 1
        && block.char_count < SECTION_TITLE_MAX_CHARS
        && contains_any(&block.text.to_lowercase(), SECTION_TITLE_KEYWORDS)
}

fn is_all_uppercase(text: &str) -> bool {
    let mut saw_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            saw_alpha = true;
            if c.is_lowercase() {
                return false;
            }
        }
    }
    saw_alpha
}

/// Words that stay lowercase in title case
const TITLE_SMALL_WORDS: &[&str] = &["a", "an", "and", "the", "of", "to", "for", "in", "on", "or", "with"];

fn is_title_case(text: &str) -> bool {
    let mut checked = 0;
    for (i, word) in text.split_whitespace().enumerate() {
        let Some(first) = word.chars().next() else {
            continue;
        };
        if !first.is_alphabetic() {
            continue;
        }
        if i > 0 && TITLE_SMALL_WORDS.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        if !first.is_uppercase() {
            return false;
        }
        checked += 1;
    }
    checked > 0
}

/// Keep the compliance-relevant subset of classified blocks.
///
/// Headers always survive for context. Otherwise a block must be
/// non-boilerplate and either mention compliance vocabulary or be a long
/// obligation-style paragraph with a recognized action verb.
pub fn filter_relevant(blocks: &[TextBlock]) -> Vec<TextBlock> {
    let kept: Vec<TextBlock> = blocks
        .iter()
        .filter(|b| {
            if b.is_header {
                return true;
            }
            if b.is_boilerplate {
                return false;
            }
            let lower = b.text.to_lowercase();
            if contains_any(&lower, COMPLIANCE_KEYWORDS) {
                return true;
            }
            let words = b.text.split_whitespace().count();
            b.char_count > LONG_PARAGRAPH_CHARS
                && words > LONG_PARAGRAPH_WORDS
                && contains_any(&lower, ACTION_VERBS)
        })
        .cloned()
        .collect();

    debug!("filtered {} of {} blocks as relevant", kept.len(), blocks.len());
    kept
}
