//! Shared PDF layout extraction
//!
//! This crate turns raw PDF bytes into positioned text blocks. The actual
//! layout primitives come from a pluggable [`LayoutBackend`]; the default
//! backend walks content streams with lopdf.

pub mod backend;
pub mod blocks;
pub mod layout;

pub use backend::LopdfBackend;
pub use blocks::{BlockExtractor, ExtractedDocument, PageSize, MAX_PAGES, MIN_BLOCK_CHARS};
pub use layout::{ExtractError, LayoutBackend, PageContent, TextItem};
