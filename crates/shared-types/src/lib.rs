pub mod types;

pub use types::{
    annotation_hash, AnalysisOutcome, AnalysisRecord, Annotation, BBox, BookmarkType, Control,
    DocumentRecord, DocumentStatus, Finding, Framework, Severity, TextBlock, Verdict,
    VerdictResult,
};
