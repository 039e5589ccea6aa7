//! Domain types shared across the docaudit workspace

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Regulatory framework a document is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "GDPR")]
    Gdpr,
    #[serde(rename = "SOC2")]
    Soc2,
    #[serde(rename = "HIPAA")]
    Hipaa,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Gdpr => "GDPR",
            Framework::Soc2 => "SOC2",
            Framework::Hipaa => "HIPAA",
        }
    }

    /// Parse a framework identifier, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GDPR" => Some(Framework::Gdpr),
            "SOC2" | "SOC-2" => Some(Framework::Soc2),
            "HIPAA" => Some(Framework::Hipaa),
            _ => None,
        }
    }

    pub fn all() -> [Framework; 3] {
        [Framework::Gdpr, Framework::Soc2, Framework::Hipaa]
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a control or finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Sort rank, high first. Raw strings that parse to no severity rank
    /// after low (see [`severity_rank`]).
    pub fn rank(&self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
        }
    }

    /// Lenient parse for model-emitted severity strings
    pub fn from_model_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" => Some(Severity::High),
            "medium" | "moderate" => Some(Severity::Medium),
            "low" | "minor" => Some(Severity::Low),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::High => "\u{1F534}",   // red circle
            Severity::Medium => "\u{1F7E0}", // orange circle
            Severity::Low => "\u{1F7E1}",    // yellow circle
        }
    }
}

/// Sort rank for an untrusted severity string: high < medium < low < unknown
pub fn severity_rank(raw: &str) -> u8 {
    Severity::from_model_str(raw).map(|s| s.rank()).unwrap_or(3)
}

/// UI/priority classification of an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkType {
    Verify,
    #[default]
    Review,
    Info,
    ActionRequired,
}

/// Document-level compliance judgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "COMPLIANT")]
    Compliant,
    #[serde(rename = "PARTIAL")]
    Partial,
    #[serde(rename = "NON_COMPLIANT")]
    NonCompliant,
}

impl Verdict {
    /// Status code written back to the document-metadata store
    pub fn document_status(&self) -> DocumentStatus {
        match self {
            Verdict::Compliant => DocumentStatus::Compliant,
            Verdict::Partial => DocumentStatus::PartiallyCompliant,
            Verdict::NonCompliant => DocumentStatus::NonCompliant,
        }
    }
}

/// Externally defined document status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Analyzing,
    Compliant,
    PartiallyCompliant,
    NonCompliant,
}

/// Axis-aligned bounding box in page coordinate units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Expand to cover `other`
    pub fn merge(&mut self, other: &BBox) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }
}

/// One paragraph-like region of a page.
///
/// `block_index` is a stable ordinal across the whole document and the only
/// join key later stages use to recover a block's geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub page_number: u32,
    pub block_index: usize,
    pub text: String,
    pub bbox: BBox,
    pub font_sizes: Vec<f64>,
    pub is_bold: bool,
    pub is_italic: bool,
    pub is_header: bool,
    pub is_footer: bool,
    pub is_toc: bool,
    pub is_boilerplate: bool,
    pub char_count: usize,
    pub line_count: usize,
}

impl TextBlock {
    pub fn avg_font_size(&self) -> f64 {
        if self.font_sizes.is_empty() {
            return 0.0;
        }
        self.font_sizes.iter().sum::<f64>() / self.font_sizes.len() as f64
    }
}

/// One framework requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub control_id: String,
    pub framework: Framework,
    pub category: String,
    pub requirement: String,
    pub severity: Severity,
    pub keywords: Vec<String>,
}

/// One candidate compliance issue emitted by the model for one batch.
///
/// This is the untrusted decode boundary: unknown fields are ignored,
/// `severity` is kept as the raw string the model produced, and a missing
/// `bookmark_type` defaults to `review`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub page_number: u32,
    pub block_index: usize,
    pub control_id: String,
    pub severity: String,
    pub issue_description: String,
    #[serde(default)]
    pub bookmark_type: BookmarkType,
    #[serde(default)]
    pub suggested_action: String,
}

impl Finding {
    pub fn severity_rank(&self) -> u8 {
        severity_rank(&self.severity)
    }

    /// Typed severity, defaulting unrecognized strings to low
    pub fn severity_or_low(&self) -> Severity {
        Severity::from_model_str(&self.severity).unwrap_or(Severity::Low)
    }
}

/// Persisted, user-facing compliance marker tied to a document location.
///
/// `annotation_hash` is a function of geometry only, so re-analysis of the
/// same region updates the existing row instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub annotation_id: String,
    pub document_id: String,
    pub analysis_id: String,
    pub framework: Framework,
    pub annotation_hash: String,
    pub page_number: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Typed severity. Rows written by older releases carry it only inside
    /// `review_comments`; scoring falls back to text matching for those.
    #[serde(default)]
    pub severity: Option<Severity>,
    pub bookmark_type: BookmarkType,
    pub review_comments: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Deterministic annotation identity: SHA-256 over the geometry tuple.
///
/// Coordinates are rendered to two decimals so float noise from re-extraction
/// does not change the hash.
pub fn annotation_hash(
    document_id: &str,
    page_number: u32,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> String {
    let canonical = format!(
        "{}|{}|{:.2}|{:.2}|{:.2}|{:.2}",
        document_id, page_number, x, y, width, height
    );
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

/// Aggregate compliance judgement for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictResult {
    pub verdict: Verdict,
    pub document_status: DocumentStatus,
    pub total_annotations: usize,
    pub high_severity_count: usize,
    pub medium_severity_count: usize,
    pub low_severity_count: usize,
    pub compliance_score: f64,
    pub critical_issues: Vec<String>,
    pub summary: String,
}

/// Result of one `analyze` invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub success: bool,
    pub document_id: String,
    pub analysis_id: String,
    pub framework: Framework,
    pub annotations_count: usize,
    pub annotations: Vec<Annotation>,
    pub final_verdict: Option<VerdictResult>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only cache row for one completed (document, framework) analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub record_id: String,
    pub document_id: String,
    pub framework: Framework,
    pub analysis_id: String,
    pub annotations: Vec<Annotation>,
    pub annotations_count: usize,
    pub final_verdict: VerdictResult,
    pub created_at: DateTime<Utc>,
}

/// Document-store row resolving a document to its byte-storage location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub filename: String,
    pub storage_key: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}
