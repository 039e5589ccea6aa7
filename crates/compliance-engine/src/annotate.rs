//! Mapping findings back onto page geometry
//!
//! Each finding's `block_index` is resolved against the full (unfiltered)
//! block set; a finding the model invented for an unknown block is dropped
//! silently. Resolved findings become annotation rectangles padded to
//! visually enclose the source text in a viewer.

use chrono::Utc;
use shared_types::{annotation_hash, Annotation, Finding, Framework, TextBlock};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Padding applied to the source block bbox
const PAD_X: f64 = 4.0;
const PAD_Y: f64 = 4.0;
const PAD_WIDTH: f64 = 16.0;
const PAD_HEIGHT: f64 = 8.0;

/// Convert aggregated findings into annotations ready for persistence.
///
/// `all_blocks` must be the full extraction output, not the filtered subset,
/// so that any index the model could legitimately reference resolves.
pub fn map_findings(
    findings: &[Finding],
    all_blocks: &[TextBlock],
    document_id: &str,
    analysis_id: &str,
    framework: Framework,
) -> Vec<Annotation> {
    let lookup: HashMap<usize, &TextBlock> =
        all_blocks.iter().map(|b| (b.block_index, b)).collect();
    let now = Utc::now();

    findings
        .iter()
        .filter_map(|finding| {
            let Some(block) = lookup.get(&finding.block_index) else {
                debug!(
                    "dropping finding for unknown block_index {}",
                    finding.block_index
                );
                return None;
            };

            let x = block.bbox.min_x - PAD_X;
            let y = block.bbox.min_y - PAD_Y;
            let width = block.bbox.width() + PAD_WIDTH;
            let height = block.bbox.height() + PAD_HEIGHT;

            Some(Annotation {
                annotation_id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                analysis_id: analysis_id.to_string(),
                framework,
                annotation_hash: annotation_hash(
                    document_id,
                    block.page_number,
                    x,
                    y,
                    width,
                    height,
                ),
                page_number: block.page_number,
                x,
                y,
                width,
                height,
                severity: Some(finding.severity_or_low()),
                bookmark_type: finding.bookmark_type,
                review_comments: render_review_comment(finding),
                resolved: false,
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}

/// Render the user-facing review comment for a finding
pub fn render_review_comment(finding: &Finding) -> String {
    let severity = finding.severity_or_low();
    let action = if finding.suggested_action.trim().is_empty() {
        "Review this section with your compliance team."
    } else {
        finding.suggested_action.trim()
    };

    format!(
        "{} **{}** ({} severity)\n\n\
         **Issue**\n{}\n\n\
         **Recommended Action**\n{}\n\n\
         _Flagged by automated compliance review._",
        severity.emoji(),
        finding.control_id,
        severity.label(),
        finding.issue_description.trim(),
        action
    )
}
