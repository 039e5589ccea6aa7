//! Compliance scoring and verdict derivation

use shared_types::{Annotation, DocumentStatus, Framework, Severity, Verdict, VerdictResult};
use tracing::warn;

use crate::stores::DocumentStatusStore;

/// Critical-issue snippets reported on the verdict
const MAX_CRITICAL_ISSUES: usize = 5;
const CRITICAL_ISSUE_CAP: usize = 200;

/// Per-severity score penalties
const HIGH_PENALTY: u32 = 10;
const MEDIUM_PENALTY: u32 = 3;
const LOW_PENALTY: u32 = 1;

/// Compute the weighted score and discrete verdict from the final annotation
/// set.
pub fn score(framework: Framework, annotations: &[Annotation]) -> VerdictResult {
    let mut high = 0usize;
    let mut medium = 0usize;
    let mut low = 0usize;

    for annotation in annotations {
        match annotation_severity(annotation) {
            Severity::High => high += 1,
            Severity::Medium => medium += 1,
            Severity::Low => low += 1,
        }
    }

    let penalty =
        (high as u32 * HIGH_PENALTY + medium as u32 * MEDIUM_PENALTY + low as u32 * LOW_PENALTY)
            .min(100);
    let compliance_score = (100 - penalty) as f64;

    let verdict = if high == 0 && medium == 0 && low <= 2 {
        Verdict::Compliant
    } else if high >= 3 || (high >= 1 && medium >= 5) {
        Verdict::NonCompliant
    } else {
        Verdict::Partial
    };

    let critical_issues: Vec<String> = annotations
        .iter()
        .filter(|a| annotation_severity(a) == Severity::High)
        .filter_map(|a| extract_issue(&a.review_comments))
        .map(|issue| issue.chars().take(CRITICAL_ISSUE_CAP).collect())
        .take(MAX_CRITICAL_ISSUES)
        .collect();

    let summary = match verdict {
        Verdict::Compliant => format!(
            "Document meets {} requirements with {} minor issue(s).",
            framework,
            annotations.len()
        ),
        Verdict::Partial => format!(
            "Document partially meets {} requirements: {} high, {} medium, {} low severity issue(s); score {:.0}.",
            framework, high, medium, low, compliance_score
        ),
        Verdict::NonCompliant => format!(
            "Document does not meet {} requirements: {} high and {} medium severity issue(s) found.",
            framework, high, medium
        ),
    };

    VerdictResult {
        verdict,
        document_status: verdict.document_status(),
        total_annotations: annotations.len(),
        high_severity_count: high,
        medium_severity_count: medium,
        low_severity_count: low,
        compliance_score,
        critical_issues,
        summary,
    }
}

/// Best-effort write of the verdict's document status. Failures are logged
/// and swallowed; they never invalidate the computed result.
pub async fn apply_status(
    store: &dyn DocumentStatusStore,
    document_id: &str,
    verdict: &VerdictResult,
) {
    if let Err(e) = store
        .update_status(document_id, verdict.document_status, verdict)
        .await
    {
        warn!(
            "document status update failed for '{}' (ignored): {}",
            document_id, e
        );
    }
}

/// Typed severity, falling back to comment text for rows written before the
/// severity field existed.
fn annotation_severity(annotation: &Annotation) -> Severity {
    annotation
        .severity
        .unwrap_or_else(|| severity_from_comment(&annotation.review_comments))
}

fn severity_from_comment(comments: &str) -> Severity {
    if comments.contains('\u{1F534}') || comments.contains("(high severity)") {
        Severity::High
    } else if comments.contains('\u{1F7E0}') || comments.contains("(medium severity)") {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Pull the "Issue" section out of a rendered review comment
fn extract_issue(comments: &str) -> Option<String> {
    let (_, after) = comments.split_once("**Issue**\n")?;
    let issue = after.split("\n\n").next()?.trim();
    if issue.is_empty() {
        None
    } else {
        Some(issue.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::{annotation_hash, BookmarkType};

    fn annotation(severity: Severity) -> Annotation {
        let now = Utc::now();
        Annotation {
            annotation_id: "a".to_string(),
            document_id: "doc-1".to_string(),
            analysis_id: "an-1".to_string(),
            framework: Framework::Gdpr,
            annotation_hash: annotation_hash("doc-1", 1, 0.0, 0.0, 10.0, 10.0),
            page_number: 1,
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            severity: Some(severity),
            bookmark_type: BookmarkType::Review,
            review_comments: format!(
                "{} **GDPR-5.1** ({} severity)\n\n**Issue**\nNo retention period\n\n\
                 **Recommended Action**\nDefine one\n\n_Flagged by automated compliance review._",
                severity.emoji(),
                severity.label()
            ),
            resolved: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn annotations(high: usize, medium: usize, low: usize) -> Vec<Annotation> {
        let mut out = Vec::new();
        out.extend((0..high).map(|_| annotation(Severity::High)));
        out.extend((0..medium).map(|_| annotation(Severity::Medium)));
        out.extend((0..low).map(|_| annotation(Severity::Low)));
        out
    }

    #[test]
    fn test_verdict_boundary_cases() {
        assert_eq!(
            score(Framework::Gdpr, &annotations(0, 0, 2)).verdict,
            Verdict::Compliant
        );
        assert_eq!(
            score(Framework::Gdpr, &annotations(0, 0, 3)).verdict,
            Verdict::Partial
        );
        assert_eq!(
            score(Framework::Gdpr, &annotations(3, 0, 0)).verdict,
            Verdict::NonCompliant
        );
        assert_eq!(
            score(Framework::Gdpr, &annotations(1, 5, 0)).verdict,
            Verdict::NonCompliant
        );
        assert_eq!(
            score(Framework::Gdpr, &annotations(1, 4, 0)).verdict,
            Verdict::Partial
        );
    }

    #[test]
    fn test_compliance_score_formula() {
        let result = score(Framework::Soc2, &annotations(2, 1, 1));
        assert_eq!(result.compliance_score, 76.0);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let result = score(Framework::Soc2, &annotations(12, 0, 0));
        assert_eq!(result.compliance_score, 0.0);
    }

    #[test]
    fn test_empty_annotations_are_compliant() {
        let result = score(Framework::Hipaa, &[]);
        assert_eq!(result.verdict, Verdict::Compliant);
        assert_eq!(result.compliance_score, 100.0);
        assert_eq!(result.document_status, DocumentStatus::Compliant);
    }

    #[test]
    fn test_critical_issues_come_from_high_annotations() {
        let result = score(Framework::Gdpr, &annotations(2, 1, 0));
        assert_eq!(result.critical_issues.len(), 2);
        assert!(result.critical_issues[0].contains("No retention period"));
    }

    #[test]
    fn test_critical_issues_are_capped_at_five() {
        let result = score(Framework::Gdpr, &annotations(8, 0, 0));
        assert_eq!(result.critical_issues.len(), 5);
    }

    #[test]
    fn test_severity_fallback_from_comment_text() {
        let mut a = annotation(Severity::High);
        a.severity = None;
        let result = score(Framework::Gdpr, &[a]);
        assert_eq!(result.high_severity_count, 1);
    }

    #[test]
    fn test_counts_are_reported() {
        let result = score(Framework::Gdpr, &annotations(1, 2, 3));
        assert_eq!(result.high_severity_count, 1);
        assert_eq!(result.medium_severity_count, 2);
        assert_eq!(result.low_severity_count, 3);
        assert_eq!(result.total_annotations, 6);
    }
}
