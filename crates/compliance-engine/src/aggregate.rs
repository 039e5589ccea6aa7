//! Merging and capping of per-batch findings
//!
//! Deterministic: stable sorts on (severity rank, page number) make output
//! membership and order independent of batch completion order.

use shared_types::Finding;
use std::collections::BTreeMap;
use tracing::debug;

/// Findings kept per page
pub const MAX_ANNOTATIONS_PER_PAGE: usize = 3;

/// Hard ceiling across the whole document
pub const MAX_TOTAL_FINDINGS: usize = 15;

/// Caps findings per page and overall, most severe first
pub struct FindingAggregator {
    max_per_page: usize,
    max_total: usize,
}

impl FindingAggregator {
    pub fn new() -> Self {
        Self {
            max_per_page: MAX_ANNOTATIONS_PER_PAGE,
            max_total: MAX_TOTAL_FINDINGS,
        }
    }

    pub fn with_limits(mut self, max_per_page: usize, max_total: usize) -> Self {
        self.max_per_page = max_per_page;
        self.max_total = max_total;
        self
    }

    /// Keep the top findings per page, then apply the global ceiling.
    ///
    /// Severity ranks high < medium < low; unrecognized severities rank last
    /// and are therefore the first dropped.
    pub fn aggregate(&self, findings: Vec<Finding>) -> Vec<Finding> {
        let total = findings.len();

        let mut by_page: BTreeMap<u32, Vec<Finding>> = BTreeMap::new();
        for finding in findings {
            by_page.entry(finding.page_number).or_default().push(finding);
        }

        let mut kept: Vec<Finding> = Vec::new();
        for (_page, mut page_findings) in by_page {
            page_findings.sort_by_key(|f| f.severity_rank());
            page_findings.truncate(self.max_per_page);
            kept.extend(page_findings);
        }

        kept.sort_by_key(|f| (f.severity_rank(), f.page_number));
        kept.truncate(self.max_total);

        debug!("aggregated {} findings down to {}", total, kept.len());
        kept
    }
}

impl Default for FindingAggregator {
    fn default() -> Self {
        Self::new()
    }
}
