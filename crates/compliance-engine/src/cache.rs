//! Analysis cache keyed by (document, framework)
//!
//! The cache is append-only: re-analysis writes a new row and only the most
//! recent row is ever consulted. Lookup failures degrade to a miss, write
//! failures are logged; neither can fail an analysis.

use shared_types::{AnalysisRecord, Framework};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::stores::CacheStore;

pub struct AnalysisCache {
    store: Arc<dyn CacheStore>,
}

impl AnalysisCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Most recent cached analysis, or None. Errors count as a miss.
    pub async fn get(&self, document_id: &str, framework: Framework) -> Option<AnalysisRecord> {
        match self.store.latest(document_id, framework).await {
            Ok(Some(record)) => {
                debug!(
                    "cache hit for ({}, {}) from {}",
                    document_id, framework, record.created_at
                );
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "cache lookup failed for ({}, {}), treating as miss: {}",
                    document_id, framework, e
                );
                None
            }
        }
    }

    /// Append a fresh analysis row. Returns false (after logging) on failure.
    pub async fn put(&self, record: AnalysisRecord) -> bool {
        let key = (record.document_id.clone(), record.framework);
        match self.store.append(record).await {
            Ok(()) => true,
            Err(e) => {
                warn!("cache write failed for ({}, {}): {}", key.0, key.1, e);
                false
            }
        }
    }
}
