//! Comprehensive document compliance analysis
//!
//! Pipeline: extract positioned text blocks from a PDF, filter to the
//! compliance-relevant subset, pack blocks into token-budgeted batches, fan
//! batches out to the model with bounded parallelism, aggregate and cap the
//! findings, map them back onto page geometry as annotations, score a
//! verdict, and persist annotations plus a cache row.
//!
//! [`ComplianceEngine::analyze`] is the single synchronous boundary and the
//! error boundary for the whole pipeline: only validation and not-found
//! errors abort a request; everything else degrades to a structured failure
//! result.

pub mod aggregate;
pub mod annotate;
pub mod batching;
pub mod cache;
pub mod classifier;
pub mod controls;
pub mod error;
pub mod findings;
pub mod keywords;
pub mod model;
#[cfg(any(feature = "anthropic", feature = "openai"))]
pub mod providers;
pub mod stores;
pub mod verdict;

use chrono::Utc;
use shared_pdf::{BlockExtractor, LopdfBackend};
use shared_types::{AnalysisOutcome, AnalysisRecord, Framework};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub use aggregate::{FindingAggregator, MAX_ANNOTATIONS_PER_PAGE, MAX_TOTAL_FINDINGS};
pub use batching::{BatchPlanner, MAX_TOKENS_PER_BATCH};
pub use cache::AnalysisCache;
pub use classifier::{filter_relevant, BlockClassifier};
pub use controls::{builtin_controls, StaticControlsRepository};
pub use error::EngineError;
pub use findings::{FindingGenerator, MAX_CONCURRENT_BATCHES, MAX_FINDINGS_PER_BATCH};
pub use model::{ModelClient, ModelError, NoopClient, RetryingClient};
pub use stores::{
    upsert_annotations, AnnotationStore, BlobStore, CacheStore, ControlsRepository, DocumentStore,
    DocumentStatusStore, MemoryAnnotationStore, MemoryBlobStore, MemoryCacheStore,
    MemoryDocumentStore, StoreError, UpsertStats,
};

/// Pipeline limits, all defaulting to the reference values
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_pages: usize,
    pub max_tokens_per_batch: usize,
    pub max_findings_per_batch: usize,
    pub max_concurrent_batches: usize,
    pub max_annotations_per_page: usize,
    pub max_total_findings: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pages: shared_pdf::MAX_PAGES,
            max_tokens_per_batch: MAX_TOKENS_PER_BATCH,
            max_findings_per_batch: MAX_FINDINGS_PER_BATCH,
            max_concurrent_batches: MAX_CONCURRENT_BATCHES,
            max_annotations_per_page: MAX_ANNOTATIONS_PER_PAGE,
            max_total_findings: MAX_TOTAL_FINDINGS,
        }
    }
}

/// Constructor-injected collaborators; every handle is shared
#[derive(Clone)]
pub struct EngineStores {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub controls: Arc<dyn ControlsRepository>,
    pub annotations: Arc<dyn AnnotationStore>,
    pub cache: Arc<dyn CacheStore>,
    pub status: Arc<dyn DocumentStatusStore>,
}

impl EngineStores {
    /// Fully in-memory wiring with the built-in control sets
    pub fn in_memory() -> Self {
        let documents = MemoryDocumentStore::new();
        Self {
            documents: Arc::new(documents.clone()),
            blobs: Arc::new(MemoryBlobStore::new()),
            controls: Arc::new(StaticControlsRepository),
            annotations: Arc::new(MemoryAnnotationStore::new()),
            cache: Arc::new(MemoryCacheStore::new()),
            status: Arc::new(documents),
        }
    }
}

/// ComplianceEngine entry point
pub struct ComplianceEngine {
    stores: EngineStores,
    model: Arc<dyn ModelClient>,
    cache: AnalysisCache,
    config: EngineConfig,
}

impl ComplianceEngine {
    pub fn new(stores: EngineStores, model: Arc<dyn ModelClient>) -> Self {
        let cache = AnalysisCache::new(stores.cache.clone());
        Self {
            stores,
            model,
            cache,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a comprehensive compliance analysis.
    ///
    /// `Err` is returned only for validation failures and unknown documents;
    /// any other failure comes back as `Ok` with `success == false`.
    pub async fn analyze(
        &self,
        document_id: &str,
        framework_id: &str,
        force_reanalysis: bool,
    ) -> Result<AnalysisOutcome, EngineError> {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return Err(EngineError::Validation(
                "document_id must not be empty".to_string(),
            ));
        }
        let framework = Framework::parse(framework_id).ok_or_else(|| {
            EngineError::Validation(format!(
                "unknown framework '{}'; expected GDPR, SOC2 or HIPAA",
                framework_id
            ))
        })?;

        if !force_reanalysis {
            if let Some(record) = self.cache.get(document_id, framework).await {
                info!(
                    "returning cached analysis for ({}, {})",
                    document_id, framework
                );
                return Ok(AnalysisOutcome {
                    success: true,
                    document_id: document_id.to_string(),
                    analysis_id: record.analysis_id,
                    framework,
                    annotations_count: record.annotations_count,
                    annotations: record.annotations,
                    final_verdict: Some(record.final_verdict),
                    cached: true,
                    cached_at: Some(record.created_at),
                    error: None,
                });
            }
        }

        let analysis_id = Uuid::new_v4().to_string();
        match self.run_fresh(document_id, framework, &analysis_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e @ EngineError::Validation(_)) | Err(e @ EngineError::NotFound(_)) => Err(e),
            Err(e) => {
                warn!("analysis of '{}' failed: {}", document_id, e);
                Ok(AnalysisOutcome {
                    success: false,
                    document_id: document_id.to_string(),
                    analysis_id,
                    framework,
                    annotations_count: 0,
                    annotations: Vec::new(),
                    final_verdict: None,
                    cached: false,
                    cached_at: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    async fn run_fresh(
        &self,
        document_id: &str,
        framework: Framework,
        analysis_id: &str,
    ) -> Result<AnalysisOutcome, EngineError> {
        // Resolve the document to its bytes
        let record = self
            .stores
            .documents
            .get_document(document_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("document '{}' not found", document_id)))?;
        let bytes = self
            .stores
            .blobs
            .get_bytes(&record.storage_key)
            .await?
            .ok_or_else(|| {
                EngineError::Extraction(format!(
                    "document bytes missing at '{}'",
                    record.storage_key
                ))
            })?;

        // Extract and classify
        let extractor =
            BlockExtractor::new(LopdfBackend::new()).with_max_pages(self.config.max_pages);
        let extracted = extractor.extract(&bytes)?;
        let mut blocks = extracted.blocks;

        let classifier = BlockClassifier::new(&extracted.page_sizes);
        classifier.classify_all(&mut blocks);
        let relevant = filter_relevant(&blocks);
        info!(
            "document '{}': {} blocks extracted, {} relevant",
            document_id,
            blocks.len(),
            relevant.len()
        );

        // Batch and generate findings
        let controls = self.stores.controls.list_controls(framework).await?;
        let controls_summary = findings::render_controls_summary(&controls);
        let overhead = batching::estimate_tokens(controls_summary.chars().count());

        let planner = BatchPlanner::new(self.config.max_tokens_per_batch);
        let batches = planner.plan(&relevant, overhead);

        let generator = FindingGenerator::new(self.model.clone())
            .with_limits(
                self.config.max_findings_per_batch,
                self.config.max_concurrent_batches,
            );
        let raw_findings = generator
            .generate_all(&batches, &controls_summary, framework)
            .await;

        // Aggregate, map, score
        let aggregator = FindingAggregator::new().with_limits(
            self.config.max_annotations_per_page,
            self.config.max_total_findings,
        );
        let limited = aggregator.aggregate(raw_findings);

        let mut annotations =
            annotate::map_findings(&limited, &blocks, document_id, analysis_id, framework);
        let final_verdict = verdict::score(framework, &annotations);

        // Persist; failures here never invalidate the computed result
        match upsert_annotations(
            self.stores.annotations.as_ref(),
            document_id,
            &mut annotations,
        )
        .await
        {
            Ok(stats) => info!(
                "document '{}': {} annotations ({} created, {} updated)",
                document_id,
                annotations.len(),
                stats.created,
                stats.updated
            ),
            Err(e) => warn!(
                "annotation write failed for '{}' (result still returned): {}",
                document_id, e
            ),
        }

        verdict::apply_status(self.stores.status.as_ref(), document_id, &final_verdict).await;

        self.cache
            .put(AnalysisRecord {
                record_id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                framework,
                analysis_id: analysis_id.to_string(),
                annotations: annotations.clone(),
                annotations_count: annotations.len(),
                final_verdict: final_verdict.clone(),
                created_at: Utc::now(),
            })
            .await;

        Ok(AnalysisOutcome {
            success: true,
            document_id: document_id.to_string(),
            analysis_id: analysis_id.to_string(),
            framework,
            annotations_count: annotations.len(),
            annotations,
            final_verdict: Some(final_verdict),
            cached: false,
            cached_at: None,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ComplianceEngine {
        ComplianceEngine::new(EngineStores::in_memory(), Arc::new(NoopClient))
    }

    #[tokio::test]
    async fn test_empty_document_id_is_a_validation_error() {
        let result = engine().analyze("  ", "GDPR", false).await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_framework_is_a_validation_error() {
        let result = engine().analyze("doc-1", "PCI-DSS", false).await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let result = engine().analyze("no-such-doc", "GDPR", false).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_degrades_to_failure_outcome() {
        let stores = EngineStores::in_memory();
        stores
            .documents
            .put_document(shared_types::DocumentRecord {
                document_id: "doc-1".to_string(),
                filename: "broken.pdf".to_string(),
                storage_key: "blob-1".to_string(),
                status: shared_types::DocumentStatus::Uploaded,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        stores
            .blobs
            .put_bytes("blob-1", b"definitely not a pdf".to_vec())
            .await
            .unwrap();

        let engine = ComplianceEngine::new(stores, Arc::new(NoopClient));
        let outcome = engine.analyze("doc-1", "GDPR", false).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert!(!outcome.cached);
    }
}
