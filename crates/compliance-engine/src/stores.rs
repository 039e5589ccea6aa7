//! Collaborator interfaces consumed by the pipeline
//!
//! Every external dependency (document metadata, blobs, controls,
//! annotations, cache rows, document status) sits behind a trait so the
//! pipeline can be driven with test doubles. The in-memory implementations
//! back the server's default wiring and the test suite; any durable
//! key-value/document store can replace them.

use async_trait::async_trait;
use shared_types::{
    AnalysisRecord, Annotation, Control, DocumentRecord, DocumentStatus, Framework, VerdictResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Backend(String),
}

/// Resolves document ids to storage metadata
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>, StoreError>;
    async fn put_document(&self, record: DocumentRecord) -> Result<(), StoreError>;
}

/// Raw byte storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_bytes(&self, storage_key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn put_bytes(&self, storage_key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}

/// Framework control lists
#[async_trait]
pub trait ControlsRepository: Send + Sync {
    async fn list_controls(&self, framework: Framework) -> Result<Vec<Control>, StoreError>;
}

/// Persisted annotations, updated in place via hash-based upsert
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn list_by_document(&self, document_id: &str) -> Result<Vec<Annotation>, StoreError>;
    async fn upsert(&self, annotation: Annotation) -> Result<(), StoreError>;

    /// User-triage mutation; returns false when the id is unknown
    async fn set_resolved(&self, annotation_id: &str, resolved: bool) -> Result<bool, StoreError>;
}

/// Append-only analysis cache rows
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn latest(
        &self,
        document_id: &str,
        framework: Framework,
    ) -> Result<Option<AnalysisRecord>, StoreError>;
    async fn append(&self, record: AnalysisRecord) -> Result<(), StoreError>;
}

/// Best-effort document status writes
#[async_trait]
pub trait DocumentStatusStore: Send + Sync {
    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        verdict: &VerdictResult,
    ) -> Result<(), StoreError>;
}

/// Counters for one persistence pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertStats {
    pub created: usize,
    pub updated: usize,
}

/// Hash-based annotation upsert.
///
/// Existing annotations for the document are indexed by `annotation_hash`; a
/// new annotation whose hash matches reuses the old `annotation_id` (and its
/// original `created_at`) so re-analysis updates rather than duplicates.
/// Re-analysis always writes `resolved = false`.
pub async fn upsert_annotations(
    store: &dyn AnnotationStore,
    document_id: &str,
    annotations: &mut [Annotation],
) -> Result<UpsertStats, StoreError> {
    let existing = store.list_by_document(document_id).await?;
    let by_hash: HashMap<&str, &Annotation> = existing
        .iter()
        .map(|a| (a.annotation_hash.as_str(), a))
        .collect();

    let mut stats = UpsertStats {
        created: 0,
        updated: 0,
    };

    for annotation in annotations.iter_mut() {
        if let Some(previous) = by_hash.get(annotation.annotation_hash.as_str()) {
            annotation.annotation_id = previous.annotation_id.clone();
            annotation.created_at = previous.created_at;
            stats.updated += 1;
        } else {
            stats.created += 1;
        }
        store.upsert(annotation.clone()).await?;
    }

    info!(
        "annotations persisted for '{}': {} created, {} updated",
        document_id, stats.created, stats.updated
    );
    Ok(stats)
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Default, Clone)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<HashMap<String, DocumentRecord>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.documents.read().await.get(document_id).cloned())
    }

    async fn put_document(&self, record: DocumentRecord) -> Result<(), StoreError> {
        self.documents
            .write()
            .await
            .insert(record.document_id.clone(), record);
        Ok(())
    }
}

#[async_trait]
impl DocumentStatusStore for MemoryDocumentStore {
    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        _verdict: &VerdictResult,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(document_id) {
            Some(record) => {
                record.status = status;
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "document '{}' not found",
                document_id
            ))),
        }
    }
}

#[derive(Default, Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get_bytes(&self, storage_key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.read().await.get(storage_key).cloned())
    }

    async fn put_bytes(&self, storage_key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.blobs
            .write()
            .await
            .insert(storage_key.to_string(), bytes);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct MemoryAnnotationStore {
    annotations: Arc<RwLock<HashMap<String, Annotation>>>,
}

impl MemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnnotationStore for MemoryAnnotationStore {
    async fn list_by_document(&self, document_id: &str) -> Result<Vec<Annotation>, StoreError> {
        let mut rows: Vec<Annotation> = self
            .annotations
            .read()
            .await
            .values()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.page_number.cmp(&b.page_number).then(a.y.total_cmp(&b.y)));
        Ok(rows)
    }

    async fn upsert(&self, annotation: Annotation) -> Result<(), StoreError> {
        self.annotations
            .write()
            .await
            .insert(annotation.annotation_id.clone(), annotation);
        Ok(())
    }

    async fn set_resolved(&self, annotation_id: &str, resolved: bool) -> Result<bool, StoreError> {
        let mut annotations = self.annotations.write().await;
        match annotations.get_mut(annotation_id) {
            Some(annotation) => {
                annotation.resolved = resolved;
                annotation.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default, Clone)]
pub struct MemoryCacheStore {
    records: Arc<RwLock<Vec<AnalysisRecord>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows written so far (the cache is append-only)
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn latest(
        &self,
        document_id: &str,
        framework: Framework,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.document_id == document_id && r.framework == framework)
            .cloned())
    }

    async fn append(&self, record: AnalysisRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record);
        Ok(())
    }
}
