//! End-to-end pipeline tests over synthesized PDFs, in-memory stores, and
//! scripted model clients

use async_trait::async_trait;
use chrono::Utc;
use compliance_engine::model::{FnClient, ModelClient, ModelError};
use compliance_engine::{
    AnnotationStore, BlobStore, ComplianceEngine, DocumentStore, EngineConfig, EngineStores,
    MemoryAnnotationStore, MemoryBlobStore, MemoryCacheStore, MemoryDocumentStore,
    StaticControlsRepository,
};
use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};
use regex::Regex;
use shared_types::{BookmarkType, DocumentRecord, DocumentStatus, Severity, Verdict};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Build a minimal PDF; each entry in `pages` is the lines shown on one page.
fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources = Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![(
            "F1",
            Object::Reference(font_id),
        )])),
    )]);

    let mut page_ids = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(11)],
            ),
            Operation::new("TL", vec![Object::Integer(40)]),
            Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                // Large leading keeps every line in its own block
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(
                    line.as_bytes().to_vec(),
                    lopdf::StringFormat::Literal,
                )],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Resources", Object::Dictionary(resources.clone())),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(page_ids.len() as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

struct Handles {
    stores: EngineStores,
    cache: MemoryCacheStore,
    annotations: MemoryAnnotationStore,
}

fn stores_with_handles() -> Handles {
    let documents = MemoryDocumentStore::new();
    let blobs = MemoryBlobStore::new();
    let annotations = MemoryAnnotationStore::new();
    let cache = MemoryCacheStore::new();
    Handles {
        stores: EngineStores {
            documents: Arc::new(documents.clone()),
            blobs: Arc::new(blobs),
            controls: Arc::new(StaticControlsRepository),
            annotations: Arc::new(annotations.clone()),
            cache: Arc::new(cache.clone()),
            status: Arc::new(documents),
        },
        cache,
        annotations,
    }
}

async fn seed_document(stores: &EngineStores, document_id: &str, bytes: Vec<u8>) {
    let storage_key = format!("blob-{}", document_id);
    stores
        .documents
        .put_document(DocumentRecord {
            document_id: document_id.to_string(),
            filename: format!("{}.pdf", document_id),
            storage_key: storage_key.clone(),
            status: DocumentStatus::Uploaded,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    stores.blobs.put_bytes(&storage_key, bytes).await.unwrap();
}

/// Build a finding JSON array for the prompt excerpt containing `needle`,
/// copying the page/block tags out of the prompt the way the real model is
/// instructed to.
fn finding_for(prompt: &str, needle: &str, severity: &str) -> Option<String> {
    let line = prompt.lines().find(|l| l.contains(needle))?;
    let tag = Regex::new(r"\[page (\d+) \| block (\d+)").unwrap();
    let caps = tag.captures(line)?;
    Some(format!(
        r#"[{{
            "page_number": {},
            "block_index": {},
            "control_id": "GDPR-5.1",
            "severity": "{}",
            "issue_description": "No retention period",
            "bookmark_type": "action_required",
            "suggested_action": "Define a retention period"
        }}]"#,
        &caps[1], &caps[2], severity
    ))
}

/// Counts invocations, then delegates to a fixed response
struct CountingClient {
    calls: Arc<AtomicUsize>,
    response: String,
}

#[async_trait]
impl ModelClient for CountingClient {
    async fn invoke(&self, _prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

const RETENTION_LINE: &str = "We may retain personal data indefinitely";

#[tokio::test]
async fn test_end_to_end_retention_example() {
    let handles = stores_with_handles();
    seed_document(
        &handles.stores,
        "doc-1",
        build_pdf(&[
            &[
                RETENTION_LINE,
                "Our services are described in the sections that follow today.",
            ],
            &["Nothing of regulatory interest appears on this page at all."],
        ]),
    )
    .await;

    let model = Arc::new(FnClient(|prompt: &str| {
        Ok(finding_for(prompt, "retain personal data", "high").unwrap_or_else(|| "[]".to_string()))
    }));
    let engine = ComplianceEngine::new(handles.stores.clone(), model);

    let outcome = engine.analyze("doc-1", "GDPR", false).await.unwrap();
    assert!(outcome.success);
    assert!(!outcome.cached);
    assert_eq!(outcome.annotations_count, 1);

    let annotation = &outcome.annotations[0];
    assert_eq!(annotation.page_number, 1);
    assert_eq!(annotation.bookmark_type, BookmarkType::ActionRequired);
    assert_eq!(annotation.severity, Some(Severity::High));
    assert!(annotation.review_comments.contains("No retention period"));
    assert!(annotation
        .review_comments
        .contains("Define a retention period"));

    // One high-severity finding alone is PARTIAL with a score of 90
    let verdict = outcome.final_verdict.unwrap();
    assert_eq!(verdict.verdict, Verdict::Partial);
    assert_eq!(verdict.compliance_score, 90.0);
    assert_eq!(verdict.high_severity_count, 1);
}

#[tokio::test]
async fn test_cache_short_circuit_skips_the_model() {
    let handles = stores_with_handles();
    seed_document(
        &handles.stores,
        "doc-1",
        build_pdf(&[&[RETENTION_LINE]]),
    )
    .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let model = Arc::new(CountingClient {
        calls: calls.clone(),
        response: "[]".to_string(),
    });
    let engine = ComplianceEngine::new(handles.stores.clone(), model);

    let first = engine.analyze("doc-1", "GDPR", false).await.unwrap();
    assert!(!first.cached);
    let calls_after_first = calls.load(Ordering::SeqCst);
    assert!(calls_after_first >= 1);

    let second = engine.analyze("doc-1", "GDPR", false).await.unwrap();
    assert!(second.cached);
    assert!(second.cached_at.is_some());
    assert_eq!(second.analysis_id, first.analysis_id);
    assert_eq!(
        calls.load(Ordering::SeqCst),
        calls_after_first,
        "cache hit must not invoke the model"
    );
}

#[tokio::test]
async fn test_force_reanalysis_appends_a_new_cache_row() {
    let handles = stores_with_handles();
    seed_document(
        &handles.stores,
        "doc-1",
        build_pdf(&[&[RETENTION_LINE]]),
    )
    .await;

    let model = Arc::new(FnClient(|_: &str| Ok("[]".to_string())));
    let engine = ComplianceEngine::new(handles.stores.clone(), model);

    let first = engine.analyze("doc-1", "GDPR", false).await.unwrap();
    let second = engine.analyze("doc-1", "GDPR", true).await.unwrap();
    assert!(!second.cached);
    assert_ne!(second.analysis_id, first.analysis_id);
    assert_eq!(handles.cache.len().await, 2);
}

#[tokio::test]
async fn test_reanalysis_reuses_annotation_ids() {
    let handles = stores_with_handles();
    seed_document(
        &handles.stores,
        "doc-1",
        build_pdf(&[&[RETENTION_LINE]]),
    )
    .await;

    let model = Arc::new(FnClient(|prompt: &str| {
        Ok(finding_for(prompt, "retain personal data", "high").unwrap_or_else(|| "[]".to_string()))
    }));
    let engine = ComplianceEngine::new(handles.stores.clone(), model);

    let first = engine.analyze("doc-1", "GDPR", true).await.unwrap();
    let second = engine.analyze("doc-1", "GDPR", true).await.unwrap();

    assert_eq!(first.annotations_count, 1);
    assert_eq!(second.annotations_count, 1);
    assert_eq!(
        first.annotations[0].annotation_id,
        second.annotations[0].annotation_id,
        "unchanged geometry must update the existing annotation"
    );

    // No duplicate rows in the store
    let stored = handles.annotations.list_by_document("doc-1").await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_partial_batch_failure_is_isolated() {
    let handles = stores_with_handles();
    seed_document(
        &handles.stores,
        "doc-1",
        build_pdf(&[
            &[RETENTION_LINE],
            &["Access control lists are reviewed by the security team yearly."],
        ]),
    )
    .await;

    // A one-token budget forces every relevant block into its own batch
    let model = Arc::new(FnClient(|prompt: &str| {
        if prompt.contains("Access control") {
            Err(ModelError::Request("socket closed".to_string()))
        } else {
            Ok(finding_for(prompt, "retain personal data", "high")
                .unwrap_or_else(|| "[]".to_string()))
        }
    }));
    let engine = ComplianceEngine::new(handles.stores.clone(), model).with_config(EngineConfig {
        max_tokens_per_batch: 1,
        ..EngineConfig::default()
    });

    let outcome = engine.analyze("doc-1", "GDPR", false).await.unwrap();
    assert!(
        outcome.success,
        "one failed batch must not fail the analysis"
    );
    assert_eq!(outcome.annotations_count, 1);
    assert!(outcome.annotations[0]
        .review_comments
        .contains("No retention period"));
}

#[tokio::test]
async fn test_dangling_block_index_is_ignored_end_to_end() {
    let handles = stores_with_handles();
    seed_document(
        &handles.stores,
        "doc-1",
        build_pdf(&[&[RETENTION_LINE]]),
    )
    .await;

    // The model hallucinates an index that no extracted block has
    let model = Arc::new(FnClient(|_: &str| {
        Ok(r#"[{
            "page_number": 1,
            "block_index": 4242,
            "control_id": "GDPR-5.1",
            "severity": "high",
            "issue_description": "ghost",
            "suggested_action": "none"
        }]"#
            .to_string())
    }));
    let engine = ComplianceEngine::new(handles.stores.clone(), model);

    let outcome = engine.analyze("doc-1", "GDPR", false).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.annotations_count, 0);
    let verdict = outcome.final_verdict.unwrap();
    assert_eq!(verdict.verdict, Verdict::Compliant);
}

#[tokio::test]
async fn test_status_side_effect_is_written() {
    let handles = stores_with_handles();
    seed_document(
        &handles.stores,
        "doc-1",
        build_pdf(&[&[RETENTION_LINE]]),
    )
    .await;

    let model = Arc::new(FnClient(|prompt: &str| {
        Ok(finding_for(prompt, "retain personal data", "high").unwrap_or_else(|| "[]".to_string()))
    }));
    let engine = ComplianceEngine::new(handles.stores.clone(), model);
    engine.analyze("doc-1", "GDPR", false).await.unwrap();

    let record = handles
        .stores
        .documents
        .get_document("doc-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, DocumentStatus::PartiallyCompliant);
}
