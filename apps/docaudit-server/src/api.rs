//! API handlers for the docaudit server
//!
//! Provides REST endpoints for:
//! - Document upload
//! - Compliance analysis
//! - Annotation listing and triage

use axum::{
    extract::{Path, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use compliance_engine::{AnnotationStore, BlobStore, ControlsRepository, DocumentStore};
use serde::{Deserialize, Serialize};
use shared_types::{AnalysisOutcome, Annotation, DocumentRecord, DocumentStatus, Framework};
use tracing::info;
use uuid::Uuid;

use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "docaudit-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Framework list response
#[derive(Serialize)]
pub struct FrameworkListResponse {
    pub success: bool,
    pub frameworks: Vec<FrameworkInfo>,
}

/// Framework metadata
#[derive(Serialize)]
pub struct FrameworkInfo {
    pub id: String,
    pub controls: usize,
}

/// Handler: GET /api/frameworks
pub async fn handle_list_frameworks(
    State(state): State<AppState>,
) -> Result<Json<FrameworkListResponse>, ServerError> {
    let mut frameworks = Vec::new();
    for framework in Framework::all() {
        let controls = state
            .stores
            .controls
            .list_controls(framework)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        frameworks.push(FrameworkInfo {
            id: framework.as_str().to_string(),
            controls: controls.len(),
        });
    }
    Ok(Json(FrameworkListResponse {
        success: true,
        frameworks,
    }))
}

/// Document upload request body
#[derive(Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    /// Base64-encoded PDF bytes
    pub data: String,
}

/// Document upload response
#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub document_id: String,
}

/// Handler: POST /api/documents
pub async fn handle_upload_document(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ServerError> {
    if req.filename.trim().is_empty() {
        return Err(ServerError::InvalidRequest(
            "filename must not be empty".to_string(),
        ));
    }

    let bytes = BASE64
        .decode(req.data.as_bytes())
        .map_err(|e| ServerError::InvalidRequest(format!("data is not valid base64: {}", e)))?;
    if bytes.len() < 4 || &bytes[0..4] != b"%PDF" {
        return Err(ServerError::InvalidRequest(
            "data does not look like a PDF".to_string(),
        ));
    }

    let document_id = Uuid::new_v4().to_string();
    let storage_key = format!("documents/{}", document_id);

    state
        .stores
        .blobs
        .put_bytes(&storage_key, bytes)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    state
        .stores
        .documents
        .put_document(DocumentRecord {
            document_id: document_id.clone(),
            filename: req.filename,
            storage_key,
            status: DocumentStatus::Uploaded,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    info!("document '{}' uploaded", document_id);
    Ok(Json(UploadResponse {
        success: true,
        document_id,
    }))
}

/// Analysis request body
#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub document_id: String,

    /// Framework identifier: "GDPR", "SOC2", or "HIPAA"
    pub framework: String,

    /// Bypass the analysis cache and recompute
    #[serde(default)]
    pub force_reanalysis: bool,
}

/// Handler: POST /api/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisOutcome>, ServerError> {
    info!(
        "analyze request: document={}, framework={}, force={}",
        req.document_id, req.framework, req.force_reanalysis
    );

    let outcome = state
        .engine
        .analyze(&req.document_id, &req.framework, req.force_reanalysis)
        .await?;

    Ok(Json(outcome))
}

/// Annotation list response
#[derive(Serialize)]
pub struct AnnotationListResponse {
    pub success: bool,
    pub annotations: Vec<Annotation>,
    pub count: usize,
}

/// Handler: GET /api/documents/:id/annotations
pub async fn handle_list_annotations(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<AnnotationListResponse>, ServerError> {
    let annotations = state
        .stores
        .annotations
        .list_by_document(&document_id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let count = annotations.len();
    Ok(Json(AnnotationListResponse {
        success: true,
        annotations,
        count,
    }))
}

/// Annotation triage request body
#[derive(Deserialize)]
pub struct ResolveRequest {
    pub resolved: bool,
}

/// Annotation triage response
#[derive(Serialize)]
pub struct ResolveResponse {
    pub success: bool,
    pub annotation_id: String,
    pub resolved: bool,
}

/// Handler: POST /api/annotations/:id/resolve
pub async fn handle_resolve_annotation(
    State(state): State<AppState>,
    Path(annotation_id): Path<String>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ServerError> {
    let found = state
        .stores
        .annotations
        .set_resolved(&annotation_id, req.resolved)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    if !found {
        return Err(ServerError::NotFound(format!(
            "annotation '{}' not found",
            annotation_id
        )));
    }

    Ok(Json(ResolveResponse {
        success: true,
        annotation_id,
        resolved: req.resolved,
    }))
}
