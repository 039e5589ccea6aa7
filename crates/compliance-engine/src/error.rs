//! Error taxonomy for the analysis pipeline

use shared_pdf::ExtractError;
use thiserror::Error;

use crate::model::ModelError;
use crate::stores::StoreError;

/// Pipeline error taxonomy.
///
/// Only `Validation` and `NotFound` abort an analyze request with no partial
/// result; every other variant degrades to a structured failure result at the
/// orchestrator boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("model invocation failed: {0}")]
    Model(#[from] ModelError),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ExtractError> for EngineError {
    fn from(err: ExtractError) -> Self {
        EngineError::Extraction(err.to_string())
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Internal(err.to_string())
    }
}
