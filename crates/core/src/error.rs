//! Error types for the viewer core

use notepdf_scheduler::WorkerError;

/// Failure reported by the OCR collaborator
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    /// The engine ran but could not recognize the image
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// The engine is not installed or not initialized
    #[error("OCR engine unavailable")]
    Unavailable,
}

/// Failure reported by the persistent annotation store
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors from annotation operations
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// Errors while loading viewer configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("invalid value for {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from opening, driving, or closing a document session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("failed to spawn background scan: {0}")]
    Scan(#[from] std::io::Error),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),
}
