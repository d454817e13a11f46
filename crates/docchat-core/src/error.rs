//! Error taxonomy for lifecycle operations.

use thiserror::Error;

/// Errors surfaced by [`DocumentService`](crate::lifecycle::DocumentService).
///
/// A missing document and a document owned by someone else both map to
/// [`NotFoundOrForbidden`](LifecycleError::NotFoundOrForbidden) so callers
/// cannot probe for ids they do not own.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no authenticated user")]
    Unauthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("document not found")]
    NotFoundOrForbidden,

    #[error("document has not been summarized yet")]
    NotYetSummarized,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl LifecycleError {
    /// Machine-readable code used by transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::Unauthorized => "unauthorized",
            LifecycleError::InvalidInput(_) => "bad_request",
            LifecycleError::ExtractionFailed(_) => "extraction_failed",
            LifecycleError::GenerationFailed(_) => "generation_failed",
            LifecycleError::NotFoundOrForbidden => "not_found",
            LifecycleError::NotYetSummarized => "not_yet_summarized",
            LifecycleError::Store(_) => "internal",
        }
    }
}

/// Failure reported by a [`TextExtractor`](crate::adapters::TextExtractor).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ExtractionError(pub String);

/// Failure reported by a [`Generator`](crate::adapters::Generator).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

impl From<ExtractionError> for LifecycleError {
    fn from(e: ExtractionError) -> Self {
        LifecycleError::ExtractionFailed(e.0)
    }
}

impl From<GenerationError> for LifecycleError {
    fn from(e: GenerationError) -> Self {
        LifecycleError::GenerationFailed(e.0)
    }
}

pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;
