//! Failure types at each component boundary.
//!
//! None of these escape the pipeline entry points: store faults become empty
//! results, resolution faults fall back to a random document, and embedding
//! faults turn into placeholder results.

/// A store query failed to execute.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store query failed during {stage}: {reason}")]
    Query { stage: &'static str, reason: String },

    #[error("store holds an invalid value: {0}")]
    InvalidValue(String),

    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn query(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Query {
            stage,
            reason: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Query {
            stage: "sqlite",
            reason: err.to_string(),
        }
    }
}

/// The query could not be turned into a vector.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding provider returned no vector")]
    Empty,

    #[error("embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown embedding provider: {0}")]
    UnknownProvider(String),
}

/// A document id could not be mapped to a URL.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("document {0} not found")]
    DocumentNotFound(String),

    #[error("filename {filename:?} has no usable segment")]
    UnusableFilename { filename: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Text generation failed.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation returned empty text")]
    Empty,

    #[error("unknown generation provider: {0}")]
    UnknownProvider(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
