//! Error types for ragdex.
//!
//! A single error enum covers configuration, I/O, embedding, indexing and
//! persistence failures. Retrieval errors are structured so the layer above
//! the engine can map them to a response without parsing messages.

use thiserror::Error;

/// Unified error type for ragdex.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic: errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad chunking, search or application parameters (caller error)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid query arguments such as `top_k == 0` or an empty question
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The embedding capability could not be reached or initialized
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A vector does not have the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The persisted index and the active embedder disagree on dimension
    #[error(
        "Index '{name}' has dimension {index_dimension} but the active embedder produces {embedder_dimension}"
    )]
    EmbedderIndexMismatch {
        name: String,
        index_dimension: usize,
        embedder_dimension: usize,
    },

    /// A vector cannot be normalized (zero norm or non-finite values)
    #[error("Invalid vector for '{chunk_id}': {reason}")]
    InvalidVector { chunk_id: String, reason: String },

    /// Chunk ids are append-once
    #[error("Duplicate chunk id: {0}")]
    DuplicateChunkId(String),

    /// No committed index exists under this name
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Persisted artifacts failed the load-time consistency checks
    #[error("Corrupt index '{name}': {reason}")]
    CorruptIndex { name: String, reason: String },

    /// Another build for the same index name is in flight
    #[error("A build for index '{0}' is already in progress")]
    BuildInProgress(String),

    /// Storage-medium failure while committing an index
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidConfiguration(_) => "invalid_configuration",
            AppError::InvalidQuery(_) => "invalid_query",
            AppError::EmbeddingUnavailable(_) => "embedding_unavailable",
            AppError::DimensionMismatch { .. } => "dimension_mismatch",
            AppError::EmbedderIndexMismatch { .. } => "embedder_index_mismatch",
            AppError::InvalidVector { .. } => "invalid_vector",
            AppError::DuplicateChunkId(_) => "duplicate_chunk_id",
            AppError::IndexNotFound(_) => "index_not_found",
            AppError::CorruptIndex { .. } => "corrupt_index",
            AppError::BuildInProgress(_) => "build_in_progress",
            AppError::Storage(_) => "storage",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Serialization(_) => "serialization",
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingUnavailable(_) | AppError::BuildInProgress(_)
        )
    }

    /// Shorthand for a [`AppError::CorruptIndex`].
    pub fn corrupt(name: &str, reason: impl Into<String>) -> Self {
        AppError::CorruptIndex {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
