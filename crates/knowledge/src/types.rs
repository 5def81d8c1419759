//! Retrieval engine type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Index name used when the caller does not pick one.
pub const DEFAULT_INDEX_NAME: &str = "default";

/// A raw document produced by a loader, before chunking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedDocument {
    /// Stable identifier (e.g. "guides/setup")
    pub document_id: String,

    /// Full document text
    pub text: String,

    /// Loader metadata (e.g. {"path": "guides/setup.md", "ext": "md"})
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl LoadedDocument {
    /// Create a document with no loader metadata.
    pub fn new(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Path used for citations; falls back to the document id.
    pub fn source_path(&self) -> &str {
        self.metadata
            .get("path")
            .map(String::as_str)
            .unwrap_or(&self.document_id)
    }
}

/// Citation metadata attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Document the chunk was cut from
    pub document_id: String,

    /// Source path (relative, POSIX separators)
    pub source_path: String,

    /// First character of the window (inclusive)
    pub char_start: usize,

    /// End of the window (exclusive)
    pub char_end: usize,

    /// Window size used by the chunker
    pub window_size: usize,

    /// Overlap used by the chunker
    pub overlap: usize,

    /// Loader-specific fields
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// A window of document text, the unit that gets embedded and indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id: `{document_id}::c{char_start}`
    pub chunk_id: String,

    /// Exact window text
    pub text: String,

    /// Citation metadata
    pub metadata: ChunkMetadata,
}

/// What the metadata map stores per chunk id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Full chunk text, used to build snippets
    pub text: String,

    /// Citation metadata
    pub metadata: ChunkMetadata,
}

impl From<Chunk> for ChunkRecord {
    fn from(chunk: Chunk) -> Self {
        Self {
            text: chunk.text,
            metadata: chunk.metadata,
        }
    }
}

/// Similarity metric. Only cosine via inner product on unit vectors is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Metric {
    #[default]
    #[serde(rename = "ip")]
    InnerProduct,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::InnerProduct => "ip",
        }
    }
}

/// Provider/model pair that produced an index's vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedderIdentity {
    pub provider: String,
    pub model: String,
}

/// Config record persisted with every index generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimension; every row must match it
    pub dimension: usize,

    /// Similarity metric
    #[serde(default)]
    pub metric: Metric,

    /// Layout version of the artifact set
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    /// Number of rows in the index artifact
    #[serde(default)]
    pub row_count: usize,

    /// Embedder that produced the vectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedder: Option<EmbedderIdentity>,

    /// SHA-256 of index.bin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_sha256: Option<String>,

    /// When the generation was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
}

fn default_format_version() -> u32 {
    1
}

impl IndexConfig {
    /// Config for an empty index of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            metric: Metric::InnerProduct,
            format_version: default_format_version(),
            row_count: 0,
            embedder: None,
            index_sha256: None,
            built_at: None,
        }
    }

    pub fn with_embedder(mut self, provider: &str, model: &str) -> Self {
        self.embedder = Some(EmbedderIdentity {
            provider: provider.to_string(),
            model: model.to_string(),
        });
        self
    }
}

/// Result of a build or append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    /// Index name
    pub name: String,

    /// Documents consumed by this run
    pub document_count: usize,

    /// Chunks produced by this run
    pub chunk_count: usize,

    /// Vectors added by this run
    pub vector_count: usize,

    /// Total rows in the committed index
    pub total_rows: usize,

    /// Generation that was committed
    pub generation: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// One ranked hit with its snippet and citation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub score: f32,
    pub snippet: String,
    pub source_metadata: ChunkMetadata,
}

/// Upward-facing build request.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Index name
    pub index_name: String,

    /// Folder to load documents from
    pub source_folder: PathBuf,

    /// Chunk window in characters
    pub window_size: usize,

    /// Chunk overlap in characters
    pub overlap: usize,

    /// Append onto the committed index instead of replacing it
    pub append: bool,
}

/// Upward-facing query request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    /// Index name
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Question text
    pub query_text: String,

    /// Number of results
    pub top_k: usize,
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

/// Upward-facing query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub source_path: String,
    pub snippet: String,
    pub score: f32,
}

/// Statistics for a committed index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub name: String,
    pub generation: u64,
    pub row_count: usize,
    pub dimension: usize,
    pub metric: Metric,
    pub document_count: usize,
    pub embedder: Option<EmbedderIdentity>,
    pub built_at: Option<DateTime<Utc>>,
}
