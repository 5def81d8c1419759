//! Document retrieval engine.
//!
//! Loads text documents, cuts them into overlapping character windows,
//! embeds each window and answers questions by exact cosine search over
//! named, atomically persisted indexes.
//!
//! The usual entry point is [`RetrievalService`]:
//!
//! ```no_run
//! use ragdex_knowledge::{create_provider, IndexStore, RetrievalService, ServiceOptions};
//! use ragdex_core::EmbeddingConfig;
//!
//! # async fn example() -> ragdex_core::AppResult<()> {
//! let provider = create_provider(&EmbeddingConfig::default()).await?;
//! let service = RetrievalService::new(
//!     IndexStore::new(".ragdex/index"),
//!     provider,
//!     ServiceOptions::default(),
//! );
//!
//! let hits = service.query("default", "how do I configure logging?", 5).await?;
//! for hit in hits {
//!     println!("{:.3} {}", hit.score, hit.source_metadata.source_path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod progress;
pub mod service;
pub mod store;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::NamedIndex;
pub use loader::TextFolderLoader;
pub use progress::{ProgressEvent, ProgressReporter};
pub use service::{RetrievalService, ServiceOptions};
pub use store::IndexStore;
pub use types::{
    BuildReport, BuildRequest, Chunk, ChunkMetadata, IndexStats, LoadedDocument, RetrievalResult,
    RetrieveRequest, RetrievedDocument, DEFAULT_INDEX_NAME,
};
pub use vector_index::{FlatIndex, VectorIndex};
