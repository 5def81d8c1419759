//! Named index: vectors, row map, metadata and config kept together.

use crate::embeddings::EmbeddingProvider;
use crate::types::{Chunk, ChunkRecord, IndexConfig};
use crate::vector_index::{FlatIndex, VectorIndex};
use ragdex_core::{AppError, AppResult};
use std::collections::{BTreeMap, BTreeSet};

/// Everything one index name resolves to.
///
/// Every row in `index` has a `metadata` entry under the same chunk id,
/// and `config.dimension` always equals the index dimension.
#[derive(Debug, Clone)]
pub struct NamedIndex {
    pub name: String,
    pub index: FlatIndex,
    pub metadata: BTreeMap<String, ChunkRecord>,
    pub config: IndexConfig,
    /// Committed generation, `0` until the first save
    pub generation: u64,
}

impl NamedIndex {
    /// An empty index ready to receive rows.
    pub fn empty(name: impl Into<String>, config: IndexConfig) -> Self {
        Self {
            name: name.into(),
            index: FlatIndex::new(config.dimension),
            metadata: BTreeMap::new(),
            config: IndexConfig {
                row_count: 0,
                index_sha256: None,
                built_at: None,
                ..config
            },
            generation: 0,
        }
    }

    /// Empty index stamped with the provider's dimension and identity.
    pub fn for_provider(name: impl Into<String>, provider: &dyn EmbeddingProvider) -> Self {
        let config = IndexConfig::new(provider.dimensions())
            .with_embedder(provider.provider_name(), provider.model_name());
        Self::empty(name, config)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Add embedded chunks. Fails without touching anything if the index
    /// rejects the batch.
    pub fn add_chunks(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> AppResult<()> {
        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();

        // Metadata can never hold an id the index lacks, but keep the two
        // maps honest before the index commits the rows
        if let Some(dup) = chunk_ids.iter().find(|id| self.metadata.contains_key(*id)) {
            return Err(AppError::DuplicateChunkId(dup.clone()));
        }

        self.index.add(vectors, &chunk_ids)?;

        for chunk in chunks {
            self.metadata
                .insert(chunk.chunk_id.clone(), ChunkRecord::from(chunk));
        }
        self.config.row_count = self.index.len();

        Ok(())
    }

    /// Number of distinct documents with at least one row.
    pub fn document_count(&self) -> usize {
        self.metadata
            .values()
            .map(|record| record.metadata.document_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Confirm the active embedder can query this index.
    ///
    /// A dimension difference is fatal. A different provider or model with
    /// the same dimension only warns, since scores will be meaningless but
    /// the arithmetic still works.
    pub fn check_embedder(&self, provider: &dyn EmbeddingProvider) -> AppResult<()> {
        if provider.dimensions() != self.dimension() {
            return Err(AppError::EmbedderIndexMismatch {
                name: self.name.clone(),
                index_dimension: self.dimension(),
                embedder_dimension: provider.dimensions(),
            });
        }

        if let Some(identity) = &self.config.embedder {
            if identity.provider != provider.provider_name()
                || identity.model != provider.model_name()
            {
                tracing::warn!(
                    "Index '{}' was built with {}/{} but the active embedder is {}/{}",
                    self.name,
                    identity.provider,
                    identity.model,
                    provider.provider_name(),
                    provider.model_name()
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;
    use crate::types::ChunkMetadata;

    fn chunk(document_id: &str, start: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: crate::chunker::chunk_id(document_id, start),
            text: text.to_string(),
            metadata: ChunkMetadata {
                document_id: document_id.to_string(),
                source_path: format!("{}.txt", document_id),
                char_start: start,
                char_end: start + text.chars().count(),
                window_size: 20,
                overlap: 5,
                extra: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn test_add_chunks_keeps_maps_in_step() {
        let mut named = NamedIndex::empty("default", IndexConfig::new(2));
        named
            .add_chunks(
                vec![chunk("a", 0, "one"), chunk("a", 15, "two"), chunk("b", 0, "three")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            )
            .unwrap();

        assert_eq!(named.len(), 3);
        assert_eq!(named.config.row_count, 3);
        assert_eq!(named.document_count(), 2);
        for id in named.index.row_map() {
            assert!(named.metadata.contains_key(id));
        }
    }

    #[test]
    fn test_failed_add_leaves_metadata_untouched() {
        let mut named = NamedIndex::empty("default", IndexConfig::new(2));
        let result = named.add_chunks(
            vec![chunk("a", 0, "one"), chunk("a", 15, "two")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
        );

        assert!(matches!(result, Err(AppError::DimensionMismatch { .. })));
        assert!(named.is_empty());
        assert!(named.metadata.is_empty());
        assert_eq!(named.config.row_count, 0);
    }

    #[test]
    fn test_check_embedder_dimension() {
        let named = NamedIndex::empty("docs", IndexConfig::new(384));

        assert!(named.check_embedder(&TrigramProvider::new(384)).is_ok());
        assert!(matches!(
            named.check_embedder(&TrigramProvider::new(128)),
            Err(AppError::EmbedderIndexMismatch {
                index_dimension: 384,
                embedder_dimension: 128,
                ..
            })
        ));
    }

    #[test]
    fn test_model_drift_only_warns() {
        let config = IndexConfig::new(64).with_embedder("ollama", "nomic-embed-text");
        let named = NamedIndex::empty("docs", config);

        assert!(named.check_embedder(&TrigramProvider::new(64)).is_ok());
    }

    #[test]
    fn test_for_provider_records_identity() {
        let named = NamedIndex::for_provider("docs", &TrigramProvider::new(32));
        let identity = named.config.embedder.as_ref().unwrap();

        assert_eq!(named.dimension(), 32);
        assert_eq!(identity.provider, "trigram");
        assert_eq!(identity.model, "trigram-v1");
        assert_eq!(named.generation, 0);
    }
}
