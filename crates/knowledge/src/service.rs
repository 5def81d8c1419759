//! Retrieval service: builds, appends and queries named indexes.
//!
//! Queries share committed indexes through `Arc<NamedIndex>` and never
//! block each other. Builds are serialized per name; a second build for a
//! name that is already building fails fast with `BuildInProgress`. The
//! in-memory cache only changes after a build has committed to disk.

use crate::chunker::chunk_document;
use crate::embeddings::{embed_in_batches, EmbeddingProvider};
use crate::index::NamedIndex;
use crate::loader::TextFolderLoader;
use crate::progress::ProgressReporter;
use crate::store::{validate_name, IndexStore};
use crate::types::{
    BuildReport, BuildRequest, Chunk, IndexStats, LoadedDocument, RetrievalResult,
    RetrieveRequest, RetrievedDocument,
};
use crate::vector_index::VectorIndex;
use ragdex_core::config::validate_window;
use ragdex_core::{AppError, AppResult, RetrievalConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Tunables applied by the service on every call.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Drop hits scoring below this value
    pub min_score: Option<f32>,
    /// Maximum snippet length in characters
    pub snippet_chars: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// File extensions picked up by folder builds
    pub extensions: Vec<String>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            min_score: None,
            snippet_chars: 240,
            batch_size: 64,
            extensions: vec!["txt".to_string(), "md".to_string()],
        }
    }
}

impl From<&RetrievalConfig> for ServiceOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            min_score: config.min_score,
            snippet_chars: config.snippet_chars,
            batch_size: config.embedding.batch_size,
            extensions: config.extensions.clone(),
        }
    }
}

/// Front door of the retrieval engine.
#[derive(Debug)]
pub struct RetrievalService {
    store: IndexStore,
    provider: Arc<dyn EmbeddingProvider>,
    options: ServiceOptions,
    cache: Arc<RwLock<HashMap<String, Arc<NamedIndex>>>>,
    build_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    progress: ProgressReporter,
}

impl RetrievalService {
    pub fn new(
        store: IndexStore,
        provider: Arc<dyn EmbeddingProvider>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            store,
            provider,
            options,
            cache: Arc::new(RwLock::new(HashMap::new())),
            build_locks: Mutex::new(HashMap::new()),
            progress: ProgressReporter::noop(),
        }
    }

    /// Report build phases through `progress`.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Replace the index under `name` with one built from `documents`.
    #[tracing::instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn build(
        &self,
        name: &str,
        documents: &[LoadedDocument],
        window_size: usize,
        overlap: usize,
    ) -> AppResult<BuildReport> {
        let start = Instant::now();
        validate_name(name)?;
        validate_window(window_size, overlap)?;
        let guard = self.acquire_build_lock(name).await?;

        let base = NamedIndex::for_provider(name, self.provider.as_ref());
        self.run_build(base, documents, window_size, overlap, guard, start)
            .await
    }

    /// Add `documents` to the committed index under `name`, or to an empty
    /// one if nothing is committed yet.
    #[tracing::instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn append(
        &self,
        name: &str,
        documents: &[LoadedDocument],
        window_size: usize,
        overlap: usize,
    ) -> AppResult<BuildReport> {
        let start = Instant::now();
        validate_name(name)?;
        validate_window(window_size, overlap)?;
        let guard = self.acquire_build_lock(name).await?;

        let base = match self.get_index(name).await {
            Ok(committed) => {
                committed.check_embedder(self.provider.as_ref())?;
                NamedIndex::clone(&committed)
            }
            Err(AppError::IndexNotFound(_)) => {
                NamedIndex::for_provider(name, self.provider.as_ref())
            }
            Err(e) => return Err(e),
        };

        self.run_build(base, documents, window_size, overlap, guard, start)
            .await
    }

    /// Load a folder and build (or append) from it.
    pub async fn build_from_folder(&self, request: &BuildRequest) -> AppResult<BuildReport> {
        validate_name(&request.index_name)?;

        let loader = TextFolderLoader::new(&self.options.extensions);
        let documents = loader.load(&request.source_folder)?;
        self.progress.load(
            documents.len() as u64,
            &request.source_folder.display().to_string(),
        );

        if request.append {
            self.append(
                &request.index_name,
                &documents,
                request.window_size,
                request.overlap,
            )
            .await
        } else {
            self.build(
                &request.index_name,
                &documents,
                request.window_size,
                request.overlap,
            )
            .await
        }
    }

    /// Rank chunks of `name` against `question`.
    ///
    /// Returns at most `top_k` results, best first. Nothing is returned when
    /// the index is empty or no hit reaches the minimum score.
    #[tracing::instrument(skip(self, question))]
    pub async fn query(
        &self,
        name: &str,
        question: &str,
        top_k: usize,
    ) -> AppResult<Vec<RetrievalResult>> {
        validate_name(name)?;
        if top_k == 0 {
            return Err(AppError::InvalidQuery("top_k must be at least 1".to_string()));
        }
        if question.trim().is_empty() {
            return Err(AppError::InvalidQuery("question text is empty".to_string()));
        }

        let named = self.get_index(name).await?;
        named.check_embedder(self.provider.as_ref())?;

        if named.is_empty() {
            tracing::info!("Index '{}' is empty", name);
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed(question).await?;
        let hits = named.index.search(&query_vector, top_k)?;

        let mut results = Vec::with_capacity(hits.len());
        for (chunk_id, score) in hits {
            if self.options.min_score.is_some_and(|min| score < min) {
                continue;
            }

            let record = named.metadata.get(&chunk_id).ok_or_else(|| {
                AppError::corrupt(name, format!("no metadata for chunk id '{}'", chunk_id))
            })?;

            results.push(RetrievalResult {
                snippet: make_snippet(&record.text, self.options.snippet_chars),
                source_metadata: record.metadata.clone(),
                chunk_id,
                score,
            });
        }

        match (results.first(), results.last()) {
            (Some(top), Some(lowest)) => tracing::info!(
                "Retrieved {} chunks from '{}' (top score: {:.3}, lowest: {:.3})",
                results.len(),
                name,
                top.score,
                lowest.score
            ),
            _ => tracing::info!("No chunks from '{}' met the score threshold", name),
        }

        Ok(results)
    }

    /// Query interface returning citations only.
    pub async fn retrieve(&self, request: &RetrieveRequest) -> AppResult<Vec<RetrievedDocument>> {
        let results = self
            .query(&request.index_name, &request.query_text, request.top_k)
            .await?;

        Ok(results
            .into_iter()
            .map(|r| RetrievedDocument {
                source_path: r.source_metadata.source_path,
                snippet: r.snippet,
                score: r.score,
            })
            .collect())
    }

    /// Statistics for the committed index under `name`.
    pub async fn stats(&self, name: &str) -> AppResult<IndexStats> {
        validate_name(name)?;
        let named = self.get_index(name).await?;

        Ok(IndexStats {
            name: named.name.clone(),
            generation: named.generation,
            row_count: named.len(),
            dimension: named.dimension(),
            metric: named.config.metric,
            document_count: named.document_count(),
            embedder: named.config.embedder.clone(),
            built_at: named.config.built_at,
        })
    }

    /// Drop the cached copy of `name` so the next query reloads from disk.
    pub async fn invalidate(&self, name: &str) {
        if self.cache.write().await.remove(name).is_some() {
            tracing::debug!("Invalidated cached index '{}'", name);
        }
    }

    /// Chunk, embed, index and commit onto `named`, then publish it.
    async fn run_build(
        &self,
        mut named: NamedIndex,
        documents: &[LoadedDocument],
        window_size: usize,
        overlap: usize,
        guard: OwnedMutexGuard<()>,
        start: Instant,
    ) -> AppResult<BuildReport> {
        let name = named.name.clone();
        let total_documents = documents.len() as u64;

        let mut chunks: Vec<Chunk> = Vec::new();
        for (i, document) in documents.iter().enumerate() {
            chunks.extend(chunk_document(document, window_size, overlap)?);
            self.progress
                .chunk(i as u64 + 1, Some(total_documents), chunks.len());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let total_texts = texts.len() as u64;
        self.progress
            .embed(0, Some(total_texts), self.provider.model_name());
        let vectors =
            embed_in_batches(self.provider.as_ref(), &texts, self.options.batch_size).await?;
        self.progress
            .embed(total_texts, Some(total_texts), self.provider.model_name());

        let chunk_count = chunks.len();
        let vector_count = vectors.len();
        named.add_chunks(chunks, vectors)?;
        self.progress.index(named.len() as u64);

        let total_rows = named.len();
        let generation = self.commit(named, guard).await?;
        self.progress.commit(generation);

        let duration = start.elapsed();
        tracing::info!(
            "Built index '{}': {} documents, {} chunks, {} rows in {:.2}s",
            name,
            documents.len(),
            chunk_count,
            total_rows,
            duration.as_secs_f64()
        );

        Ok(BuildReport {
            name,
            document_count: documents.len(),
            chunk_count,
            vector_count,
            total_rows,
            generation,
            duration_secs: duration.as_secs_f64(),
        })
    }

    /// Save `named` as the next generation and publish it to the cache.
    ///
    /// Runs on its own task, so once started the disk commit and the cache
    /// swap both complete even if the caller is dropped. The build lock is
    /// released only after both.
    async fn commit(&self, mut named: NamedIndex, guard: OwnedMutexGuard<()>) -> AppResult<u64> {
        let store = self.store.clone();
        let cache = Arc::clone(&self.cache);

        let task = tokio::spawn(async move {
            let _guard = guard;
            let name = named.name.clone();
            let (named, generation) =
                tokio::task::spawn_blocking(move || -> AppResult<(NamedIndex, u64)> {
                    let generation = store.save(&mut named)?;
                    Ok((named, generation))
                })
                .await
                .map_err(|e| AppError::Storage(format!("index save task failed: {}", e)))??;

            cache.write().await.insert(name, Arc::new(named));
            Ok::<u64, AppError>(generation)
        });

        task.await
            .map_err(|e| AppError::Storage(format!("index commit task failed: {}", e)))?
    }

    async fn acquire_build_lock(&self, name: &str) -> AppResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.build_locks.lock().await;
            Arc::clone(
                locks
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        lock.try_lock_owned().map_err(|_| {
            tracing::warn!("Rejected build for '{}': another build is running", name);
            AppError::BuildInProgress(name.to_string())
        })
    }

    /// Cached index for `name`, loading it from disk on a miss.
    async fn get_index(&self, name: &str) -> AppResult<Arc<NamedIndex>> {
        if let Some(named) = self.cache.read().await.get(name) {
            return Ok(Arc::clone(named));
        }

        let store = self.store.clone();
        let owned_name = name.to_string();
        let loaded = tokio::task::spawn_blocking(move || store.load(&owned_name))
            .await
            .map_err(|e| AppError::Storage(format!("index load task failed: {}", e)))??;

        let mut cache = self.cache.write().await;
        // A build may have published a newer generation while we were reading
        match cache.get(name) {
            Some(existing) if existing.generation >= loaded.generation => Ok(Arc::clone(existing)),
            _ => {
                let loaded = Arc::new(loaded);
                cache.insert(name.to_string(), Arc::clone(&loaded));
                Ok(loaded)
            }
        }
    }
}

/// Collapse whitespace runs and cut to `max_chars` characters.
pub fn make_snippet(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => collapsed[..cut].to_string(),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_collapses_whitespace() {
        assert_eq!(make_snippet("  a\n\n b\t c  ", 240), "a b c");
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        assert_eq!(make_snippet("héllo wörld", 4), "héll");
        assert_eq!(make_snippet("short", 240), "short");
        assert_eq!(make_snippet("exact", 5), "exact");
    }

    #[test]
    fn test_options_from_config() {
        let config = RetrievalConfig {
            min_score: Some(0.3),
            snippet_chars: 80,
            ..Default::default()
        };

        let options = ServiceOptions::from(&config);
        assert_eq!(options.min_score, Some(0.3));
        assert_eq!(options.snippet_chars, 80);
        assert_eq!(options.batch_size, 64);
        assert_eq!(options.extensions, vec!["txt", "md"]);
    }
}
