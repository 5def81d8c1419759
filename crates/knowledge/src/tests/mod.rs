//! Cross-component tests for the retrieval engine.


use crate::embeddings::providers::trigram::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::service::{RetrievalService, ServiceOptions};
use crate::store::IndexStore;
use crate::types::LoadedDocument;
use async_trait::async_trait;
use ragdex_core::{AppError, AppResult};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};

pub(crate) const FOX_TEXT: &str = "The quick brown fox. The lazy dog sleeps.";

/// Document with loader-style metadata.
pub(crate) fn doc(document_id: &str, text: &str) -> LoadedDocument {
    let mut document = LoadedDocument::new(document_id, text);
    document
        .metadata
        .insert("path".to_string(), format!("{}.txt", document_id));
    document
        .metadata
        .insert("ext".to_string(), "txt".to_string());
    document
}

pub(crate) fn corpus() -> Vec<LoadedDocument> {
    vec![
        doc(
            "rust",
            "Rust guarantees memory safety through ownership and borrowing without a garbage collector.",
        ),
        doc(
            "tokio",
            "Tokio is an asynchronous runtime providing tasks, timers and networking primitives.",
        ),
        doc(
            "serde",
            "Serde serializes and deserializes data structures into formats like JSON and YAML.",
        ),
    ]
}

pub(crate) fn service_with(
    temp: &TempDir,
    provider: Arc<dyn EmbeddingProvider>,
    options: ServiceOptions,
) -> RetrievalService {
    RetrievalService::new(IndexStore::new(temp.path()), provider, options)
}

pub(crate) fn trigram_service(temp: &TempDir) -> RetrievalService {
    service_with(
        temp,
        Arc::new(TrigramProvider::new(384)),
        ServiceOptions::default(),
    )
}

/// Trigram embedder that fails any batch containing `poison`.
#[derive(Debug)]
pub(crate) struct PoisonedProvider {
    inner: TrigramProvider,
    poison: &'static str,
}

impl PoisonedProvider {
    pub(crate) fn new(poison: &'static str) -> Self {
        Self {
            inner: TrigramProvider::new(384),
            poison,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for PoisonedProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(self.poison)) {
            return Err(AppError::EmbeddingUnavailable(
                "embedding backend went away".to_string(),
            ));
        }
        self.inner.embed_batch(texts).await
    }
}

/// Trigram embedder that parks batches until the test opens the gate.
///
/// With a marker only batches containing it are parked.
#[derive(Debug)]
pub(crate) struct GatedProvider {
    inner: TrigramProvider,
    marker: Option<&'static str>,
    pub(crate) entered: Arc<Notify>,
    pub(crate) gate: Arc<Semaphore>,
}

impl GatedProvider {
    pub(crate) fn new() -> Self {
        Self {
            inner: TrigramProvider::new(384),
            marker: None,
            entered: Arc::new(Notify::new()),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    pub(crate) fn marked(marker: &'static str) -> Self {
        Self {
            marker: Some(marker),
            ..Self::new()
        }
    }

    /// Let every current and future batch through.
    pub(crate) fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl EmbeddingProvider for GatedProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if let Some(marker) = self.marker {
            if !texts.iter().any(|t| t.contains(marker)) {
                return self.inner.embed_batch(texts).await;
            }
        }

        self.entered.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| AppError::EmbeddingUnavailable("gate closed".to_string()))?;
        self.inner.embed_batch(texts).await
    }
}
