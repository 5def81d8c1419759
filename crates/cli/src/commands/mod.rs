//! Command handlers for the ragdex CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod build;
pub mod query;
pub mod stats;

// Re-export command types for convenience
pub use build::BuildCommand;
pub use query::QueryCommand;
pub use stats::StatsCommand;

use ragdex_core::{config::AppConfig, AppResult};
use ragdex_knowledge::{create_provider, IndexStore, RetrievalService, ServiceOptions};

/// Wire the configured embedder and index store into a service.
pub(crate) async fn open_service(
    config: &AppConfig,
    options: ServiceOptions,
) -> AppResult<RetrievalService> {
    let provider = create_provider(&config.retrieval.embedding).await?;
    let store = IndexStore::new(config.index_dir());

    tracing::debug!(
        "Opened index store at {:?} with {}/{}",
        store.root(),
        provider.provider_name(),
        provider.model_name()
    );

    Ok(RetrievalService::new(store, provider, options))
}
