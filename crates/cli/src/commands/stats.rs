//! Stats command handler.
//!
//! Handles index statistics display.

use super::open_service;
use clap::Args;
use ragdex_core::{config::AppConfig, AppResult};
use ragdex_knowledge::{ServiceOptions, DEFAULT_INDEX_NAME};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Index name
    #[arg(long, default_value = DEFAULT_INDEX_NAME)]
    pub name: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command for index '{}'", self.name);

        let service = open_service(config, ServiceOptions::from(&config.retrieval)).await?;
        let stats = service.stats(&self.name).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Index:      {}", stats.name);
        println!("Generation: {}", stats.generation);
        println!("Documents:  {}", stats.document_count);
        println!("Rows:       {}", stats.row_count);
        println!("Dimension:  {} ({})", stats.dimension, stats.metric.as_str());
        if let Some(embedder) = &stats.embedder {
            println!("Embedder:   {}/{}", embedder.provider, embedder.model);
        }
        if let Some(built_at) = stats.built_at {
            println!("Built at:   {}", built_at.to_rfc3339());
        }

        let others: Vec<String> = service
            .store()
            .list()?
            .into_iter()
            .filter(|n| n != &stats.name)
            .collect();
        if !others.is_empty() {
            println!("Other indexes: {}", others.join(", "));
        }

        Ok(())
    }
}
