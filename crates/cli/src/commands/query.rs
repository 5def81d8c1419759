//! Query command handler.
//!
//! Retrieves the best-matching passages for a question.

use super::open_service;
use clap::Args;
use ragdex_core::{config::AppConfig, AppResult};
use ragdex_knowledge::{ServiceOptions, DEFAULT_INDEX_NAME};

/// Query an index
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Question text
    pub text: String,

    /// Index name
    #[arg(long, default_value = DEFAULT_INDEX_NAME)]
    pub name: String,

    /// Number of passages to retrieve (default from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Drop passages scoring below this cosine similarity
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing query command against index '{}'", self.name);

        let mut options = ServiceOptions::from(&config.retrieval);
        if self.min_score.is_some() {
            options.min_score = self.min_score;
        }

        let service = open_service(config, options).await?;
        let top_k = self.top_k.unwrap_or(config.retrieval.top_k);
        let results = service.query(&self.name, &self.text, top_k).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        if results.is_empty() {
            println!("No matching passages.");
            return Ok(());
        }

        for (rank, result) in results.iter().enumerate() {
            let meta = &result.source_metadata;
            println!(
                "{}. [{:.3}] {} (chars {}-{})",
                rank + 1,
                result.score,
                meta.source_path,
                meta.char_start,
                meta.char_end
            );
            println!("   {}", result.snippet);
        }

        Ok(())
    }
}
