//! Build command handler.
//!
//! Loads a folder of documents and commits it as a named index.

use super::open_service;
use clap::Args;
use ragdex_core::{config::AppConfig, AppResult};
use ragdex_knowledge::{
    BuildRequest, ProgressEvent, ProgressReporter, ServiceOptions, DEFAULT_INDEX_NAME,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Build an index from a folder of documents
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Folder to load documents from
    pub source: PathBuf,

    /// Index name
    #[arg(long, default_value = DEFAULT_INDEX_NAME)]
    pub name: String,

    /// Chunk window in characters (default from config)
    #[arg(long)]
    pub window: Option<usize>,

    /// Overlap between consecutive windows in characters (default from config)
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Add to the committed index instead of replacing it
    #[arg(long)]
    pub append: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command for index '{}'", self.name);

        let mut service =
            open_service(config, ServiceOptions::from(&config.retrieval)).await?;
        if !self.json {
            service = service.with_progress(ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple());
            })));
        }

        let request = BuildRequest {
            index_name: self.name.clone(),
            source_folder: self.source.clone(),
            window_size: self.window.unwrap_or(config.retrieval.window_size),
            overlap: self.overlap.unwrap_or(config.retrieval.overlap),
            append: self.append,
        };
        tracing::debug!("Build request: {:?}", request);

        let report = service.build_from_folder(&request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "{} index '{}' generation {}: {} documents, {} chunks ({} rows total) in {:.2}s",
                if self.append { "Appended to" } else { "Built" },
                report.name,
                report.generation,
                report.document_count,
                report.chunk_count,
                report.total_rows,
                report.duration_secs
            );
        }

        Ok(())
    }
}
