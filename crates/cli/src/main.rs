//! Ragdex CLI
//!
//! Main entry point for the ragdex command-line tool.
//! Builds named document indexes and answers questions against them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, QueryCommand, StatsCommand};
use ragdex_core::{
    config::AppConfig,
    logging::{self, LogFormat},
    AppError, AppResult,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

/// Ragdex - local document retrieval
#[derive(Parser, Debug)]
#[command(name = "ragdex")]
#[command(about = "Index documents and retrieve the passages that answer a question", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RAGDEX_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RAGDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log line format (text, json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or append to) an index from a folder of documents
    Build(BuildCommand),

    /// Retrieve the passages that best match a question
    Query(QueryCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Build(_) => "build",
            Commands::Query(_) => "query",
            Commands::Stats(_) => "stats",
        }
    }

    fn json(&self) -> bool {
        match self {
            Commands::Build(cmd) => cmd.json,
            Commands::Query(cmd) => cmd.json,
            Commands::Stats(cmd) => cmd.json,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.command.json();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, json);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // Load configuration (file + environment), then apply CLI overrides
    let config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        cli.log_level,
        cli.log_format,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;

    tracing::info!("Ragdex CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Index directory: {:?}", config.index_dir());
    tracing::debug!(
        "Embedding: {}/{} ({} dims)",
        config.retrieval.embedding.provider,
        config.retrieval.embedding.model,
        config.retrieval.embedding.dimensions
    );

    config.validate()?;
    config.ensure_ragdex_dir()?;

    let span = tracing::info_span!("command", name = cli.command.name());
    let result = dispatch(cli.command, &config).instrument(span).await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!(kind = e.kind(), "Command failed: {}", e),
    }

    result
}

/// Route to command handlers
async fn dispatch(command: Commands, config: &AppConfig) -> AppResult<()> {
    match command {
        Commands::Build(cmd) => cmd.execute(config).await,
        Commands::Query(cmd) => cmd.execute(config).await,
        Commands::Stats(cmd) => cmd.execute(config).await,
    }
}

/// Print a failure: structured on stdout for `--json`, plain on stderr otherwise.
fn report_error(error: &AppError, json: bool) {
    if json {
        let output = serde_json::json!({
            "error": {
                "kind": error.kind(),
                "message": error.to_string(),
                "retryable": error.is_retryable(),
            }
        });
        println!("{}", output);
    } else {
        eprintln!("Error: {}", error);
        if error.is_retryable() {
            eprintln!("(this error is transient; retrying may succeed)");
        }
    }
}
