use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lumara::cli;
use lumara::config::LumaraConfig;

#[derive(Parser)]
#[command(name = "lumara", version, about = "Local-first semantic layer: on-device embeddings and similarity search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Embed a text and print the vector
    Embed {
        /// Text to embed
        text: String,
        /// Skip the cache and always run the model
        #[arg(long)]
        no_cache: bool,
    },
    /// Rank candidate texts by similarity to a query
    Similar {
        /// Query text
        query: String,
        /// File of candidate texts, one per line
        #[arg(long)]
        candidates_file: PathBuf,
        /// Maximum number of matches to print
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum score to include
        #[arg(long)]
        min_score: Option<f32>,
    },
    /// Group near-duplicate texts from a file
    Duplicates {
        /// File of candidate texts, one per line
        #[arg(long)]
        candidates_file: PathBuf,
        /// Similarity threshold for grouping
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Find statements worth reviewing for contradiction
    Check {
        /// The new statement
        statement: String,
        /// File of existing statements, one per line
        #[arg(long)]
        against_file: PathBuf,
    },
    /// Show cache statistics
    Stats {
        /// Emit machine-readable JSON instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Remove durable entries outside the retention window
    Sweep {
        /// Report what would be removed without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Warm the memory tier from recently used durable entries
    Preload,
    /// Delete all cached embeddings
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Check model files and cache database health
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.lumara/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LumaraConfig::load()?;

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.runtime.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.model).await?,
        },
        Command::Embed { text, no_cache } => cli::embed::run(&config, &text, no_cache).await?,
        Command::Similar {
            query,
            candidates_file,
            top_k,
            min_score,
        } => cli::similar::run(&config, &query, &candidates_file, top_k, min_score).await?,
        Command::Duplicates {
            candidates_file,
            threshold,
        } => cli::duplicates::run(&config, &candidates_file, threshold).await?,
        Command::Check {
            statement,
            against_file,
        } => cli::check::run(&config, &statement, &against_file).await?,
        Command::Stats { json } => cli::stats::run(&config, json).await?,
        Command::Sweep { dry_run } => cli::maintenance::sweep(&config, dry_run).await?,
        Command::Preload => cli::maintenance::preload(&config).await?,
        Command::Reset { yes } => cli::reset::run(&config, yes).await?,
        Command::Doctor => cli::doctor::run(&config)?,
    }

    Ok(())
}
