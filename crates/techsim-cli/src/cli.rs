//! CLI argument parsing for techsim.
//!
//! CLI flags override config-file and environment settings.

use clap::{Parser, Subcommand};

/// Technique similarity pipeline
///
/// Scores how closely free-text samples match a catalog of technique
/// descriptions using sentence embeddings and cosine similarity.
#[derive(Parser, Debug)]
#[command(name = "techsim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/techsim/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Pipeline commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode both collections and print the full similarity report
    Compare {
        /// Override corpus database path
        #[arg(long)]
        db: Option<String>,

        /// Top matches reported per query sample
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Override durable embedding cache directory
        #[arg(long)]
        cache_dir: Option<String>,

        /// Skip persisting freshly computed embeddings
        #[arg(long)]
        no_cache_save: bool,
    },

    /// Top matches for a single query sample
    Rank {
        /// Override corpus database path
        #[arg(long)]
        db: Option<String>,

        /// Query entity id (e.g., S12)
        #[arg(long)]
        query_id: String,

        /// Number of matches to show
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Override durable embedding cache directory
        #[arg(long)]
        cache_dir: Option<String>,
    },

    /// Durable embedding cache management
    Cache {
        /// Override durable embedding cache directory
        #[arg(long)]
        cache_dir: Option<String>,

        #[command(subcommand)]
        command: CacheCommands,
    },
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show which durable cache files exist and how many vectors they hold
    Info,
    /// Delete the durable cache files
    Clear,
}
