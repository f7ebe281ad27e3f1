//! techsim: technique similarity pipeline
//!
//! Scores synthetic threat-report samples against a catalog of MITRE
//! ATT&CK technique descriptions using sentence embeddings and cosine
//! similarity.
//!
//! # Usage
//!
//! ```bash
//! techsim compare --db mitre_data.db --top-k 5
//! techsim rank --db mitre_data.db --query-id S12
//! techsim cache info
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/techsim/config.toml)
//! 3. Environment variables (TECHSIM_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use techsim_cli::{handle_cache, run_compare, run_rank, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            db,
            top_k,
            format,
            cache_dir,
            no_cache_save,
        } => {
            run_compare(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                db.as_deref(),
                top_k,
                format.as_deref(),
                cache_dir.as_deref(),
                no_cache_save,
            )?;
        }
        Commands::Rank {
            db,
            query_id,
            top_k,
            cache_dir,
        } => {
            run_rank(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                db.as_deref(),
                &query_id,
                top_k,
                cache_dir.as_deref(),
            )?;
        }
        Commands::Cache { cache_dir, command } => {
            handle_cache(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                cache_dir.as_deref(),
                command,
            )?;
        }
    }

    Ok(())
}
