//! techsim CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (compare, rank, cache)

pub mod cli;
pub mod commands;

pub use cli::{CacheCommands, Cli, Commands};
pub use commands::{handle_cache, run_compare, run_rank};
