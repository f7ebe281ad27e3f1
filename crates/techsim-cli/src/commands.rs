//! Command implementations for the techsim CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use techsim_corpus::{CorpusProvider, SqliteCorpus};
use techsim_embeddings::{
    EmbeddingBackend, EmbeddingEngine, EmbeddingError, MiniLmBackend, VectorCache,
};
use techsim_similarity::{compare, top_k, LabeledVectors, QueryRanking};
use techsim_types::{Settings, TextRecord};

/// Collection identity of the technique descriptions.
pub const REFERENCE_COLLECTION: &str = "reference";

/// Collection identity of the synthetic samples.
pub const QUERY_COLLECTION: &str = "query";

/// Similarity report, the JSON output shape.
#[derive(Debug, Serialize)]
struct Report {
    reference_count: usize,
    query_count: usize,
    top_k: usize,
    rankings: Vec<QueryRanking>,
}

/// Initialize tracing from the effective log level.
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Load settings and apply CLI overrides.
fn effective_settings(
    config: Option<&str>,
    log_level: Option<&str>,
    db: Option<&str>,
    cache_dir: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    if let Some(path) = db {
        settings.corpus.db_path = path.to_string();
    }
    if let Some(dir) = cache_dir {
        settings.cache_dir = dir.to_string();
    }
    Ok(settings)
}

/// Durable cache file for one collection identity.
fn cache_file(cache_dir: &Path, collection: &str) -> PathBuf {
    cache_dir.join(format!("{}.cache.json", collection))
}

/// Apply `--top-k` / `--format` overrides and re-validate.
fn apply_report_overrides(
    settings: &mut Settings,
    top_k_override: Option<usize>,
    format: Option<&str>,
) -> Result<()> {
    if let Some(k) = top_k_override {
        settings.report.top_k = k;
    }
    if let Some(f) = format {
        settings.report.format = f.to_string();
    }
    settings
        .report
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid report settings")
}

/// Encode one collection, restoring its durable cache first and
/// persisting afterwards.
///
/// Storage failures never fail the comparison: an unreadable cache
/// file means recomputation, a failed save means the next run
/// recomputes too. Both are logged.
fn encode_collection(
    engine: &EmbeddingEngine,
    collection: &str,
    records: &[TextRecord],
    cache_dir: &Path,
    save: bool,
    model_name: &str,
) -> Result<Vec<techsim_embeddings::Embedding>> {
    let path = cache_file(cache_dir, collection);

    if path.exists() {
        match engine
            .cache()
            .load(&path, collection, model_name, engine.dimension())
        {
            Ok(restored) => info!(collection, restored, "Durable cache restored"),
            Err(EmbeddingError::StorageUnavailable(reason)) => {
                warn!(collection, %reason, "Durable cache unusable; recomputing");
            }
            Err(e) => return Err(e).context("Failed to restore durable cache"),
        }
    }

    let vectors = engine
        .encode_records(collection, records, None)
        .with_context(|| format!("Failed to encode {} collection", collection))?;

    if save {
        if let Err(e) = engine
            .cache()
            .save(&path, collection, model_name, engine.dimension())
        {
            warn!(collection, error = %e, "Durable cache save failed; continuing");
        }
    }

    Ok(vectors)
}

/// Run the pipeline end to end and return the rankings plus collection
/// sizes.
fn run_pipeline(
    settings: &Settings,
    save_cache: bool,
) -> Result<(Vec<TextRecord>, Vec<TextRecord>, Vec<QueryRanking>)> {
    let corpus = SqliteCorpus::open_configured(&settings.corpus)
        .context("Failed to open corpus database")?;
    let reference = corpus.fetch_reference_texts()?;
    let query = corpus.fetch_query_texts()?;
    info!(
        reference = reference.len(),
        query = query.len(),
        "Corpus loaded"
    );

    let backend = MiniLmBackend::load(&settings.model).context("Failed to load embedding model")?;
    let model_name = backend.info().name.clone();
    let engine = EmbeddingEngine::new(Arc::new(backend), Arc::new(VectorCache::new()));

    let cache_dir = Settings::expand_path(&settings.cache_dir);
    let reference_vectors = encode_collection(
        &engine,
        REFERENCE_COLLECTION,
        &reference,
        &cache_dir,
        save_cache,
        &model_name,
    )?;
    let query_vectors = encode_collection(
        &engine,
        QUERY_COLLECTION,
        &query,
        &cache_dir,
        save_cache,
        &model_name,
    )?;

    let reference_set = LabeledVectors::from_records(&reference, reference_vectors)?;
    let query_set = LabeledVectors::from_records(&query, query_vectors)?;
    let matrix = compare(&reference_set, &query_set)?;

    let rankings = top_k(&matrix, settings.report.top_k);
    Ok((reference, query, rankings))
}

/// `techsim compare`: full similarity report for the whole corpus.
pub fn run_compare(
    config: Option<&str>,
    log_level: Option<&str>,
    db: Option<&str>,
    top_k_override: Option<usize>,
    format: Option<&str>,
    cache_dir: Option<&str>,
    no_cache_save: bool,
) -> Result<()> {
    let mut settings = effective_settings(config, log_level, db, cache_dir)?;
    apply_report_overrides(&mut settings, top_k_override, format)?;
    init_logging(&settings.log_level)?;

    let (reference, query, rankings) = run_pipeline(&settings, !no_cache_save)?;

    let report = Report {
        reference_count: reference.len(),
        query_count: query.len(),
        top_k: settings.report.top_k,
        rankings,
    };

    match settings.report.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_report(&report, &query),
    }

    Ok(())
}

/// `techsim rank`: top matches for one query sample.
pub fn run_rank(
    config: Option<&str>,
    log_level: Option<&str>,
    db: Option<&str>,
    query_id: &str,
    top_k_override: Option<usize>,
    cache_dir: Option<&str>,
) -> Result<()> {
    let mut settings = effective_settings(config, log_level, db, cache_dir)?;
    apply_report_overrides(&mut settings, top_k_override, None)?;
    init_logging(&settings.log_level)?;

    let (_, query, rankings) = run_pipeline(&settings, true)?;

    let Some(ranking) = rankings.into_iter().find(|r| r.query_id == query_id) else {
        bail!(
            "no query sample with id {:?} ({} samples in corpus)",
            query_id,
            query.len()
        );
    };

    let label = query
        .iter()
        .find(|r| r.entity_id == query_id)
        .map(|r| r.label.as_str())
        .unwrap_or("");
    println!("{} {}", ranking.query_id, label);
    for m in &ranking.matches {
        println!("  {:<12} {:.4}", m.reference_id, m.score);
    }

    Ok(())
}

fn print_text_report(report: &Report, query: &[TextRecord]) {
    println!(
        "{} reference techniques x {} query samples (top {})",
        report.reference_count, report.query_count, report.top_k
    );
    if report.rankings.is_empty() {
        println!("nothing to rank");
        return;
    }
    for ranking in &report.rankings {
        let label = query
            .iter()
            .find(|r| r.entity_id == ranking.query_id)
            .map(|r| r.label.as_str())
            .unwrap_or("");
        println!("\n{} {}", ranking.query_id, label);
        if ranking.matches.is_empty() {
            println!("  (no reference techniques)");
        }
        for m in &ranking.matches {
            println!("  {:<12} {:.4}", m.reference_id, m.score);
        }
    }
}

/// `techsim cache info|clear`.
pub fn handle_cache(
    config: Option<&str>,
    log_level: Option<&str>,
    cache_dir: Option<&str>,
    command: crate::cli::CacheCommands,
) -> Result<()> {
    let settings = effective_settings(config, log_level, None, cache_dir)?;
    init_logging(&settings.log_level)?;
    let cache_dir = Settings::expand_path(&settings.cache_dir);

    match command {
        crate::cli::CacheCommands::Info => {
            for collection in [REFERENCE_COLLECTION, QUERY_COLLECTION] {
                let path = cache_file(&cache_dir, collection);
                if !path.exists() {
                    println!("{}: no durable cache ({})", collection, path.display());
                    continue;
                }
                match VectorCache::inspect(&path) {
                    Ok(info) => println!(
                        "{}: {} vectors, {} ({}d), written {} ({})",
                        collection,
                        info.entries,
                        info.model,
                        info.dimension,
                        info.created_at.format("%Y-%m-%d %H:%M"),
                        path.display()
                    ),
                    Err(e) => println!("{}: unusable: {}", collection, e),
                }
            }
        }
        crate::cli::CacheCommands::Clear => {
            for collection in [REFERENCE_COLLECTION, QUERY_COLLECTION] {
                let path = cache_file(&cache_dir, collection);
                if path.exists() {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("Failed to delete {}", path.display()))?;
                    println!("deleted {}", path.display());
                }
            }
        }
    }

    Ok(())
}
