//! Configuration loading for techsim.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The config file lives at ~/.config/techsim/config.toml; environment
//! variables use the TECHSIM_ prefix. CLI flags are applied by the
//! caller after `Settings::load` returns.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TypesError;

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// HuggingFace repository for the sentence-embedding model
    #[serde(default = "default_model_repo")]
    pub repo_id: String,

    /// Directory for downloaded model files
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_model_dir() -> String {
    ProjectDirs::from("", "", "techsim")
        .map(|p| p.cache_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from("./models"))
        .to_string_lossy()
        .to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            repo_id: default_model_repo(),
            model_dir: default_model_dir(),
        }
    }
}

/// Report output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Number of top reference matches reported per query sample
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Output format: "text" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_top_k() -> usize {
    5
}

fn default_format() -> String {
    "text".to_string()
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            format: default_format(),
        }
    }
}

impl ReportSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.top_k == 0 {
            return Err("top_k must be > 0".to_string());
        }
        if self.format != "text" && self.format != "json" {
            return Err(format!(
                "format must be \"text\" or \"json\", got {:?}",
                self.format
            ));
        }
        Ok(())
    }
}

/// Corpus database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSettings {
    /// Path to the SQLite corpus database
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Table holding technique descriptions (reference collection)
    #[serde(default = "default_reference_table")]
    pub reference_table: String,

    /// Table holding synthetic samples (query collection)
    #[serde(default = "default_query_table")]
    pub query_table: String,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "techsim")
        .map(|p| p.data_local_dir().join("mitre_data.db"))
        .unwrap_or_else(|| PathBuf::from("./mitre_data.db"))
        .to_string_lossy()
        .to_string()
}

fn default_reference_table() -> String {
    "mitre_technique_descriptions".to_string()
}

fn default_query_table() -> String {
    "synthetic_texts".to_string()
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            reference_table: default_reference_table(),
            query_table: default_query_table(),
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory for durable embedding caches
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Embedding model configuration
    #[serde(default)]
    pub model: ModelSettings,

    /// Corpus database configuration
    #[serde(default)]
    pub corpus: CorpusSettings,

    /// Report output configuration
    #[serde(default)]
    pub report: ReportSettings,
}

fn default_cache_dir() -> String {
    ProjectDirs::from("", "", "techsim")
        .map(|p| p.cache_dir().join("embeddings"))
        .unwrap_or_else(|| PathBuf::from("./embeddings"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            log_level: default_log_level(),
            model: ModelSettings::default(),
            corpus: CorpusSettings::default(),
            report: ReportSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/techsim/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (TECHSIM_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", "techsim")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            // 1. Built-in defaults
            .set_default("cache_dir", default_cache_dir())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("model.repo_id", default_model_repo())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("model.model_dir", default_model_dir())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("corpus.db_path", default_db_path())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("corpus.reference_table", default_reference_table())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("corpus.query_table", default_query_table())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("report.top_k", default_top_k() as i64)
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("report.format", default_format())
            .map_err(|e| TypesError::Config(e.to_string()))?
            // 2. Default config file (~/.config/techsim/config.toml)
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        // 3. CLI-specified config file (higher precedence than default)
        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // 4. Environment variables (highest precedence before CLI flags)
        // Format: TECHSIM_CACHE_DIR, TECHSIM_CORPUS_DB_PATH, etc.
        builder = builder.add_source(
            Environment::with_prefix("TECHSIM")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        settings.report.validate().map_err(TypesError::Config)?;

        Ok(settings)
    }

    /// Expand ~ in a configured path to the home directory.
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert_eq!(
            settings.model.repo_id,
            "sentence-transformers/all-MiniLM-L6-v2"
        );
        assert_eq!(settings.corpus.reference_table, "mitre_technique_descriptions");
        assert_eq!(settings.report.top_k, 5);
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.report.format, "text");
    }

    #[test]
    fn test_report_settings_validation() {
        let mut report = ReportSettings::default();
        assert!(report.validate().is_ok());

        report.top_k = 0;
        assert!(report.validate().is_err());

        report.top_k = 3;
        report.format = "csv".to_string();
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_expand_path_no_tilde() {
        assert_eq!(
            Settings::expand_path("/tmp/cache"),
            PathBuf::from("/tmp/cache")
        );
    }
}
