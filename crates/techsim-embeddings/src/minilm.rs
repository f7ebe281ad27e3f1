//! Local MiniLM embedding backend.
//!
//! Runs sentence-transformers/all-MiniLM-L6-v2 through Candle for
//! 384-dimensional sentence embeddings, entirely offline after the
//! model files have been fetched once from HuggingFace Hub. This is
//! the same model the similarity pipeline has always scored with, so
//! durable caches remain comparable across runs.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use techsim_types::ModelSettings;

use crate::error::EmbeddingError;
use crate::model::{BackendInfo, Embedding, EmbeddingBackend};

/// Embedding dimension of all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Token budget per input text; longer texts are truncated.
pub const MAX_SEQ_LENGTH: usize = 256;

/// Files a model directory must contain.
pub const MODEL_FILE_NAMES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Resolved locations of the model files on disk.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Locate the model files under `settings.model_dir`, downloading
    /// them from HuggingFace Hub on first use.
    pub fn locate_or_fetch(settings: &ModelSettings) -> Result<Self, EmbeddingError> {
        let model_dir =
            PathBuf::from(&settings.model_dir).join(settings.repo_id.replace('/', "_"));

        if !Self::present_in(&model_dir) {
            info!(repo = %settings.repo_id, "Downloading model files...");
            fetch_model_files(&settings.repo_id, &model_dir)?;
        } else {
            debug!(path = ?model_dir, "Using cached model files");
        }

        Ok(Self {
            config: model_dir.join("config.json"),
            tokenizer: model_dir.join("tokenizer.json"),
            weights: model_dir.join("model.safetensors"),
        })
    }

    /// Whether a directory already holds every required file.
    pub fn present_in(model_dir: &Path) -> bool {
        MODEL_FILE_NAMES.iter().all(|f| model_dir.join(f).exists())
    }
}

/// Download the model files from HuggingFace Hub into `model_dir`.
fn fetch_model_files(repo_id: &str, model_dir: &Path) -> Result<(), EmbeddingError> {
    use hf_hub::api::sync::Api;

    let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(repo_id.to_string());

    std::fs::create_dir_all(model_dir)?;

    for filename in MODEL_FILE_NAMES {
        info!(file = filename, "Downloading...");
        let fetched = repo
            .get(filename)
            .map_err(|e| EmbeddingError::Download(format!("{}: {}", filename, e)))?;
        std::fs::copy(&fetched, model_dir.join(filename))?;
    }

    Ok(())
}

/// Candle-based all-MiniLM-L6-v2 backend.
pub struct MiniLmBackend {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: BackendInfo,
}

impl MiniLmBackend {
    /// Load the backend, fetching model files if needed.
    pub fn load(settings: &ModelSettings) -> Result<Self, EmbeddingError> {
        let files = ModelFiles::locate_or_fetch(settings)?;
        Self::from_files(&files)
    }

    /// Load with default model settings.
    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelSettings::default())
    }

    /// Load from already-resolved file paths.
    pub fn from_files(files: &ModelFiles) -> Result<Self, EmbeddingError> {
        info!("Loading embedding model...");

        // CPU inference; the corpus sizes here never justify a GPU.
        let device = Device::Cpu;

        let config_str = std::fs::read_to_string(&files.config)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        info!(dim = EMBEDDING_DIM, max_seq = MAX_SEQ_LENGTH, "Model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            info: BackendInfo {
                name: "all-MiniLM-L6-v2".to_string(),
                dimension: EMBEDDING_DIM,
                max_sequence_length: MAX_SEQ_LENGTH,
            },
        })
    }

    /// Attention-mask-weighted mean over token embeddings, so padding
    /// never contributes to the sentence vector.
    fn mean_pool(&self, token_embeddings: &Tensor, mask: &Tensor) -> Result<Tensor, EmbeddingError> {
        let mask = mask
            .unsqueeze(2)?
            .broadcast_as(token_embeddings.shape())?
            .to_dtype(DType::F32)?;

        let summed = token_embeddings.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;

        Ok(summed.broadcast_div(&counts)?)
    }
}

impl EmbeddingBackend for MiniLmBackend {
    fn info(&self) -> &BackendInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text])?;
        Ok(vectors.remove(0))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = texts.len(), "Embedding batch");

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        // Pad the batch to its longest sequence, capped at the model's
        // token budget.
        let batch_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_SEQ_LENGTH);

        let mut id_rows: Vec<u32> = Vec::with_capacity(texts.len() * batch_len);
        let mut mask_rows: Vec<u32> = Vec::with_capacity(texts.len() * batch_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let keep = ids.len().min(batch_len);

            id_rows.extend_from_slice(&ids[..keep]);
            id_rows.extend(std::iter::repeat(0).take(batch_len - keep));
            mask_rows.extend_from_slice(&mask[..keep]);
            mask_rows.extend(std::iter::repeat(0).take(batch_len - keep));
        }

        let shape = (texts.len(), batch_len);
        let input_ids = Tensor::from_vec(id_rows, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(mask_rows, shape, &self.device)?;
        let token_type_ids = Tensor::zeros_like(&input_ids)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = self.mean_pool(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_vec2()?;

        // Unit-normalize, matching sentence-transformers output so
        // cosine scores line up with the historical pipeline.
        let embeddings = rows
            .into_iter()
            .map(|row| Embedding::new(row).normalized())
            .collect();

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Inference tests need the model files; run with:
    // cargo test -p techsim-embeddings -- --ignored

    #[test]
    fn test_model_files_present_in_empty_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(!ModelFiles::present_in(dir.path()));
    }

    #[test]
    fn test_model_files_present_when_all_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in MODEL_FILE_NAMES {
            std::fs::write(dir.path().join(name), b"stub").unwrap();
        }
        assert!(ModelFiles::present_in(dir.path()));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_load_and_dimension() {
        let backend = MiniLmBackend::load_default().unwrap();
        assert_eq!(backend.dimension(), EMBEDDING_DIM);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embed_is_unit_length() {
        let backend = MiniLmBackend::load_default().unwrap();
        let emb = backend.embed("Adversaries may send spearphishing emails").unwrap();
        assert_eq!(emb.dimension(), EMBEDDING_DIM);
        assert!((emb.norm() - 1.0).abs() < 1e-4);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_related_texts_score_higher() {
        let backend = MiniLmBackend::load_default().unwrap();
        let phish = backend.embed("phishing email with a malicious link").unwrap();
        let spear = backend.embed("targeted spearphishing message").unwrap();
        let unrelated = backend.embed("quarterly financial projections").unwrap();

        assert!(phish.cosine(&spear) > phish.cosine(&unrelated));
    }
}
