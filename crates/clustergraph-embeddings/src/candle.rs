//! Local sentence embeddings with Candle.
//!
//! A BERT checkpoint runs on CPU; token states are mean-pooled over the
//! attention mask and normalized. Nothing is sampled, so a text always
//! maps to the same vector for a given checkpoint.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache, ModelPaths};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Hidden size of all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Longer inputs are truncated to this many tokens.
pub const MAX_SEQ_LENGTH: usize = 256;

pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load the checkpoint described by `cache`, fetching missing files.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache)?;
        Self::from_paths(cache.model_name(), &paths)
    }

    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelCache::default())
    }

    pub fn load_from_paths(
        name: &str,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
    ) -> Result<Self, EmbeddingError> {
        Self::from_paths(
            name,
            &ModelPaths {
                config: config_path.to_path_buf(),
                tokenizer: tokenizer_path.to_path_buf(),
                weights: weights_path.to_path_buf(),
            },
        )
    }

    fn from_paths(name: &str, paths: &ModelPaths) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;
        let config = read_config(&paths.config)?;
        let tokenizer = batch_tokenizer(&paths.tokenizer)?;

        // SAFETY: the weights file is not modified while mapped
        let weights = unsafe {
            VarBuilder::from_mmaped_safetensors(
                std::slice::from_ref(&paths.weights),
                DType::F32,
                &device,
            )?
        };
        let model = BertModel::load(weights, &config)?;

        let info = ModelInfo {
            name: name.to_string(),
            dimension: config.hidden_size,
            max_sequence_length: MAX_SEQ_LENGTH,
        };
        info!(model = %info.name, dimension = info.dimension, "Embedding model ready");

        Ok(Self {
            model,
            tokenizer,
            device,
            info,
        })
    }

    /// Token ids and attention mask as `(batch, tokens)` tensors.
    fn input_tensors(&self, texts: &[&str]) -> Result<(Tensor, Tensor), EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }
        Ok((Tensor::stack(&ids, 0)?, Tensor::stack(&masks, 0)?))
    }
}

fn read_config(path: &Path) -> Result<BertConfig, EmbeddingError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| EmbeddingError::InvalidConfig(format!("{}: {}", path.display(), e)))
}

/// Tokenizer that truncates to [`MAX_SEQ_LENGTH`] and pads each batch to
/// its longest member.
fn batch_tokenizer(path: &Path) -> Result<Tokenizer, EmbeddingError> {
    let mut tokenizer =
        Tokenizer::from_file(path).map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQ_LENGTH,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));
    Ok(tokenizer)
}

/// Average of token states where `mask` is set, one row per input.
fn masked_mean(states: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
    let weights = mask.to_dtype(DType::F32)?.unsqueeze(2)?;
    let totals = states.broadcast_mul(&weights)?.sum(1)?;
    let counts = weights.sum(1)?.clamp(1e-9, f64::MAX)?;
    totals.broadcast_div(&counts)
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut rows = self.embed_batch(&[text])?;
        rows.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(texts = texts.len(), "Running encoder");

        let (ids, mask) = self.input_tensors(texts)?;
        let segments = ids.zeros_like()?;
        let states = self.model.forward(&ids, &segments, Some(&mask))?;
        let rows: Vec<Vec<f32>> = masked_mean(&states, &mask)?.to_vec2()?;

        Ok(rows.into_iter().map(Embedding::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_mean_ignores_padding() {
        let device = Device::Cpu;
        // batch of 2, 3 tokens, 2 dims
        let states = Tensor::new(
            &[
                [[1.0f32, 1.0], [3.0, 3.0], [100.0, 100.0]],
                [[2.0, 4.0], [0.0, 0.0], [0.0, 0.0]],
            ],
            &device,
        )
        .unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0], [1, 0, 0]], &device).unwrap();

        let pooled: Vec<Vec<f32>> = masked_mean(&states, &mask).unwrap().to_vec2().unwrap();
        assert_eq!(pooled, vec![vec![2.0, 2.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn test_read_config_rejects_garbage() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            read_config(&path),
            Err(EmbeddingError::InvalidConfig(_))
        ));
        assert!(matches!(
            read_config(&temp.path().join("absent.json")),
            Err(EmbeddingError::Io(_))
        ));
    }

    // The remaining tests fetch all-MiniLM-L6-v2:
    // cargo test -p clustergraph-embeddings -- --ignored

    #[test]
    #[ignore = "requires model download"]
    fn test_default_model_shape() {
        let embedder = CandleEmbedder::load_default().unwrap();
        assert_eq!(embedder.info().dimension, EMBEDDING_DIM);
        assert_eq!(embedder.info().name, "all-MiniLM-L6-v2");
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_batched_encode_is_stable() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let texts = vec![
            "Deploy is failing on staging".to_string(),
            "anyone up for tacos at noon".to_string(),
            "the staging deploy broke again".to_string(),
        ];
        let whole = embedder.encode(&texts, 8, 42).unwrap();
        let split = embedder.encode(&texts, 1, 42).unwrap();
        for (a, b) in whole.iter().zip(&split) {
            assert!((a.norm() - 1.0).abs() < 1e-4);
            assert!(a.cosine_similarity(b) > 0.9999);
        }
        assert!(whole[0].cosine_similarity(&whole[2]) > whole[0].cosine_similarity(&whole[1]));
    }
}
