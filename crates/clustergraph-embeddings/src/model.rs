//! The provider seam: texts in, unit-norm vectors out.

use crate::error::EmbeddingError;

/// A vector scaled to unit length.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Wrap `values` after scaling them to unit length. An all-zero input
    /// stays zero.
    pub fn new(mut values: Vec<f32>) -> Self {
        let length = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if length > 0.0 {
            values.iter_mut().for_each(|x| *x /= length);
        }
        Self { values }
    }

    /// Wrap values the provider already normalized.
    pub fn from_normalized(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Dot product, which is the cosine for unit vectors. Mismatched
    /// dimensions give 0.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.dimension() != other.dimension() {
            return 0.0;
        }
        self.values.iter().zip(&other.values).map(|(a, b)| a * b).sum()
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// Static description of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Reported in run metadata, e.g. `all-MiniLM-L6-v2`
    pub name: String,
    pub dimension: usize,
    /// Token limit; longer inputs are truncated
    pub max_sequence_length: usize,
}

/// Turns texts into embeddings.
///
/// Providers are shared across threads and must return the same vectors
/// for the same texts and seed.
pub trait EmbeddingModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// One vector per text, in order. Defaults to calling [`Self::embed`]
    /// per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Encode all texts in batches of `batch_size`.
    ///
    /// The seed is for providers with stochastic components that override
    /// this method; the output must be identical for identical
    /// `(texts, seed)`. The default path is deterministic and ignores it.
    /// Verifies that one vector of the model's dimension comes back per text.
    fn encode(
        &self,
        texts: &[String],
        batch_size: usize,
        _seed: u64,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        let batch_size = batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size) {
            let refs: Vec<&str> = chunk.iter().map(|s| s.as_str()).collect();
            let batch = self.embed_batch(&refs)?;
            if batch.len() != chunk.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: chunk.len(),
                    actual: batch.len(),
                });
            }
            embeddings.extend(batch);
        }

        let expected = self.info().dimension;
        if let Some(bad) = embeddings.iter().find(|e| e.dimension() != expected) {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: bad.dimension(),
            });
        }

        Ok(embeddings)
    }
}
