//! Failures of embedding providers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Inference failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Tokenization failed: {0}")]
    Tokenizer(String),

    /// Model config that cannot be parsed
    #[error("Invalid model config: {0}")]
    InvalidConfig(String),

    #[error("Model download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Provider returned a different number of vectors than texts
    #[error("Provider returned {actual} embeddings for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Expected {expected}-dimensional embeddings, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Remote or external provider failure (network, quota)
    #[error("Embedding provider unavailable: {0}")]
    Provider(String),
}
