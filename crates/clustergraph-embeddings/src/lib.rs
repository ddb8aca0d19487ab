//! # clustergraph-embeddings
//!
//! Embedding provider for the clustergraph pipeline.
//!
//! The clustering core only needs deterministic, L2-normalized vectors for
//! a given input and model configuration. This crate defines that seam
//! (`EmbeddingModel`) and ships a local implementation.
//!
//! ## Features
//! - `EmbeddingModel::encode(texts, batch_size, seed)` batching contract
//! - Local inference via Candle (all-MiniLM-L6-v2, 384 dimensions)
//! - Automatic model file caching from HuggingFace Hub

pub mod cache;
pub mod candle;
pub mod error;
pub mod model;

pub use crate::candle::CandleEmbedder;
pub use cache::{
    get_or_download_model, ModelCache, ModelFile, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES,
};
pub use error::EmbeddingError;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
