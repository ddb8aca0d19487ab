//! Orchestrator error types.

use thiserror::Error;

use clustergraph_embeddings::EmbeddingError;
use clustergraph_topics::{LabelError, TopicsError};

/// Errors from a pipeline run or a search.
///
/// The variant names the stage that failed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Embedding provider failure
    #[error("Embedding stage failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Label generator failure with fallback disabled
    #[error("Labeling stage failed: {0}")]
    Labeling(#[from] LabelError),

    /// Grouping or hierarchy assembly failure
    #[error("Clustering stage failed: {0}")]
    Clustering(#[from] TopicsError),

    /// Effective parameters out of range
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// A blocking worker panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}
