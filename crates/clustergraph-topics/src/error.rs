//! Failures of grouping, linkage and hierarchy assembly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopicsError {
    /// A message timestamp could not be parsed and the policy rejects it
    #[error("Invalid timestamp at message {index}: {value:?}")]
    InvalidTimestamp { index: usize, value: String },

    /// An embedding has a different dimension from the first one
    #[error("Embedding {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Linkage or cut produced an inconsistent result
    #[error("Clustering failed: {0}")]
    Clustering(String),

    /// Shapes or lengths that do not line up
    #[error("Invalid clustering input: {0}")]
    InvalidInput(String),
}
