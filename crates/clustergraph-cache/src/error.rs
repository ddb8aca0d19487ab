//! Cache error types.

use thiserror::Error;

/// Errors from a cache store.
///
/// [`crate::CacheStore::get`] and [`crate::CacheStore::put`] log these and
/// carry on; only the `try_*` variants return them.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is not a plain hex digest
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// Finished entry could not be moved into place
    #[error("Cache persist error: {0}")]
    Persist(#[from] tempfile::PersistError),
}
