//! # clustergraph-cache
//!
//! Content-addressed cache for clustering results.
//!
//! Keys hash the exact inputs that determine an output (message texts,
//! distance threshold and minimum cluster size). A miss only costs a
//! recomputation: unreadable or corrupt entries are reported as misses.

pub mod error;
pub mod key;
pub mod store;

pub use error::CacheError;
pub use key::{cache_key, is_valid_key, texts_cache_key};
pub use store::{CacheStore, FileCacheStore, MemoryCacheStore};
