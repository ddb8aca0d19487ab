//! # clustergraph-orchestrator
//!
//! End-to-end clustering runs.
//!
//! The `Orchestrator` owns shared references to an embedding model, a
//! label generator and an optional cache store, all injected at
//! construction. `process_messages` turns raw chat messages into a
//! `ClusteringOutput`; `search` and `search_clusters` rank messages and
//! clusters against a free-text query.
//!
//! Embedding runs on tokio's blocking pool. Label generation runs with at
//! most `labeling.max_workers` requests in flight.

pub mod error;
mod pipeline;
mod present;
pub mod search;

#[cfg(test)]
mod test_support;

pub use error::OrchestratorError;
pub use pipeline::{Orchestrator, PipelineOptions};
pub use search::{ClusterHit, MessageHit, SearchFilters};
