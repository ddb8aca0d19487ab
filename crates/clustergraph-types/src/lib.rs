//! # clustergraph-types
//!
//! Shared domain types for the clustergraph pipeline.
//!
//! This crate defines the data structures that flow between stages:
//! - Messages: timestamped chat messages as received, and as emitted with tags
//! - Cluster projections: `ClusterInfo` records for conversations and topics
//! - `ClusteringOutput`: the full immutable result of one run (the cache unit)
//! - Settings: layered configuration for every stage
//!
//! ## Usage
//!
//! ```rust
//! use clustergraph_types::{assign_message_ids, Message};
//!
//! let mut messages = vec![Message::new("hello", "general", "u1", "2025-11-14T17:00:00Z")];
//! assign_message_ids(&mut messages);
//! assert!(messages[0].message_id.as_deref().unwrap().starts_with("msg_"));
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod output;

pub use config::{
    CacheSettings, ClusteringConfig, EmbeddingSettings, LabelingConfig, Settings,
    SmallGroupPolicy, TimestampPolicy,
};
pub use error::ClusterGraphError;
pub use message::{
    assign_message_ids, message_id_for, parse_timestamp, Message, MessageWithTags,
    UNKNOWN_CHANNEL,
};
pub use output::{
    ClusterInfo, ClusterLevel, ClusteringOutput, ClusteringParams, ModelInfo, RunMetadata,
};
