//! Output projection of a clustering run.
//!
//! `ClusteringOutput` is immutable once assembled and is the unit the
//! result cache stores.

use serde::{Deserialize, Serialize};

use crate::config::{ClusteringConfig, SmallGroupPolicy, TimestampPolicy};
use crate::message::MessageWithTags;

/// Hierarchy level of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterLevel {
    /// Channel- and time-coherent message run
    Conversation,
    /// Semantically related group of conversations
    Topic,
}

impl ClusterLevel {
    /// Numeric level as emitted in `ClusterInfo::level`.
    pub fn as_u8(&self) -> u8 {
        match self {
            ClusterLevel::Conversation => 1,
            ClusterLevel::Topic => 2,
        }
    }

    /// Parse a numeric level.
    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            1 => Some(ClusterLevel::Conversation),
            2 => Some(ClusterLevel::Topic),
            _ => None,
        }
    }

    /// Fixed rendering radius for the radial graph layout.
    pub fn radius(&self) -> f32 {
        match self {
            ClusterLevel::Conversation => 300.0,
            ClusterLevel::Topic => 150.0,
        }
    }
}

impl std::fmt::Display for ClusterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterLevel::Conversation => write!(f, "conversation"),
            ClusterLevel::Topic => write!(f, "topic"),
        }
    }
}

/// Information about a single cluster at either level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Unique cluster identifier (`conv_N` or `topic_N`)
    pub cluster_id: String,
    /// Human-readable label (filled after structure is fixed)
    pub label: String,
    /// Topic tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// IDs of the messages in this cluster
    #[serde(default)]
    pub message_ids: Vec<String>,
    /// Number of messages in the cluster
    pub size: usize,
    /// Unit-norm centroid in embedding space
    #[serde(default)]
    pub centroid: Vec<f32>,
    /// Parent topic for conversations
    #[serde(default)]
    pub parent_cluster_id: Option<String>,
    /// Child conversations for topics
    #[serde(default)]
    pub child_cluster_ids: Vec<String>,
    /// 1 = conversation, 2 = topic
    pub level: u8,
    /// Rendering hint, fixed per level
    pub radius: f32,
}

impl ClusterInfo {
    /// Typed level, if the numeric level is known.
    pub fn cluster_level(&self) -> Option<ClusterLevel> {
        ClusterLevel::from_u8(self.level)
    }
}

/// Model names used by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub embedding_model: String,
    pub label_model: String,
}

/// Effective clustering parameters of a run.
///
/// Covers every setting that shapes the hierarchy, so a stored result can
/// be checked against the settings of a new request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParams {
    pub distance_threshold: f32,
    pub min_cluster_size: usize,
    pub max_topics: usize,
    pub conversation_gap_secs: i64,
    #[serde(default)]
    pub min_conversation_size: usize,
    #[serde(default)]
    pub small_group_policy: SmallGroupPolicy,
    #[serde(default)]
    pub timestamp_policy: TimestampPolicy,
}

impl From<&ClusteringConfig> for ClusteringParams {
    fn from(config: &ClusteringConfig) -> Self {
        Self {
            distance_threshold: config.distance_threshold,
            min_cluster_size: config.min_cluster_size,
            max_topics: config.max_topics,
            conversation_gap_secs: config.conversation_gap_secs,
            min_conversation_size: config.min_conversation_size,
            small_group_policy: config.small_group_policy,
            timestamp_policy: config.timestamp_policy,
        }
    }
}

/// Metadata about one clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub processing_time_seconds: f64,
    pub total_messages: usize,
    pub total_conversations: usize,
    pub total_topics: usize,
    pub total_clusters: usize,
    /// RFC 3339 time the run finished
    pub timestamp: String,
    /// Content-address of this result
    pub cache_key: String,
    pub model_info: ModelInfo,
    pub clustering_params: ClusteringParams,
}

/// Complete clustering output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringOutput {
    /// Messages with tags, in input order
    #[serde(rename = "messages")]
    pub messages_with_tags: Vec<MessageWithTags>,
    /// Topics first, then conversations
    pub clusters: Vec<ClusterInfo>,
    pub metadata: RunMetadata,
}

impl ClusteringOutput {
    /// Clusters at one level.
    pub fn clusters_at(&self, level: ClusterLevel) -> impl Iterator<Item = &ClusterInfo> {
        let level = level.as_u8();
        self.clusters.iter().filter(move |c| c.level == level)
    }

    /// Look up a cluster by ID.
    pub fn cluster(&self, cluster_id: &str) -> Option<&ClusterInfo> {
        self.clusters.iter().find(|c| c.cluster_id == cluster_id)
    }
}
