//! # clustergraph-topics
//!
//! Hierarchy construction for clustergraph.
//!
//! Messages are grouped into conversations by channel and time gap, and
//! conversations are clustered into topics by Ward linkage over their
//! centroids. Everything here is pure and deterministic for fixed inputs.
//!
//! ## Features
//! - Conversation grouping with explicit handling of bad timestamps
//! - Ward linkage (nearest-neighbour chain) over cosine distances
//! - Distance and count cuts with auditable minimum-size remapping
//! - Unit-norm centroids and representative message selection
//! - Label generator seam with keyword labeling and pure fallbacks

pub mod centroid;
pub mod cutter;
pub mod error;
pub mod grouping;
pub mod hierarchy;
pub mod labeling;
pub mod linkage;
pub mod similarity;
pub mod tfidf;

pub use centroid::{group_centroid, top_representatives};
pub use cutter::{cut, enforce_min_size, label_sizes, CutMode, LabelRemap};
pub use error::TopicsError;
pub use grouping::{ConversationGrouper, ConversationGrouping};
pub use hierarchy::{
    assemble_hierarchy, cluster_level, Conversation, FlatClustering, Hierarchy, HierarchyParams,
    LevelParams, Topic,
};
pub use labeling::{
    clean_tag, fallback_label, fallback_tags, first_message_label, KeywordLabeler, LabelError,
    LabelGenerator, GENERAL_LABEL, GENERAL_TAG,
};
pub use linkage::{ward_linkage, Dendrogram, Merge};
pub use similarity::{cosine_similarity, pairwise_distances};
pub use tfidf::TfIdf;
