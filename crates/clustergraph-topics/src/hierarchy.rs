//! Two-level hierarchy assembly.
//!
//! Conversations (level 1) come from the grouper; topics (level 2) are
//! flat clusters over conversation centroids.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use clustergraph_types::{ClusteringConfig, Message, SmallGroupPolicy};

use crate::centroid::group_centroid;
use crate::cutter::{cut, enforce_min_size, group_count, CutMode};
use crate::error::TopicsError;
use crate::grouping::ConversationGrouping;
use crate::linkage::ward_linkage;
use crate::similarity::pairwise_distances;

/// Parameters for one level of flat clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelParams {
    /// Ward merge height up to which items are joined
    pub distance_threshold: f64,
    /// Minimum members per group
    pub min_size: usize,
    /// Upper bound on the group count; exceeding it switches to a count cut
    pub max_groups: Option<usize>,
    pub policy: SmallGroupPolicy,
}

/// Flat partition of a point set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatClustering {
    /// Final label per item, contiguous from 0
    pub labels: Vec<usize>,
    /// Ascending member indices per label
    pub groups: Vec<Vec<usize>>,
    /// No group met the minimum size and all items were collapsed
    pub degenerate: bool,
}

/// Cluster unit vectors into flat groups.
///
/// Ward linkage, a distance cut (falling back to a count cut at
/// `max_groups`), then minimum-size enforcement. Fewer than two points
/// form at most one group without building a dendrogram.
pub fn cluster_level(
    points: &[Vec<f32>],
    params: &LevelParams,
) -> Result<FlatClustering, TopicsError> {
    let n = points.len();
    if n < 2 {
        return Ok(FlatClustering {
            labels: vec![0; n],
            groups: if n == 0 { Vec::new() } else { vec![vec![0]] },
            degenerate: false,
        });
    }

    let dendrogram = ward_linkage(&pairwise_distances(points))?;
    let mut raw = cut(&dendrogram, CutMode::Distance(params.distance_threshold));

    if let Some(max_groups) = params.max_groups {
        let found = group_count(&raw);
        if found > max_groups {
            debug!(found, max_groups, "Distance cut exceeds group bound, cutting by count");
            raw = cut(&dendrogram, CutMode::Count(max_groups));
        }
    }

    let remap = enforce_min_size(&raw, params.min_size, params.policy, points);
    let labels = remap.apply(&raw);

    let mut groups = vec![Vec::new(); remap.group_count];
    for (item, &label) in labels.iter().enumerate() {
        groups[label].push(item);
    }

    Ok(FlatClustering {
        labels,
        groups,
        degenerate: remap.degenerate,
    })
}

/// Parameters for assembling both levels.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyParams {
    pub distance_threshold: f64,
    /// Minimum conversations per topic
    pub min_topic_size: usize,
    pub max_topics: usize,
    /// Minimum messages per conversation
    pub min_conversation_size: usize,
    pub policy: SmallGroupPolicy,
}

impl HierarchyParams {
    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self {
            distance_threshold: config.distance_threshold as f64,
            min_topic_size: config.min_cluster_size,
            max_topics: config.max_topics,
            min_conversation_size: config.min_conversation_size,
            policy: config.small_group_policy,
        }
    }
}

/// Level-1 group: a channel- and time-coherent run of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// `conv_{index}`
    pub id: String,
    pub index: usize,
    /// Channel of the first message
    pub channel: String,
    /// Member indices into the message list, in grouping order
    pub message_indices: Vec<usize>,
    pub message_ids: Vec<String>,
    /// Unit-norm mean of member embeddings
    pub centroid: Vec<f32>,
    /// Owning topic
    pub parent_topic_id: String,
}

impl Conversation {
    pub fn size(&self) -> usize {
        self.message_indices.len()
    }
}

/// Level-2 group: semantically related conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// `topic_{index}`
    pub id: String,
    pub index: usize,
    /// Child conversation ids, ascending
    pub conversation_ids: Vec<String>,
    /// Union of child conversation messages, in conversation order
    pub message_indices: Vec<usize>,
    pub message_ids: Vec<String>,
    /// Unit-norm mean over the union's message embeddings
    pub centroid: Vec<f32>,
}

impl Topic {
    pub fn size(&self) -> usize {
        self.message_indices.len()
    }
}

/// Topics containing conversations containing messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub conversations: Vec<Conversation>,
    pub topics: Vec<Topic>,
    /// Message index -> conversation index
    pub message_conversation: Vec<usize>,
    /// Message index -> topic index
    pub message_topic: Vec<usize>,
    /// Topic clustering collapsed because no topic met the minimum
    pub degenerate: bool,
}

impl Hierarchy {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn conversation_of(&self, message_index: usize) -> Option<&Conversation> {
        self.message_conversation
            .get(message_index)
            .and_then(|&c| self.conversations.get(c))
    }

    pub fn topic_of(&self, message_index: usize) -> Option<&Topic> {
        self.message_topic
            .get(message_index)
            .and_then(|&t| self.topics.get(t))
    }
}

/// Build the two-level hierarchy.
///
/// `embeddings` holds one unit-norm row per message and `grouping` must
/// cover every message exactly once.
pub fn assemble_hierarchy(
    messages: &[Message],
    embeddings: &[Vec<f32>],
    grouping: &ConversationGrouping,
    params: &HierarchyParams,
) -> Result<Hierarchy, TopicsError> {
    validate_inputs(messages, embeddings, grouping)?;

    let members = merge_small_conversations(embeddings, grouping, params);

    // Step 1: one centroid per conversation
    let mut conversations: Vec<Conversation> = members
        .into_iter()
        .enumerate()
        .map(|(index, message_indices)| Conversation {
            id: format!("conv_{}", index),
            index,
            channel: message_indices
                .first()
                .map(|&m| messages[m].channel_or_unknown().to_string())
                .unwrap_or_default(),
            message_ids: message_indices
                .iter()
                .map(|&m| messages[m].id().to_string())
                .collect(),
            centroid: group_centroid(embeddings, &message_indices),
            message_indices,
            parent_topic_id: String::new(),
        })
        .collect();

    // Step 2: topics over conversation centroids
    let centroids: Vec<Vec<f32>> = conversations.iter().map(|c| c.centroid.clone()).collect();
    let level = LevelParams {
        distance_threshold: params.distance_threshold,
        min_size: params.min_topic_size,
        max_groups: Some(params.max_topics),
        policy: params.policy,
    };
    let flat = cluster_level(&centroids, &level)?;

    // Steps 3 and 4: message unions and both link directions
    let mut topics = Vec::with_capacity(flat.groups.len());
    let mut message_topic = vec![0usize; messages.len()];
    for (index, conv_indices) in flat.groups.iter().enumerate() {
        let id = format!("topic_{}", index);
        let mut message_indices = Vec::new();
        let mut conversation_ids = Vec::with_capacity(conv_indices.len());

        for &c in conv_indices {
            let conversation = &mut conversations[c];
            conversation.parent_topic_id = id.clone();
            conversation_ids.push(conversation.id.clone());
            message_indices.extend_from_slice(&conversation.message_indices);
        }
        for &m in &message_indices {
            message_topic[m] = index;
        }

        debug!(
            topic = %id,
            conversations = conv_indices.len(),
            messages = message_indices.len(),
            "Assembled topic"
        );

        topics.push(Topic {
            centroid: group_centroid(embeddings, &message_indices),
            message_ids: message_indices
                .iter()
                .map(|&m| messages[m].id().to_string())
                .collect(),
            id,
            index,
            conversation_ids,
            message_indices,
        });
    }

    let mut message_conversation = vec![0usize; messages.len()];
    for conversation in &conversations {
        for &m in &conversation.message_indices {
            message_conversation[m] = conversation.index;
        }
    }

    info!(
        messages = messages.len(),
        conversations = conversations.len(),
        topics = topics.len(),
        degenerate = flat.degenerate,
        "Assembled hierarchy"
    );

    Ok(Hierarchy {
        conversations,
        topics,
        message_conversation,
        message_topic,
        degenerate: flat.degenerate,
    })
}

fn validate_inputs(
    messages: &[Message],
    embeddings: &[Vec<f32>],
    grouping: &ConversationGrouping,
) -> Result<(), TopicsError> {
    if embeddings.len() != messages.len() {
        return Err(TopicsError::InvalidInput(format!(
            "{} embeddings for {} messages",
            embeddings.len(),
            messages.len()
        )));
    }

    if let Some(expected) = embeddings.first().map(Vec::len) {
        if let Some((index, row)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
        {
            return Err(TopicsError::DimensionMismatch {
                index,
                expected,
                actual: row.len(),
            });
        }
    }

    let mut seen = vec![false; messages.len()];
    for &m in grouping.conversations.iter().flatten() {
        let Some(slot) = seen.get_mut(m) else {
            return Err(TopicsError::InvalidInput(format!(
                "conversation references message {} of {}",
                m,
                messages.len()
            )));
        };
        if *slot {
            return Err(TopicsError::InvalidInput(format!(
                "message {} appears in more than one conversation",
                m
            )));
        }
        *slot = true;
    }
    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(TopicsError::InvalidInput(format!(
            "message {} is not in any conversation",
            missing
        )));
    }

    Ok(())
}

/// Apply the conversation-size minimum with the same remap as topics.
fn merge_small_conversations(
    embeddings: &[Vec<f32>],
    grouping: &ConversationGrouping,
    params: &HierarchyParams,
) -> Vec<Vec<usize>> {
    if params.min_conversation_size <= 1 {
        return grouping.conversations.clone();
    }

    // Items are messages in grouping order, labelled by conversation
    let order: Vec<usize> = grouping.conversations.iter().flatten().copied().collect();
    let labels: Vec<usize> = grouping
        .conversations
        .iter()
        .enumerate()
        .flat_map(|(c, members)| std::iter::repeat(c).take(members.len()))
        .collect();
    let points: Vec<Vec<f32>> = order.iter().map(|&m| embeddings[m].clone()).collect();

    let remap = enforce_min_size(
        &labels,
        params.min_conversation_size,
        params.policy,
        &points,
    );

    let mut merged = vec![Vec::new(); remap.group_count];
    for (raw, members) in grouping.conversations.iter().enumerate() {
        let target = remap.table.get(&raw).copied().unwrap_or(0);
        merged[target].extend_from_slice(members);
    }

    debug!(
        before = grouping.len(),
        after = merged.len(),
        min_size = params.min_conversation_size,
        "Merged small conversations"
    );
    merged
}
