//! Projection of a labeled hierarchy into output records.

use clustergraph_topics::{Conversation, Hierarchy, Topic};
use clustergraph_types::{ClusterInfo, ClusterLevel, Message, MessageWithTags, UNKNOWN_CHANNEL};

/// Label and tags attached to one cluster.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClusterText {
    pub label: String,
    pub tags: Vec<String>,
}

pub(crate) fn topic_info(topic: &Topic, text: &ClusterText) -> ClusterInfo {
    let level = ClusterLevel::Topic;
    ClusterInfo {
        cluster_id: topic.id.clone(),
        label: text.label.clone(),
        tags: text.tags.clone(),
        message_ids: topic.message_ids.clone(),
        size: topic.size(),
        centroid: topic.centroid.clone(),
        parent_cluster_id: None,
        child_cluster_ids: topic.conversation_ids.clone(),
        level: level.as_u8(),
        radius: level.radius(),
    }
}

/// Conversations are tagged with their channel unless it is unknown.
pub(crate) fn conversation_info(conversation: &Conversation, text: &ClusterText) -> ClusterInfo {
    let level = ClusterLevel::Conversation;
    let tags = if conversation.channel == UNKNOWN_CHANNEL || conversation.channel.is_empty() {
        Vec::new()
    } else {
        vec![conversation.channel.clone()]
    };

    ClusterInfo {
        cluster_id: conversation.id.clone(),
        label: text.label.clone(),
        tags,
        message_ids: conversation.message_ids.clone(),
        size: conversation.size(),
        centroid: conversation.centroid.clone(),
        parent_cluster_id: Some(conversation.parent_topic_id.clone()),
        child_cluster_ids: Vec::new(),
        level: level.as_u8(),
        radius: level.radius(),
    }
}

/// Output records in input order, each carrying its conversation, topic
/// and the topic's tags.
pub(crate) fn tagged_messages(
    messages: &[Message],
    hierarchy: &Hierarchy,
    topic_tags: &[&[String]],
    embeddings: Option<&[Vec<f32>]>,
) -> Vec<MessageWithTags> {
    messages
        .iter()
        .enumerate()
        .map(|(index, msg)| {
            let mut tagged = MessageWithTags::from_message(msg);
            if let Some(conversation) = hierarchy.conversation_of(index) {
                tagged.cluster_id = Some(conversation.id.clone());
            }
            if let Some(topic) = hierarchy.topic_of(index) {
                tagged.topic_id = Some(topic.id.clone());
                if let Some(tags) = topic_tags.get(topic.index) {
                    tagged.tags = tags.to_vec();
                }
            }
            tagged.embedding = embeddings.and_then(|rows| rows.get(index)).cloned();
            tagged
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(channel: &str) -> Conversation {
        Conversation {
            id: "conv_0".to_string(),
            index: 0,
            channel: channel.to_string(),
            message_indices: vec![0, 1],
            message_ids: vec!["msg_a".to_string(), "msg_b".to_string()],
            centroid: vec![1.0, 0.0],
            parent_topic_id: "topic_0".to_string(),
        }
    }

    fn text() -> ClusterText {
        ClusterText {
            label: "Deploy Issues".to_string(),
            tags: vec!["deploy".to_string()],
        }
    }

    #[test]
    fn test_conversation_info_tags_channel() {
        let info = conversation_info(&conversation("ops"), &text());
        assert_eq!(info.tags, vec!["ops"]);
        assert_eq!(info.level, 1);
        assert_eq!(info.radius, 300.0);
        assert_eq!(info.parent_cluster_id.as_deref(), Some("topic_0"));
        assert_eq!(info.size, 2);
    }

    #[test]
    fn test_conversation_info_unknown_channel_untagged() {
        let info = conversation_info(&conversation(UNKNOWN_CHANNEL), &text());
        assert!(info.tags.is_empty());
    }

    #[test]
    fn test_topic_info() {
        let topic = Topic {
            id: "topic_0".to_string(),
            index: 0,
            conversation_ids: vec!["conv_0".to_string(), "conv_1".to_string()],
            message_indices: vec![0, 1, 2],
            message_ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            centroid: vec![0.0, 1.0],
        };
        let info = topic_info(&topic, &text());

        assert_eq!(info.level, 2);
        assert_eq!(info.radius, 150.0);
        assert_eq!(info.size, 3);
        assert_eq!(info.tags, vec!["deploy"]);
        assert_eq!(info.child_cluster_ids, vec!["conv_0", "conv_1"]);
        assert!(info.parent_cluster_id.is_none());
    }
}
