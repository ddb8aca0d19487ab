//! End-to-end pipeline scenarios.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use clustergraph_types::{ClusterLevel, Settings, TimestampPolicy};
use e2e_tests::{
    assert_hierarchy_consistent, near_duplicate_messages, scenario_messages, KeywordEmbedder,
    TestHarness,
};

/// Three conversations on orthogonal subjects stay three topics at
/// minimum size 1.
#[tokio::test]
async fn test_scenario_three_groups_persist() {
    let harness = TestHarness::new();
    let orch = harness.orchestrator(Arc::new(KeywordEmbedder::exact()));

    let output = orch
        .process_messages(scenario_messages(), false, Some(0.5), Some(1))
        .await
        .unwrap();

    assert_eq!(output.metadata.total_conversations, 3);
    assert_eq!(output.metadata.total_topics, 3);
    assert_hierarchy_consistent(&output);

    // A-early, A-late, B in grouping order
    let conv_sizes: Vec<(String, usize)> = output
        .clusters_at(ClusterLevel::Conversation)
        .map(|c| (c.tags.join(","), c.size))
        .collect();
    assert_eq!(
        conv_sizes,
        vec![
            ("A".to_string(), 2),
            ("A".to_string(), 2),
            ("B".to_string(), 2)
        ]
    );
}

/// A minimum larger than the number of conversations leaves one topic.
#[tokio::test]
async fn test_scenario_min_four_collapses() {
    let harness = TestHarness::new();
    let orch = harness.orchestrator(Arc::new(KeywordEmbedder::exact()));

    let output = orch
        .process_messages(scenario_messages(), false, Some(0.5), Some(4))
        .await
        .unwrap();

    assert_eq!(output.metadata.total_conversations, 3);
    assert_eq!(output.metadata.total_topics, 1);
    let topic = output.cluster("topic_0").unwrap();
    assert_eq!(topic.child_cluster_ids, vec!["conv_0", "conv_1", "conv_2"]);
    assert_eq!(topic.size, 6);
    assert_hierarchy_consistent(&output);
}

/// Near-identical subjects form a single topic for any threshold above the
/// jitter scale.
///
/// With jitter 0.02 on 8 dimensions, pairwise cosine distances stay below
/// about 0.01 and the final Ward merge stays below about 0.05. At thresholds
/// under that, the jittered points legitimately split.
#[tokio::test]
async fn test_near_duplicates_single_topic() {
    let harness = TestHarness::new();
    let orch = harness.orchestrator(Arc::new(KeywordEmbedder::new(0.02)));

    for threshold in [0.1, 0.5, 1.5, 10.0] {
        let output = orch
            .process_messages(near_duplicate_messages(10), true, Some(threshold), Some(2))
            .await
            .unwrap();

        assert_eq!(output.metadata.total_conversations, 10, "threshold {}", threshold);
        assert_eq!(output.metadata.total_topics, 1, "threshold {}", threshold);
        let topic = output.cluster("topic_0").unwrap();
        assert_eq!(topic.child_cluster_ids.len(), 10);
    }
}

/// One message is one conversation inside one topic.
#[tokio::test]
async fn test_single_message() {
    let harness = TestHarness::new();
    let orch = harness.orchestrator(Arc::new(KeywordEmbedder::exact()));
    let mut messages = scenario_messages();
    messages.truncate(1);

    let output = orch.process_messages(messages, false, None, None).await.unwrap();

    assert_eq!(output.metadata.total_conversations, 1);
    assert_eq!(output.metadata.total_topics, 1);
    let conv = output.cluster("conv_0").unwrap();
    assert_eq!(conv.label, "deploy to staging failed");
    assert_eq!(conv.parent_cluster_id.as_deref(), Some("topic_0"));
}

/// Messages without a channel group under "unknown" and carry no channel tag.
#[tokio::test]
async fn test_missing_channel_grouped_as_unknown() {
    let harness = TestHarness::new();
    let orch = harness.orchestrator(Arc::new(KeywordEmbedder::exact()));
    let mut messages = scenario_messages();
    for msg in &mut messages {
        msg.channel = None;
    }

    let output = orch
        .process_messages(messages, false, Some(0.5), Some(1))
        .await
        .unwrap();

    // Early A and B interleave within one hour, so they merge
    assert_eq!(output.metadata.total_conversations, 2);
    for conv in output.clusters_at(ClusterLevel::Conversation) {
        assert!(conv.tags.is_empty());
    }
    assert!(output
        .messages_with_tags
        .iter()
        .all(|m| m.channel == "unknown"));
}

/// Unparsable timestamps are substituted and reported under the
/// wall-clock policy.
#[tokio::test]
async fn test_wall_clock_policy_accepts_bad_timestamps() {
    let harness = TestHarness::new();
    let mut settings = Settings::default();
    settings.clustering.timestamp_policy = TimestampPolicy::WallClock;
    let orch = harness.orchestrator_with(Arc::new(KeywordEmbedder::exact()), settings);

    let mut messages = scenario_messages();
    messages[5].timestamp = "yesterday-ish".to_string();

    let output = orch.process_messages(messages, false, None, Some(1)).await.unwrap();

    assert_hierarchy_consistent(&output);
    assert_eq!(output.messages_with_tags[5].timestamp, "yesterday-ish");
}

/// Topic labels and tags come from the keyword labeler.
#[tokio::test]
async fn test_topic_labels_from_keywords() {
    let harness = TestHarness::new();
    let orch = harness.orchestrator(Arc::new(KeywordEmbedder::exact()));

    let output = orch
        .process_messages(scenario_messages(), false, Some(0.5), Some(1))
        .await
        .unwrap();

    let labels: Vec<String> = output
        .clusters_at(ClusterLevel::Topic)
        .map(|t| t.label.to_lowercase())
        .collect();
    assert!(labels[0].contains("deploy"));
    assert!(labels[1].contains("lunch"));
    assert!(labels[2].contains("python"));

    for msg in &output.messages_with_tags {
        let topic = output.cluster(msg.topic_id.as_deref().unwrap()).unwrap();
        assert_eq!(&msg.tags, &topic.tags);
    }
}
