//! The clustering pipeline.
//!
//! Stage order: assign IDs, consult the cache, embed, group into
//! conversations, assemble topics, label, project the output and write it
//! through to the cache. Embedding and labeling are the only stages that
//! talk to external providers; everything between them is pure.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use clustergraph_cache::{cache_key, CacheStore};
use clustergraph_embeddings::{Embedding, EmbeddingModel};
use clustergraph_topics::{
    assemble_hierarchy, fallback_label, fallback_tags, first_message_label, top_representatives,
    ConversationGrouper, Hierarchy, HierarchyParams, LabelGenerator,
};
use clustergraph_types::{
    assign_message_ids, ClusterInfo, ClusteringConfig, ClusteringOutput, ClusteringParams,
    Message, ModelInfo, RunMetadata, Settings,
};

use crate::error::OrchestratorError;
use crate::present::{conversation_info, tagged_messages, topic_info, ClusterText};

/// Texts sampled from a long conversation for its label.
const CONVERSATION_SAMPLE: usize = 10;

/// Per-run output options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Attach each message's embedding to its output record
    pub include_embeddings: bool,
}

/// Runs clustering requests against injected providers.
///
/// Holds no mutable state; independent runs may proceed concurrently and
/// share only the cache store.
pub struct Orchestrator {
    embedder: Arc<dyn EmbeddingModel>,
    labeler: Arc<dyn LabelGenerator>,
    cache: Option<Arc<dyn CacheStore>>,
    settings: Settings,
    options: PipelineOptions,
}

impl Orchestrator {
    /// Create an orchestrator without a cache.
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        labeler: Arc<dyn LabelGenerator>,
        settings: Settings,
    ) -> Self {
        Self {
            embedder,
            labeler,
            cache: None,
            settings,
            options: PipelineOptions::default(),
        }
    }

    /// Write results through to `cache` and serve repeated requests from it.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Cluster `messages` into conversations and topics.
    ///
    /// `distance_threshold` and `min_cluster_size` override the configured
    /// topic-level values for this run. With `force_recompute` the cache is
    /// not read, but the fresh result is still written.
    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    pub async fn process_messages(
        &self,
        messages: Vec<Message>,
        force_recompute: bool,
        distance_threshold: Option<f32>,
        min_cluster_size: Option<usize>,
    ) -> Result<ClusteringOutput, OrchestratorError> {
        let started = Instant::now();
        let mut messages = messages;
        let assigned = assign_message_ids(&mut messages);
        debug!(assigned, "Assigned message IDs");

        let clustering = self.effective_config(distance_threshold, min_cluster_size)?;
        let key = cache_key(
            &messages,
            clustering.distance_threshold,
            clustering.min_cluster_size,
        );

        if messages.is_empty() {
            info!("No messages to cluster");
            return Ok(self.assemble_output(
                &messages,
                &[],
                &Hierarchy::default(),
                &[],
                &clustering,
                key,
                started,
            ));
        }

        if !force_recompute {
            if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
                if let Some(hit) = self.reuse(hit, &messages, &clustering) {
                    info!(cache_key = %key, "Serving result from cache");
                    return Ok(hit);
                }
            }
        }

        let texts: Vec<String> = messages.iter().map(|m| m.text.clone()).collect();
        let embeddings = self.encode(texts).await?;
        info!(count = embeddings.len(), "Embedded messages");

        let grouping = ConversationGrouper::new(
            clustering.conversation_gap_secs,
            clustering.timestamp_policy,
        )
        .group(&messages, Utc::now())?;
        info!(
            conversations = grouping.len(),
            substituted = grouping.substituted_timestamps.len(),
            "Grouped conversations"
        );

        let params = HierarchyParams::from_config(&clustering);
        let hierarchy = assemble_hierarchy(&messages, &embeddings, &grouping, &params)?;

        let texts = self.describe_clusters(&messages, &embeddings, &hierarchy).await?;
        info!(clusters = texts.len(), "Labeled clusters");

        let output = self.assemble_output(
            &messages,
            &embeddings,
            &hierarchy,
            &texts,
            &clustering,
            key,
            started,
        );

        if let Some(cache) = &self.cache {
            cache.put(&output.metadata.cache_key, &output);
        }

        info!(
            topics = output.metadata.total_topics,
            conversations = output.metadata.total_conversations,
            seconds = output.metadata.processing_time_seconds,
            "Clustering run complete"
        );
        Ok(output)
    }

    /// Fit a cached result to this request and its output options.
    ///
    /// The key covers only the joined texts, threshold and minimum size, so a
    /// hit must also match the full clustering parameters and the request's
    /// texts message by message. `None` means recompute.
    fn reuse(
        &self,
        mut hit: ClusteringOutput,
        messages: &[Message],
        clustering: &ClusteringConfig,
    ) -> Option<ClusteringOutput> {
        let key = &hit.metadata.cache_key;
        if hit.metadata.clustering_params != ClusteringParams::from(clustering) {
            debug!(cache_key = %key, "Cached result used other parameters, recomputing");
            return None;
        }
        let same_texts = hit.messages_with_tags.len() == messages.len()
            && hit
                .messages_with_tags
                .iter()
                .zip(messages)
                .all(|(cached, message)| cached.text == message.text);
        if !same_texts {
            debug!(cache_key = %key, "Cached result holds other messages, recomputing");
            return None;
        }
        if self.options.include_embeddings {
            let complete = hit.messages_with_tags.iter().all(|m| m.embedding.is_some());
            if !complete {
                debug!(cache_key = %key, "Cached result lacks embeddings, recomputing");
            }
            return complete.then_some(hit);
        }
        for message in &mut hit.messages_with_tags {
            message.embedding = None;
        }
        Some(hit)
    }

    fn effective_config(
        &self,
        distance_threshold: Option<f32>,
        min_cluster_size: Option<usize>,
    ) -> Result<ClusteringConfig, OrchestratorError> {
        let mut config = self.settings.clustering.clone();
        if let Some(threshold) = distance_threshold {
            config.distance_threshold = threshold;
        }
        if let Some(min_size) = min_cluster_size {
            config.min_cluster_size = min_size;
        }
        config
            .validate()
            .map_err(OrchestratorError::InvalidParameters)?;
        Ok(config)
    }

    /// Encode texts on the blocking pool.
    pub(crate) async fn encode(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, OrchestratorError> {
        let embedder = self.embedder.clone();
        let batch_size = self.settings.embedding.batch_size;
        let seed = self.settings.embedding.seed;

        let embeddings =
            tokio::task::spawn_blocking(move || embedder.encode(&texts, batch_size, seed))
                .await
                .map_err(|e| OrchestratorError::Task(e.to_string()))??;

        Ok(embeddings.into_iter().map(Embedding::into_values).collect())
    }

    /// Labels for every topic, then every conversation.
    ///
    /// Generator calls run with at most `max_workers` in flight; results
    /// keep the request order.
    async fn describe_clusters(
        &self,
        messages: &[Message],
        embeddings: &[Vec<f32>],
        hierarchy: &Hierarchy,
    ) -> Result<Vec<ClusterText>, OrchestratorError> {
        let labeling = &self.settings.labeling;
        let mut requests =
            Vec::with_capacity(hierarchy.topics.len() + hierarchy.conversations.len());

        for topic in &hierarchy.topics {
            let reps = top_representatives(
                embeddings,
                &topic.message_indices,
                &topic.centroid,
                labeling.representative_count,
            );
            let texts = reps.iter().map(|&m| messages[m].text.clone()).collect();
            requests.push(LabelRequest::Generate {
                texts,
                num_tags: labeling.num_tags,
            });
        }

        for conversation in &hierarchy.conversations {
            let first = conversation.message_indices.first().map(|&m| &messages[m].text);
            match first {
                Some(text) if conversation.size() <= labeling.short_conversation_len => {
                    requests.push(LabelRequest::Fixed(first_message_label(
                        text,
                        labeling.conversation_label_chars,
                    )));
                }
                _ => {
                    let texts = conversation
                        .message_indices
                        .iter()
                        .take(CONVERSATION_SAMPLE)
                        .map(|&m| messages[m].text.clone())
                        .collect();
                    requests.push(LabelRequest::Generate { texts, num_tags: 0 });
                }
            }
        }

        let results: Vec<Result<ClusterText, OrchestratorError>> = stream::iter(requests)
            .map(|request| self.resolve(request))
            .buffered(labeling.max_workers.max(1))
            .collect()
            .await;

        results.into_iter().collect()
    }

    async fn resolve(&self, request: LabelRequest) -> Result<ClusterText, OrchestratorError> {
        let (texts, num_tags) = match request {
            LabelRequest::Fixed(label) => {
                return Ok(ClusterText {
                    label,
                    tags: Vec::new(),
                })
            }
            LabelRequest::Generate { texts, num_tags } => (texts, num_tags),
        };

        let fallback = self.settings.labeling.fallback_on_error;

        let label = match self.labeler.label(&texts).await {
            Ok(label) => label,
            Err(e) if fallback => {
                warn!(error = %e, "Label generation failed, using fallback label");
                fallback_label(&texts)
            }
            Err(e) => return Err(e.into()),
        };

        let tags = if num_tags == 0 {
            Vec::new()
        } else {
            match self.labeler.tags(&texts, num_tags).await {
                Ok(tags) => tags,
                Err(e) if fallback => {
                    warn!(error = %e, "Tag generation failed, using fallback tags");
                    fallback_tags(&texts, num_tags)
                }
                Err(e) => return Err(e.into()),
            }
        };

        Ok(ClusterText { label, tags })
    }

    /// Project the hierarchy into the output document.
    ///
    /// `texts` holds one entry per topic followed by one per conversation.
    #[allow(clippy::too_many_arguments)]
    fn assemble_output(
        &self,
        messages: &[Message],
        embeddings: &[Vec<f32>],
        hierarchy: &Hierarchy,
        texts: &[ClusterText],
        clustering: &ClusteringConfig,
        cache_key: String,
        started: Instant,
    ) -> ClusteringOutput {
        let (topic_texts, conversation_texts) =
            texts.split_at(hierarchy.topics.len().min(texts.len()));

        let mut clusters: Vec<ClusterInfo> =
            Vec::with_capacity(hierarchy.topics.len() + hierarchy.conversations.len());
        clusters.extend(
            hierarchy
                .topics
                .iter()
                .zip(topic_texts)
                .map(|(topic, text)| topic_info(topic, text)),
        );
        clusters.extend(
            hierarchy
                .conversations
                .iter()
                .zip(conversation_texts)
                .map(|(conversation, text)| conversation_info(conversation, text)),
        );

        let topic_tags: Vec<&[String]> = topic_texts.iter().map(|t| t.tags.as_slice()).collect();
        let embeddings = self.options.include_embeddings.then_some(embeddings);
        let messages_with_tags = tagged_messages(messages, hierarchy, &topic_tags, embeddings);

        let metadata = RunMetadata {
            processing_time_seconds: started.elapsed().as_secs_f64(),
            total_messages: messages.len(),
            total_conversations: hierarchy.conversations.len(),
            total_topics: hierarchy.topics.len(),
            total_clusters: clusters.len(),
            timestamp: Utc::now().to_rfc3339(),
            cache_key,
            model_info: ModelInfo {
                embedding_model: self.embedder.info().name.clone(),
                label_model: self.labeler.model_name().to_string(),
            },
            clustering_params: ClusteringParams::from(clustering),
        };

        ClusteringOutput {
            messages_with_tags,
            clusters,
            metadata,
        }
    }
}

/// How a cluster gets its label.
enum LabelRequest {
    /// Already decided (short conversations)
    Fixed(String),
    /// Ask the generator; `num_tags == 0` skips the tag call
    Generate { texts: Vec<String>, num_tags: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        scenario_messages, AxisEmbedder, FailingEmbedder, FailingLabeler,
    };
    use clustergraph_cache::MemoryCacheStore;
    use clustergraph_topics::{KeywordLabeler, GENERAL_LABEL};
    use clustergraph_types::ClusterLevel;

    fn orchestrator(embedder: Arc<dyn EmbeddingModel>) -> Orchestrator {
        Orchestrator::new(
            embedder,
            Arc::new(KeywordLabeler::default()),
            Settings::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_input_returns_empty_output() {
        let embedder = Arc::new(AxisEmbedder::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let orch = orchestrator(embedder.clone()).with_cache(cache.clone());

        let output = orch.process_messages(Vec::new(), false, None, None).await.unwrap();

        assert!(output.messages_with_tags.is_empty());
        assert!(output.clusters.is_empty());
        assert_eq!(output.metadata.total_clusters, 0);
        assert_eq!(embedder.calls(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_three_conversations_three_topics() {
        let orch = orchestrator(Arc::new(AxisEmbedder::new()));

        let output = orch
            .process_messages(scenario_messages(), false, Some(0.5), Some(1))
            .await
            .unwrap();

        assert_eq!(output.metadata.total_conversations, 3);
        assert_eq!(output.metadata.total_topics, 3);
        assert_eq!(output.clusters.len(), 6);

        // Topics first, then conversations
        let levels: Vec<u8> = output.clusters.iter().map(|c| c.level).collect();
        assert_eq!(levels, vec![2, 2, 2, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_scenario_min_size_collapses_topics() {
        let orch = orchestrator(Arc::new(AxisEmbedder::new()));

        let output = orch
            .process_messages(scenario_messages(), false, Some(0.5), Some(4))
            .await
            .unwrap();

        assert_eq!(output.metadata.total_conversations, 3);
        assert_eq!(output.metadata.total_topics, 1);
        let topic = output.cluster("topic_0").unwrap();
        assert_eq!(topic.child_cluster_ids.len(), 3);
        assert_eq!(topic.size, 6);
    }

    #[tokio::test]
    async fn test_output_links_and_presentation() {
        let orch = orchestrator(Arc::new(AxisEmbedder::new()));
        let output = orch
            .process_messages(scenario_messages(), false, Some(0.5), Some(1))
            .await
            .unwrap();

        for conv in output.clusters_at(ClusterLevel::Conversation) {
            assert_eq!(conv.radius, 300.0);
            let parent = conv.parent_cluster_id.as_deref().unwrap();
            let topic = output.cluster(parent).unwrap();
            assert!(topic.child_cluster_ids.contains(&conv.cluster_id));
            // Two messages each, so labelled by the first message
            assert!(!conv.label.is_empty());
            assert_eq!(conv.tags.len(), 1);
        }
        for topic in output.clusters_at(ClusterLevel::Topic) {
            assert_eq!(topic.radius, 150.0);
            assert!(topic.parent_cluster_id.is_none());
            assert!(!topic.tags.is_empty());
        }

        for msg in &output.messages_with_tags {
            let conv = output.cluster(msg.cluster_id.as_deref().unwrap()).unwrap();
            assert_eq!(conv.parent_cluster_id, msg.topic_id);
            let topic = output.cluster(msg.topic_id.as_deref().unwrap()).unwrap();
            assert_eq!(msg.tags, topic.tags);
            assert!(msg.embedding.is_none());
        }

        assert_eq!(output.metadata.model_info.embedding_model, "axis-fixture");
        assert_eq!(output.metadata.model_info.label_model, "tfidf-keywords");
        assert_eq!(output.metadata.clustering_params.min_cluster_size, 1);
    }

    #[tokio::test]
    async fn test_include_embeddings_option() {
        let orch = orchestrator(Arc::new(AxisEmbedder::new())).with_options(PipelineOptions {
            include_embeddings: true,
        });
        let output = orch
            .process_messages(scenario_messages(), false, None, None)
            .await
            .unwrap();

        assert!(output
            .messages_with_tags
            .iter()
            .all(|m| m.embedding.as_ref().map(Vec::len) == Some(AxisEmbedder::DIMENSION)));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_embedding() {
        let embedder = Arc::new(AxisEmbedder::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let orch = orchestrator(embedder.clone()).with_cache(cache.clone());

        let first = orch
            .process_messages(scenario_messages(), false, None, None)
            .await
            .unwrap();
        assert_eq!(embedder.calls(), 1);
        assert_eq!(cache.len(), 1);

        let second = orch
            .process_messages(scenario_messages(), false, None, None)
            .await
            .unwrap();
        assert_eq!(embedder.calls(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cache_hit_follows_embedding_option() {
        let embedder = Arc::new(AxisEmbedder::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let plain = orchestrator(embedder.clone()).with_cache(cache.clone());
        let with_embeddings = orchestrator(embedder.clone())
            .with_cache(cache.clone())
            .with_options(PipelineOptions {
                include_embeddings: true,
            });

        plain
            .process_messages(scenario_messages(), false, None, None)
            .await
            .unwrap();
        // Stored entry has no embeddings, so this run recomputes
        let full = with_embeddings
            .process_messages(scenario_messages(), false, None, None)
            .await
            .unwrap();
        assert_eq!(embedder.calls(), 2);
        assert!(full.messages_with_tags.iter().all(|m| m.embedding.is_some()));

        // Stored entry now has embeddings; the plain run strips them
        let stripped = plain
            .process_messages(scenario_messages(), false, None, None)
            .await
            .unwrap();
        assert_eq!(embedder.calls(), 2);
        assert!(stripped.messages_with_tags.iter().all(|m| m.embedding.is_none()));
    }

    #[tokio::test]
    async fn test_force_recompute_bypasses_cache_read() {
        let embedder = Arc::new(AxisEmbedder::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let orch = orchestrator(embedder.clone()).with_cache(cache.clone());

        orch.process_messages(scenario_messages(), false, None, None)
            .await
            .unwrap();
        orch.process_messages(scenario_messages(), true, None, None)
            .await
            .unwrap();

        assert_eq!(embedder.calls(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_different_params_use_different_keys() {
        let cache = Arc::new(MemoryCacheStore::new());
        let orch = orchestrator(Arc::new(AxisEmbedder::new())).with_cache(cache.clone());

        let a = orch
            .process_messages(scenario_messages(), false, Some(0.5), Some(1))
            .await
            .unwrap();
        let b = orch
            .process_messages(scenario_messages(), false, Some(0.5), Some(2))
            .await
            .unwrap();

        assert_ne!(a.metadata.cache_key, b.metadata.cache_key);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_requires_matching_settings() {
        let embedder = Arc::new(AxisEmbedder::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let wide = orchestrator(embedder.clone()).with_cache(cache.clone());
        let mut settings = Settings::default();
        settings.clustering.max_topics = 1;
        let capped = Orchestrator::new(
            embedder.clone(),
            Arc::new(KeywordLabeler::default()),
            settings,
        )
        .with_cache(cache.clone());

        let first = wide
            .process_messages(scenario_messages(), false, Some(0.5), Some(1))
            .await
            .unwrap();
        assert_eq!(first.metadata.total_topics, 3);

        // Same key, but the stored run allowed more topics
        let second = capped
            .process_messages(scenario_messages(), false, Some(0.5), Some(1))
            .await
            .unwrap();
        assert_eq!(second.metadata.cache_key, first.metadata.cache_key);
        assert_eq!(embedder.calls(), 2);
        assert_eq!(second.metadata.total_topics, 1);
        assert_eq!(second.metadata.clustering_params.max_topics, 1);
    }

    #[tokio::test]
    async fn test_cache_hit_requires_same_messages() {
        let embedder = Arc::new(AxisEmbedder::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let orch = orchestrator(embedder.clone()).with_cache(cache.clone());
        let at = "2025-11-14T10:00:00Z";

        let split = vec![
            Message::new("deploy ", "A", "u1", at),
            Message::new("failed", "A", "u1", at),
        ];
        let joined = vec![Message::new("deploy failed", "A", "u1", at)];

        let first = orch.process_messages(split, false, None, Some(1)).await.unwrap();
        let second = orch.process_messages(joined, false, None, Some(1)).await.unwrap();

        // Concatenated texts collide on the key
        assert_eq!(first.metadata.cache_key, second.metadata.cache_key);
        assert_eq!(embedder.calls(), 2);
        assert_eq!(second.messages_with_tags.len(), 1);
        assert_eq!(second.messages_with_tags[0].text, "deploy failed");
        assert_eq!(second.metadata.total_messages, 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_without_caching() {
        let cache = Arc::new(MemoryCacheStore::new());
        let orch = orchestrator(Arc::new(FailingEmbedder::new())).with_cache(cache.clone());

        let result = orch
            .process_messages(scenario_messages(), false, None, None)
            .await;

        assert!(matches!(result, Err(OrchestratorError::Embedding(_))));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_timestamp_is_clustering_error() {
        let orch = orchestrator(Arc::new(AxisEmbedder::new()));
        let mut messages = scenario_messages();
        messages[2].timestamp = "not a time".to_string();

        let result = orch.process_messages(messages, false, None, None).await;
        assert!(matches!(result, Err(OrchestratorError::Clustering(_))));
    }

    #[tokio::test]
    async fn test_invalid_override_rejected() {
        let orch = orchestrator(Arc::new(AxisEmbedder::new()));
        let result = orch
            .process_messages(scenario_messages(), false, Some(-1.0), None)
            .await;
        assert!(matches!(result, Err(OrchestratorError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_label_failure_uses_fallback() {
        let orch = Orchestrator::new(
            Arc::new(AxisEmbedder::new()),
            Arc::new(FailingLabeler),
            Settings::default(),
        );

        let output = orch
            .process_messages(scenario_messages(), false, Some(0.5), Some(1))
            .await
            .unwrap();

        for topic in output.clusters_at(ClusterLevel::Topic) {
            // Two-message topics: every member is a representative
            let texts: Vec<String> = topic
                .message_ids
                .iter()
                .filter_map(|id| output.messages_with_tags.iter().find(|m| &m.message_id == id))
                .map(|m| m.text.clone())
                .collect();
            assert_eq!(topic.label, fallback_label(&texts));
            assert_eq!(topic.tags, fallback_tags(&texts, 5));
        }
        assert_ne!(output.cluster("topic_0").unwrap().label, GENERAL_LABEL);
    }

    #[tokio::test]
    async fn test_label_failure_without_fallback_is_error() {
        let mut settings = Settings::default();
        settings.labeling.fallback_on_error = false;
        let cache = Arc::new(MemoryCacheStore::new());
        let orch = Orchestrator::new(
            Arc::new(AxisEmbedder::new()),
            Arc::new(FailingLabeler),
            settings,
        )
        .with_cache(cache.clone());

        let result = orch
            .process_messages(scenario_messages(), false, None, None)
            .await;

        assert!(matches!(result, Err(OrchestratorError::Labeling(_))));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_runs_are_deterministic() {
        let orch = orchestrator(Arc::new(AxisEmbedder::new()));
        let a = orch
            .process_messages(scenario_messages(), true, None, None)
            .await
            .unwrap();
        let b = orch
            .process_messages(scenario_messages(), true, None, None)
            .await
            .unwrap();

        assert_eq!(a.clusters, b.clusters);
        assert_eq!(a.messages_with_tags, b.messages_with_tags);
        assert_eq!(a.metadata.cache_key, b.metadata.cache_key);
    }

    #[tokio::test]
    async fn test_long_conversation_uses_generator() {
        let base = chrono::Utc::now() - chrono::Duration::hours(1);
        let messages: Vec<Message> = (0..5)
            .map(|i| {
                let ts = (base + chrono::Duration::seconds(i * 10)).to_rfc3339();
                Message::new(format!("deploy pipeline step {}", i), "ops", "u1", ts)
            })
            .collect();

        let orch = orchestrator(Arc::new(AxisEmbedder::new()));
        let output = orch.process_messages(messages, false, None, Some(1)).await.unwrap();

        let conv = output.cluster("conv_0").unwrap();
        assert_eq!(conv.size, 5);
        assert!(conv.label.starts_with("Deploy") || conv.label.starts_with("Pipeline"));
        assert_eq!(conv.tags, vec!["ops"]);
    }
}
