//! End-to-end test infrastructure for clustergraph.
//!
//! Provides a shared TestHarness, deterministic fixture providers and
//! synthetic corpora for tests that run the whole pipeline without
//! downloading an embedding model.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use clustergraph_cache::FileCacheStore;
use clustergraph_embeddings::{Embedding, EmbeddingError, EmbeddingModel, ModelInfo};
use clustergraph_orchestrator::Orchestrator;
use clustergraph_topics::{KeywordLabeler, LabelError, LabelGenerator};
use clustergraph_types::{ClusterLevel, ClusteringOutput, Message, Settings};

/// Topic keywords understood by [`KeywordEmbedder`], one axis each.
pub const VOCAB: [&str; 6] = ["deploy", "lunch", "python", "database", "hiring", "security"];

/// Channels used by synthetic corpora.
pub const CHANNELS: [&str; 3] = ["engineering", "random", "ops"];

/// Shared test harness for E2E tests.
///
/// Owns a temp directory holding the file cache.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Directory of the file cache store
    pub cache_dir: PathBuf,
    pub cache: Arc<FileCacheStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let cache_dir = temp_dir.path().join("results");
        let cache = Arc::new(FileCacheStore::new(&cache_dir));

        Self {
            _temp_dir: temp_dir,
            cache_dir,
            cache,
        }
    }

    /// Orchestrator over `embedder`, the keyword labeler and this harness's cache.
    pub fn orchestrator(&self, embedder: Arc<dyn EmbeddingModel>) -> Orchestrator {
        self.orchestrator_with(embedder, Settings::default())
    }

    pub fn orchestrator_with(
        &self,
        embedder: Arc<dyn EmbeddingModel>,
        settings: Settings,
    ) -> Orchestrator {
        let labeler = Arc::new(KeywordLabeler::new(&settings.labeling));
        Orchestrator::new(embedder, labeler, settings).with_cache(self.cache.clone())
    }

    /// Number of entry files in the cache directory.
    pub fn cache_entries(&self) -> usize {
        std::fs::read_dir(&self.cache_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic embedder: one axis per [`VOCAB`] keyword plus a
/// text-seeded jitter of amplitude `noise` on every dimension.
///
/// Texts without a keyword land on the last axis.
pub struct KeywordEmbedder {
    info: ModelInfo,
    noise: f32,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub const DIMENSION: usize = VOCAB.len() + 2;

    pub fn new(noise: f32) -> Self {
        Self {
            info: ModelInfo {
                name: "keyword-fixture".to_string(),
                dimension: Self::DIMENSION,
                max_sequence_length: 256,
            },
            noise,
            calls: AtomicUsize::new(0),
        }
    }

    /// Embedder without jitter: equal keywords give equal vectors.
    pub fn exact() -> Self {
        Self::new(0.0)
    }

    /// Number of batch calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingModel for KeywordEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let lower = text.to_lowercase();
        let axis = VOCAB
            .iter()
            .position(|k| lower.contains(k))
            .unwrap_or(Self::DIMENSION - 1);

        let mut values = vec![0.0f32; Self::DIMENSION];
        values[axis] = 1.0;
        if self.noise > 0.0 {
            let mut rng = StdRng::seed_from_u64(text_seed(text));
            for v in values.iter_mut() {
                *v += self.noise * rng.random_range(-1.0f32..1.0);
            }
        }
        Ok(Embedding::new(values))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Embedder whose provider is always unavailable.
pub struct UnavailableEmbedder(ModelInfo);

impl UnavailableEmbedder {
    pub fn new() -> Self {
        Self(ModelInfo {
            name: "unavailable".to_string(),
            dimension: KeywordEmbedder::DIMENSION,
            max_sequence_length: 256,
        })
    }
}

impl Default for UnavailableEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for UnavailableEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.0
    }

    fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
        Err(EmbeddingError::Provider("service unavailable".to_string()))
    }
}

/// Label generator that is always rate limited.
pub struct RateLimitedLabeler;

#[async_trait]
impl LabelGenerator for RateLimitedLabeler {
    fn model_name(&self) -> &str {
        "rate-limited"
    }

    async fn label(&self, _texts: &[String]) -> Result<String, LabelError> {
        Err(LabelError::Provider("429 Too Many Requests".to_string()))
    }

    async fn tags(&self, _texts: &[String], _n: usize) -> Result<Vec<String>, LabelError> {
        Err(LabelError::Provider("429 Too Many Requests".to_string()))
    }
}

/// FNV-1a over the text bytes.
fn text_seed(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 14, 9, 0, 0).unwrap()
}

/// Two early and two late messages in channel A (two hours apart) and two
/// in channel B interleaved with the early pair.
pub fn scenario_messages() -> Vec<Message> {
    let at = |minutes: i64, seconds: i64| {
        (base_time() + Duration::minutes(minutes) + Duration::seconds(seconds)).to_rfc3339()
    };
    vec![
        Message::new("deploy to staging failed", "A", "alice", at(0, 0)),
        Message::new("python typing question", "B", "bob", at(0, 20)),
        Message::new("deploy rollback worked", "A", "carol", at(0, 50)),
        Message::new("python asyncio help", "B", "dave", at(1, 10)),
        Message::new("lunch order for the team", "A", "alice", at(121, 0)),
        Message::new("lunch at the taco place", "A", "bob", at(121, 40)),
    ]
}

/// `count` messages about the same thing, each in its own conversation.
pub fn near_duplicate_messages(count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| {
            let ts = (base_time() + Duration::hours(2 * i as i64)).to_rfc3339();
            Message::new(format!("deploy failed on attempt {}", i), "ops", "u1", ts)
        })
        .collect()
}

/// Seeded corpus of `conversations` conversations with up to `max_len`
/// messages each, returned in shuffled order.
///
/// Conversations start two hours apart so each one is recovered exactly
/// by grouping.
pub fn synthetic_messages(seed: u64, conversations: usize, max_len: usize) -> Vec<Message> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut messages = Vec::new();

    for conv in 0..conversations {
        let channel = CHANNELS[rng.random_range(0..CHANNELS.len())];
        let keyword = VOCAB[rng.random_range(0..VOCAB.len())];
        let start = base_time() + Duration::hours(2 * conv as i64);
        let len = rng.random_range(1..=max_len.max(1));

        for i in 0..len {
            let ts = (start + Duration::seconds(30 * i as i64)).to_rfc3339();
            let user = format!("user{}", rng.random_range(0..5));
            messages.push(Message::new(
                format!("{} thread {} message {}", keyword, conv, i),
                channel,
                user,
                ts,
            ));
        }
    }

    messages.shuffle(&mut rng);
    messages
}

/// Panics unless every message sits in exactly one conversation and one
/// topic, and the links agree in both directions.
pub fn assert_hierarchy_consistent(output: &ClusteringOutput) {
    let conversations: Vec<_> = output.clusters_at(ClusterLevel::Conversation).collect();
    let topics: Vec<_> = output.clusters_at(ClusterLevel::Topic).collect();

    let total: usize = conversations.iter().map(|c| c.message_ids.len()).sum();
    assert_eq!(total, output.messages_with_tags.len());

    for msg in &output.messages_with_tags {
        let in_convs = conversations
            .iter()
            .filter(|c| c.message_ids.contains(&msg.message_id))
            .count();
        let in_topics = topics
            .iter()
            .filter(|t| t.message_ids.contains(&msg.message_id))
            .count();
        assert_eq!(in_convs, 1, "message {} conversations", msg.message_id);
        assert_eq!(in_topics, 1, "message {} topics", msg.message_id);
    }

    for conv in &conversations {
        let parent = conv
            .parent_cluster_id
            .as_deref()
            .and_then(|id| output.cluster(id))
            .expect("conversation without parent topic");
        assert!(parent.child_cluster_ids.contains(&conv.cluster_id));
    }
}
