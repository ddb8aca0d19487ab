//! Fixture providers for pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use clustergraph_embeddings::{Embedding, EmbeddingError, EmbeddingModel, ModelInfo};
use clustergraph_topics::{LabelError, LabelGenerator};
use clustergraph_types::Message;

/// Maps a text to a basis vector by the first keyword it contains.
pub struct AxisEmbedder {
    info: ModelInfo,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl AxisEmbedder {
    pub const DIMENSION: usize = 4;
    const KEYWORDS: [&'static str; 3] = ["deploy", "lunch", "python"];

    pub fn new() -> Self {
        Self {
            info: ModelInfo {
                name: "axis-fixture".to_string(),
                dimension: Self::DIMENSION,
                max_sequence_length: 128,
            },
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        }
    }

    /// Number of batch calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts embedded.
    pub fn texts_seen(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

impl EmbeddingModel for AxisEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let lower = text.to_lowercase();
        let axis = Self::KEYWORDS
            .iter()
            .position(|k| lower.contains(k))
            .unwrap_or(Self::DIMENSION - 1);
        let mut values = vec![0.0; Self::DIMENSION];
        values[axis] = 1.0;
        Ok(Embedding::from_normalized(values))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Always fails with a provider error.
pub struct FailingEmbedder(ModelInfo);

impl FailingEmbedder {
    pub fn new() -> Self {
        Self(ModelInfo {
            name: "failing".to_string(),
            dimension: AxisEmbedder::DIMENSION,
            max_sequence_length: 128,
        })
    }
}

impl EmbeddingModel for FailingEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.0
    }

    fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
        Err(EmbeddingError::Provider("quota exceeded".to_string()))
    }
}

/// Always fails with a provider error.
pub struct FailingLabeler;

#[async_trait]
impl LabelGenerator for FailingLabeler {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn label(&self, _texts: &[String]) -> Result<String, LabelError> {
        Err(LabelError::Provider("rate limited".to_string()))
    }

    async fn tags(&self, _texts: &[String], _n: usize) -> Result<Vec<String>, LabelError> {
        Err(LabelError::Provider("rate limited".to_string()))
    }
}

/// Two early and two late messages in channel A, two interleaved in B.
pub fn scenario_messages() -> Vec<Message> {
    vec![
        Message::new("deploy to staging failed", "A", "u1", "2025-11-14T10:00:00Z"),
        Message::new("python typing question", "B", "u2", "2025-11-14T10:00:20Z"),
        Message::new("deploy rollback worked", "A", "u3", "2025-11-14T10:00:40Z"),
        Message::new("python asyncio help", "B", "u4", "2025-11-14T10:00:50Z"),
        Message::new("lunch order for the team", "A", "u1", "2025-11-14T12:01:00Z"),
        Message::new("lunch at the taco place", "A", "u2", "2025-11-14T12:01:30Z"),
    ]
}
