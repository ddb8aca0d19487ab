//! Semantic search over clustered messages and cluster centroids.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use clustergraph_topics::cosine_similarity;
use clustergraph_types::{ClusterInfo, MessageWithTags};

use crate::error::OrchestratorError;
use crate::pipeline::Orchestrator;

/// Restricts which messages a search considers.
///
/// Empty lists impose no restriction; when both are set a message must
/// pass both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Keep messages sharing any of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Keep messages whose conversation or topic is listed
    #[serde(default)]
    pub cluster_ids: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.cluster_ids.is_empty()
    }

    pub fn matches(&self, message: &MessageWithTags) -> bool {
        let tag_ok = self.tags.is_empty() || message.tags.iter().any(|t| self.tags.contains(t));
        let cluster_ok = self.cluster_ids.is_empty()
            || [&message.cluster_id, &message.topic_id]
                .into_iter()
                .flatten()
                .any(|id| self.cluster_ids.contains(id));
        tag_ok && cluster_ok
    }
}

/// A message with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageHit {
    pub message: MessageWithTags,
    pub score: f32,
}

/// A cluster with the similarity of its centroid to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterHit {
    pub cluster: ClusterInfo,
    pub score: f32,
}

impl Orchestrator {
    /// Rank messages by cosine similarity to `query`.
    ///
    /// Stored embeddings are used where present; the remaining texts are
    /// encoded together with the query.
    #[instrument(skip(self, messages, filters), fields(candidates = messages.len()))]
    pub async fn search(
        &self,
        query: &str,
        messages: &[MessageWithTags],
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<MessageHit>, OrchestratorError> {
        let candidates: Vec<&MessageWithTags> =
            messages.iter().filter(|m| filters.matches(m)).collect();
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut texts = vec![query.to_string()];
        texts.extend(
            candidates
                .iter()
                .filter(|m| m.embedding.is_none())
                .map(|m| m.text.clone()),
        );
        debug!(
            candidates = candidates.len(),
            encoded = texts.len() - 1,
            "Encoding query"
        );

        let mut encoded = self.encode(texts).await?.into_iter();
        let Some(query_vec) = encoded.next() else {
            return Ok(Vec::new());
        };

        let mut scored = Vec::with_capacity(candidates.len());
        for message in candidates {
            let score = match &message.embedding {
                Some(stored) => cosine_similarity(&query_vec, stored),
                None => encoded
                    .next()
                    .map(|v| cosine_similarity(&query_vec, &v))
                    .unwrap_or(0.0),
            };
            scored.push((message.clone(), score));
        }

        Ok(rank(scored, top_k)
            .into_iter()
            .map(|(message, score)| MessageHit { message, score })
            .collect())
    }

    /// Rank clusters by cosine similarity of their centroids to `query`.
    #[instrument(skip(self, clusters), fields(candidates = clusters.len()))]
    pub async fn search_clusters(
        &self,
        query: &str,
        clusters: &[ClusterInfo],
        top_k: usize,
    ) -> Result<Vec<ClusterHit>, OrchestratorError> {
        if clusters.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let Some(query_vec) = self.encode(vec![query.to_string()]).await?.pop() else {
            return Ok(Vec::new());
        };

        let scored = clusters
            .iter()
            .map(|c| (c.clone(), cosine_similarity(&query_vec, &c.centroid)))
            .collect();

        Ok(rank(scored, top_k)
            .into_iter()
            .map(|(cluster, score)| ClusterHit { cluster, score })
            .collect())
    }
}

/// Highest score first, ties by input order, at most `top_k`.
fn rank<T>(mut scored: Vec<(T, f32)>, top_k: usize) -> Vec<(T, f32)> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}
