//! Cluster labeling.
//!
//! Labels are attached after the hierarchy is fixed and never influence
//! grouping. [`LabelGenerator`] is the seam for external (LLM) labelers;
//! [`KeywordLabeler`] is the local TF-IDF implementation. The pure
//! [`fallback_label`] and [`fallback_tags`] functions are what callers use
//! when a generator returns an error.

use async_trait::async_trait;
use thiserror::Error;

use clustergraph_types::LabelingConfig;

use crate::tfidf::TfIdf;

/// Label returned when no usable words remain.
pub const GENERAL_LABEL: &str = "General Discussion";

/// Tag returned when no usable words remain.
pub const GENERAL_TAG: &str = "general";

/// Errors from a label generator.
#[derive(Debug, Error)]
pub enum LabelError {
    /// Nothing to label
    #[error("Cannot label an empty cluster")]
    EmptyInput,

    /// Upstream provider failure (network, quota, model)
    #[error("Label provider error: {0}")]
    Provider(String),

    /// Provider answered with something unusable
    #[error("Invalid label response: {0}")]
    InvalidResponse(String),
}

/// Produces labels and tags from representative message texts.
///
/// Async so network-backed generators can be called with bounded
/// concurrency.
#[async_trait]
pub trait LabelGenerator: Send + Sync {
    /// Name recorded in run metadata.
    fn model_name(&self) -> &str;

    /// Short human-readable label.
    async fn label(&self, texts: &[String]) -> Result<String, LabelError>;

    /// Up to `n` lowercase-hyphen tags.
    async fn tags(&self, texts: &[String], n: usize) -> Result<Vec<String>, LabelError>;
}

/// Keyword-based labeler using TF-IDF.
///
/// Needs no external service; the default generator of the binary.
pub struct KeywordLabeler {
    max_label_length: usize,
}

impl KeywordLabeler {
    pub fn new(config: &LabelingConfig) -> Self {
        Self {
            max_label_length: config.max_label_length,
        }
    }

    fn keywords(texts: &[String], n: usize) -> Vec<String> {
        let docs: Vec<&str> = texts.iter().map(String::as_str).collect();
        TfIdf::new(&docs)
            .top_terms(n)
            .into_iter()
            .map(|(term, _)| term)
            .collect()
    }
}

impl Default for KeywordLabeler {
    fn default() -> Self {
        Self::new(&LabelingConfig::default())
    }
}

#[async_trait]
impl LabelGenerator for KeywordLabeler {
    fn model_name(&self) -> &str {
        "tfidf-keywords"
    }

    async fn label(&self, texts: &[String]) -> Result<String, LabelError> {
        if texts.is_empty() {
            return Err(LabelError::EmptyInput);
        }

        let keywords = Self::keywords(texts, 3);
        if keywords.is_empty() {
            return Ok(GENERAL_LABEL.to_string());
        }

        let label = title_case(&keywords.join(" "));
        Ok(truncate_at_word(&label, self.max_label_length))
    }

    async fn tags(&self, texts: &[String], n: usize) -> Result<Vec<String>, LabelError> {
        if texts.is_empty() {
            return Err(LabelError::EmptyInput);
        }

        let tags: Vec<String> = Self::keywords(texts, n * 2)
            .iter()
            .map(|k| clean_tag(k))
            .filter(|t| !t.is_empty())
            .take(n)
            .collect();

        if tags.is_empty() {
            return Ok(vec![GENERAL_TAG.to_string()]);
        }
        Ok(tags)
    }
}

/// Label from the three most frequent words longer than two characters.
pub fn fallback_label(texts: &[String]) -> String {
    let words = frequent_words(texts, 2, 3);
    if words.is_empty() {
        return GENERAL_LABEL.to_string();
    }
    title_case(&words.join(" "))
}

/// Up to `n` tags from the most frequent words longer than three characters.
pub fn fallback_tags(texts: &[String], n: usize) -> Vec<String> {
    let tags: Vec<String> = frequent_words(texts, 3, n * 2)
        .iter()
        .map(|w| clean_tag(w))
        .filter(|t| !t.is_empty())
        .take(n)
        .collect();

    if tags.is_empty() {
        return vec![GENERAL_TAG.to_string()];
    }
    tags
}

/// Label for a short conversation: its first message, cut at a word
/// boundary with `"..."` appended when longer than `max_chars`.
pub fn first_message_label(first: &str, max_chars: usize) -> String {
    if first.chars().count() <= max_chars {
        return first.to_string();
    }
    let cut = truncate_at_word(first, max_chars);
    format!("{}...", cut.trim_end())
}

/// Keep alphanumerics, hyphens and spaces; join words with hyphens.
pub fn clean_tag(tag: &str) -> String {
    let kept: String = tag
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == ' ')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// First `max_chars` characters, shortened to the last space if there is one.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(' ') {
        Some(space) if space > 0 => truncated[..space].to_string(),
        _ => truncated,
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Most frequent whitespace-separated words, ties by first occurrence.
fn frequent_words(texts: &[String], min_len_exclusive: usize, n: usize) -> Vec<String> {
    const STOPWORDS: &[&str] = &[
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is",
        "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will",
        "would", "could", "should",
    ];

    // (word, count) in first-occurrence order
    let mut counts: Vec<(String, usize)> = Vec::new();
    for text in texts {
        for word in text.to_lowercase().split_whitespace() {
            if word.chars().count() <= min_len_exclusive || STOPWORDS.contains(&word) {
                continue;
            }
            match counts.iter_mut().find(|(w, _)| w == word) {
                Some((_, count)) => *count += 1,
                None => counts.push((word.to_string(), 1)),
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(n).map(|(w, _)| w).collect()
}
