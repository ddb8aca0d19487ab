//! Keyword ranking for cluster labels.
//!
//! Scores are TF-IDF over the texts handed to a single label request.
//! Terms live in an ordered map, so equal scores rank alphabetically.

use std::collections::{BTreeMap, HashSet};

/// Words too common in chat to describe a topic.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "anyone", "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "could", "did", "do", "does", "doing", "dont", "down", "during",
    "each", "else", "every", "few", "for", "from", "had", "has", "have", "he", "her", "here",
    "hey", "him", "his", "how", "if", "im", "in", "into", "is", "it", "its", "itself", "just",
    "me", "might", "more", "most", "must", "my", "myself", "no", "nor", "not", "now", "of", "ok",
    "okay", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same", "shall",
    "should", "so", "some", "such", "than", "thanks", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "why", "will",
    "with", "would", "yeah", "yes", "you", "your",
];

#[derive(Debug, Clone, Copy, Default)]
struct TermStats {
    /// Occurrences over the whole corpus
    occurrences: usize,
    /// Documents mentioning the term at least once
    documents: usize,
}

/// Term statistics of one small corpus.
#[derive(Debug, Default)]
pub struct TfIdf {
    terms: BTreeMap<String, TermStats>,
    tokens: usize,
    documents: usize,
}

impl TfIdf {
    pub fn new(documents: &[&str]) -> Self {
        let mut table = Self {
            documents: documents.len(),
            ..Self::default()
        };

        for document in documents {
            let words = keywords_of(document);
            table.tokens += words.len();
            let mut seen = HashSet::new();
            for word in words {
                let stats = table.terms.entry(word.clone()).or_default();
                stats.occurrences += 1;
                if seen.insert(word) {
                    stats.documents += 1;
                }
            }
        }
        table
    }

    /// `tf * idf` with tf the term's share of all tokens and the smoothed
    /// `idf = ln((N + 1) / (df + 1)) + 1`. Unknown terms score 0.
    pub fn score(&self, term: &str) -> f32 {
        match self.terms.get(term) {
            Some(stats) => self.weigh(stats),
            None => 0.0,
        }
    }

    fn weigh(&self, stats: &TermStats) -> f32 {
        if self.tokens == 0 || stats.documents == 0 {
            return 0.0;
        }
        let tf = stats.occurrences as f32 / self.tokens as f32;
        let idf = ((self.documents + 1) as f32 / (stats.documents + 1) as f32).ln() + 1.0;
        tf * idf
    }

    /// The `n` best terms, highest score first.
    pub fn top_terms(&self, n: usize) -> Vec<(String, f32)> {
        let mut ranked: Vec<(String, f32)> = self
            .terms
            .iter()
            .map(|(term, stats)| (term.clone(), self.weigh(stats)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    pub fn doc_count(&self) -> usize {
        self.documents
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

/// Lowercased words of a text, minus stop words, numbers and
/// single characters.
fn keywords_of(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().nth(1).is_some())
        .filter(|word| !word.chars().all(char::is_numeric))
        .filter(|word| !is_stop_word(word))
        .map(str::to_string)
        .collect()
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}
