//! Cache keys.
//!
//! A key is the SHA-256 hex digest of the concatenated message texts
//! followed by `"{distance_threshold}_{min_cluster_size}"`. Only the texts
//! and those two parameters take part, so identical requests map to the
//! same entry regardless of message ids, users or field order.

use sha2::{Digest, Sha256};

use clustergraph_types::Message;

/// Key for a message set and effective clustering parameters.
pub fn cache_key(messages: &[Message], distance_threshold: f32, min_cluster_size: usize) -> String {
    texts_cache_key(
        messages.iter().map(|m| m.text.as_str()),
        distance_threshold,
        min_cluster_size,
    )
}

/// Key from texts directly.
pub fn texts_cache_key<'a>(
    texts: impl IntoIterator<Item = &'a str>,
    distance_threshold: f32,
    min_cluster_size: usize,
) -> String {
    let mut hasher = Sha256::new();
    for text in texts {
        hasher.update(text.as_bytes());
    }
    // Debug formatting keeps the `.0` on whole thresholds ("1.0_3")
    hasher.update(format!("{:?}_{}", distance_threshold, min_cluster_size).as_bytes());
    hex::encode(hasher.finalize())
}

/// Keys are lowercase hex digests; anything else is rejected before it
/// reaches a file name.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 128 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
