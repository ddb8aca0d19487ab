//! Message types for the clustering pipeline.
//!
//! `Message` is the input record received from the chat platforms;
//! `MessageWithTags` is the same message after a run has placed it in a
//! conversation and a topic.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Channel used for messages that arrive without one.
pub const UNKNOWN_CHANNEL: &str = "unknown";

/// Number of hex characters kept from the content hash.
const MESSAGE_ID_HEX_LEN: usize = 12;

/// An input chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The message content
    pub text: String,

    /// Channel identifier (missing channels group under `"unknown"`)
    #[serde(default)]
    pub channel: Option<String>,

    /// User identifier
    #[serde(default)]
    pub user: String,

    /// ISO 8601 timestamp (or decimal epoch seconds)
    pub timestamp: String,

    /// Optional unique message ID, assigned from the content hash if absent
    #[serde(default)]
    pub message_id: Option<String>,
}

impl Message {
    /// Create a message with a channel and no ID.
    pub fn new(
        text: impl Into<String>,
        channel: impl Into<String>,
        user: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            channel: Some(channel.into()),
            user: user.into(),
            timestamp: timestamp.into(),
            message_id: None,
        }
    }

    /// Set an explicit message ID.
    pub fn with_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Channel name, or the `"unknown"` sentinel when absent or empty.
    pub fn channel_or_unknown(&self) -> &str {
        match self.channel.as_deref() {
            Some(channel) if !channel.is_empty() => channel,
            _ => UNKNOWN_CHANNEL,
        }
    }

    /// Assigned message ID, or an empty string before assignment.
    pub fn id(&self) -> &str {
        self.message_id.as_deref().unwrap_or("")
    }
}

/// Deterministic message ID from content and position.
///
/// `msg_` followed by the first 12 hex chars of SHA-256 over
/// `"{text}_{user}_{timestamp}_{index}"`.
pub fn message_id_for(text: &str, user: &str, timestamp: &str, index: usize) -> String {
    let digest = Sha256::digest(format!("{}_{}_{}_{}", text, user, timestamp, index).as_bytes());
    let hex = hex::encode(digest);
    format!("msg_{}", &hex[..MESSAGE_ID_HEX_LEN])
}

/// Assign IDs to every message that lacks one.
///
/// Existing non-empty IDs are kept untouched. Returns the number of IDs assigned.
pub fn assign_message_ids(messages: &mut [Message]) -> usize {
    let mut assigned = 0;
    for (index, msg) in messages.iter_mut().enumerate() {
        let missing = msg.message_id.as_deref().map_or(true, str::is_empty);
        if missing {
            msg.message_id = Some(message_id_for(&msg.text, &msg.user, &msg.timestamp, index));
            assigned += 1;
        }
    }
    assigned
}

/// Parse a message timestamp.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (also with a space
/// separator, read as UTC) and decimal epoch seconds as used by Slack `ts`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    parse_epoch_seconds(raw)
}

/// Decimal epoch seconds, parsed digit-wise so sub-second precision is kept.
fn parse_epoch_seconds(raw: &str) -> Option<DateTime<Utc>> {
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let secs: i64 = whole.parse().ok()?;
    let mut digits: String = fraction.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    let nanos: u32 = digits.parse().ok()?;
    DateTime::from_timestamp(secs, nanos)
}

/// Output message with its conversation, topic and tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWithTags {
    pub text: String,
    pub channel: String,
    pub user: String,
    pub timestamp: String,
    pub message_id: String,

    /// Tags of the owning topic
    #[serde(default)]
    pub tags: Vec<String>,

    /// Conversation (level 1) cluster ID
    #[serde(default)]
    pub cluster_id: Option<String>,

    /// Topic (level 2) cluster ID
    #[serde(default)]
    pub topic_id: Option<String>,

    /// Message embedding (only when requested)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MessageWithTags {
    /// Build the output record for a message; tags and cluster IDs start empty.
    pub fn from_message(msg: &Message) -> Self {
        Self {
            text: msg.text.clone(),
            channel: msg.channel_or_unknown().to_string(),
            user: msg.user.clone(),
            timestamp: msg.timestamp.clone(),
            message_id: msg.id().to_string(),
            tags: Vec::new(),
            cluster_id: None,
            topic_id: None,
            embedding: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_id_format() {
        let id = message_id_for("hello", "u1", "2025-01-01T00:00:00Z", 0);
        assert!(id.starts_with("msg_"));
        assert_eq!(id.len(), 4 + MESSAGE_ID_HEX_LEN);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_message_id_depends_on_position() {
        let a = message_id_for("hello", "u1", "2025-01-01T00:00:00Z", 0);
        let b = message_id_for("hello", "u1", "2025-01-01T00:00:00Z", 1);
        assert_ne!(a, b);
        assert_eq!(a, message_id_for("hello", "u1", "2025-01-01T00:00:00Z", 0));
    }

    #[test]
    fn test_assign_keeps_existing_ids() {
        let mut messages = vec![
            Message::new("a", "c", "u", "2025-01-01T00:00:00Z").with_id("keep-me"),
            Message::new("b", "c", "u", "2025-01-01T00:00:01Z"),
            Message::new("c", "c", "u", "2025-01-01T00:00:02Z").with_id(""),
        ];
        let assigned = assign_message_ids(&mut messages);
        assert_eq!(assigned, 2);
        assert_eq!(messages[0].id(), "keep-me");
        assert!(messages[1].id().starts_with("msg_"));
        assert!(messages[2].id().starts_with("msg_"));
    }

    #[test]
    fn test_channel_or_unknown() {
        let mut msg = Message::new("a", "general", "u", "2025-01-01T00:00:00Z");
        assert_eq!(msg.channel_or_unknown(), "general");
        msg.channel = None;
        assert_eq!(msg.channel_or_unknown(), UNKNOWN_CHANNEL);
        msg.channel = Some(String::new());
        assert_eq!(msg.channel_or_unknown(), UNKNOWN_CHANNEL);
    }

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp("2025-11-14T17:00:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 11, 14, 17, 0, 0).unwrap());

        let offset = parse_timestamp("2025-11-14T19:00:00+02:00").unwrap();
        assert_eq!(offset, ts);
    }

    #[test]
    fn test_parse_naive_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 14, 17, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-11-14T17:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-11-14 17:00:00").unwrap(), expected);
        assert!(parse_timestamp("2025-11-14T17:00:00.250").is_some());
    }

    #[test]
    fn test_parse_epoch_seconds() {
        let ts = parse_timestamp("1700000000.000100").unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_micros(), 100);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("NaN").is_none());
        assert!(parse_timestamp("-5").is_none());
    }

    #[test]
    fn test_message_deserialize_without_optional_fields() {
        let json = r#"{"text":"hi","timestamp":"2025-01-01T00:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.channel_or_unknown(), UNKNOWN_CHANNEL);
        assert!(msg.message_id.is_none());
        assert!(msg.user.is_empty());
    }

    #[test]
    fn test_tagged_message_from_message() {
        let mut msg = Message::new("a", "general", "u", "2025-01-01T00:00:00Z");
        msg.channel = None;
        let tagged = MessageWithTags::from_message(&msg.with_id("m1"));
        assert_eq!(tagged.channel, UNKNOWN_CHANNEL);
        assert_eq!(tagged.message_id, "m1");
        assert!(tagged.cluster_id.is_none());
    }
}
