//! Conversation grouping.
//!
//! Partitions messages into conversations: runs of messages in the same
//! channel with no gap between consecutive timestamps larger than the
//! configured threshold.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use clustergraph_types::{parse_timestamp, Message, TimestampPolicy};

use crate::error::TopicsError;

/// Result of grouping messages into conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationGrouping {
    /// Conversation index -> message indices, in (channel, timestamp) order
    pub conversations: Vec<Vec<usize>>,
    /// Indices of messages whose timestamp was replaced by the wall clock
    pub substituted_timestamps: Vec<usize>,
}

impl ConversationGrouping {
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Total number of grouped messages.
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(Vec::len).sum()
    }
}

/// Splits a message list into conversations by channel and time gap.
#[derive(Debug, Clone)]
pub struct ConversationGrouper {
    gap: Duration,
    policy: TimestampPolicy,
}

impl ConversationGrouper {
    /// Create a grouper with a gap threshold in seconds.
    pub fn new(gap_secs: i64, policy: TimestampPolicy) -> Self {
        Self {
            gap: Duration::try_seconds(gap_secs).unwrap_or(Duration::MAX),
            policy,
        }
    }

    /// Group messages.
    ///
    /// `now` is only used under `TimestampPolicy::WallClock`, as the
    /// substitute for unparsable timestamps.
    pub fn group(
        &self,
        messages: &[Message],
        now: DateTime<Utc>,
    ) -> Result<ConversationGrouping, TopicsError> {
        let mut substituted = Vec::new();
        let mut keyed: Vec<(&str, DateTime<Utc>, usize)> = Vec::with_capacity(messages.len());

        for (index, msg) in messages.iter().enumerate() {
            let ts = match parse_timestamp(&msg.timestamp) {
                Some(ts) => ts,
                None => match self.policy {
                    TimestampPolicy::Reject => {
                        return Err(TopicsError::InvalidTimestamp {
                            index,
                            value: msg.timestamp.clone(),
                        });
                    }
                    TimestampPolicy::WallClock => {
                        warn!(
                            index,
                            value = %msg.timestamp,
                            "Unparsable timestamp, substituting wall-clock time"
                        );
                        substituted.push(index);
                        now
                    }
                },
            };
            keyed.push((msg.channel_or_unknown(), ts, index));
        }

        // Stable: equal (channel, time) keep input order
        keyed.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));

        let mut conversations: Vec<Vec<usize>> = Vec::new();
        let mut previous: Option<(&str, DateTime<Utc>)> = None;

        for (channel, ts, index) in keyed {
            let boundary = match previous {
                None => true,
                Some((prev_channel, prev_ts)) => {
                    let gap = ts - prev_ts;
                    if prev_channel != channel {
                        trace!(index, channel, "Channel boundary");
                        true
                    } else if gap > self.gap {
                        trace!(index, %gap, threshold = %self.gap, "Time gap boundary");
                        true
                    } else {
                        false
                    }
                }
            };

            if boundary {
                conversations.push(vec![index]);
            } else if let Some(current) = conversations.last_mut() {
                current.push(index);
            }
            previous = Some((channel, ts));
        }

        debug!(
            messages = messages.len(),
            conversations = conversations.len(),
            substituted = substituted.len(),
            "Grouped messages into conversations"
        );

        Ok(ConversationGrouping {
            conversations,
            substituted_timestamps: substituted,
        })
    }
}
