use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::section::SectionPayload;

/// An update accepted while the session was invalid, waiting for replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub id: Uuid,
    /// Store-local enqueue counter; breaks ties between equal timestamps.
    pub sequence: u64,
    pub queued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub payload: SectionPayload,
}

impl PendingUpdate {
    pub fn new(sequence: u64, source: Option<String>, payload: SectionPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            queued_at: Utc::now(),
            source,
            payload,
        }
    }

    /// Replay order: oldest first, then by enqueue sequence.
    pub fn replay_order(a: &Self, b: &Self) -> Ordering {
        a.queued_at
            .cmp(&b.queued_at)
            .then(a.sequence.cmp(&b.sequence))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::Map;

    use super::*;

    fn at(sequence: u64, secs: i64) -> PendingUpdate {
        let mut update = PendingUpdate::new(sequence, None, SectionPayload::Meta(Map::new()));
        update.queued_at = Utc.timestamp_opt(secs, 0).unwrap();
        update
    }

    #[test]
    fn replay_order_is_time_then_sequence() {
        let mut queue = vec![at(3, 10), at(2, 10), at(1, 20), at(0, 5)];
        queue.sort_by(PendingUpdate::replay_order);
        let order: Vec<u64> = queue.iter().map(|u| u.sequence).collect();
        assert_eq!(order, vec![0, 2, 3, 1]);
    }

    #[test]
    fn source_is_omitted_when_absent() {
        let update = at(1, 0);
        let value = serde_json::to_value(&update).unwrap();
        assert!(value.get("source").is_none());
        let back: PendingUpdate = serde_json::from_value(value).unwrap();
        assert_eq!(back, update);
    }
}
