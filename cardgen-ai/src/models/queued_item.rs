//! Offline delivery queue entry

use super::Card;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A card waiting for the store to come back
///
/// Lives in the queue until delivered or until `retry_count` reaches the
/// configured maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedItem {
    pub id: Uuid,
    pub card: Card,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl QueuedItem {
    pub fn new(card: Card) -> Self {
        Self {
            id: Uuid::new_v4(),
            card,
            queued_at: Utc::now(),
            retry_count: 0,
        }
    }
}
