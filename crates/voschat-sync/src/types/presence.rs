use crate::types::message::parse_stamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Online/offline notification for a user. Forwarded to subscribers, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: String,
    pub online: bool,
    pub last_seen: String,
}

impl PresenceEvent {
    pub const STATUS: &'static str = "status";

    pub fn status(user_id: impl Into<String>, online: bool, last_seen: impl Into<String>) -> Self {
        Self {
            kind: Self::STATUS.to_string(),
            user_id: user_id.into(),
            online,
            last_seen: last_seen.into(),
        }
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        parse_stamp(&self.last_seen).map(|dt| dt.with_timezone(&Utc))
    }
}
