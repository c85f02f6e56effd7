use crate::types::message::parse_stamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered chat user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created: String,
    pub last_seen: String,
}

impl User {
    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        parse_stamp(&self.last_seen).map(|dt| dt.with_timezone(&Utc))
    }
}
