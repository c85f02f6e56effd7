//! Chat message record.

use crate::types::FileInfo;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message as exchanged over REST and the realtime channel.
///
/// `id` and `timestamp` are assigned by the server; a message built
/// locally carries neither until it is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub from: String,
    /// Recipient user id, or the chat id for group conversations.
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfo>,
}

impl Message {
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            from: from.into(),
            to: to.into(),
            timestamp: None,
            chat_id: None,
            file_info: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Stamp the message with the current time in RFC 3339.
    pub fn stamped_now(self) -> Self {
        self.with_timestamp(Utc::now().to_rfc3339())
    }

    pub fn with_chat(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_file(mut self, file_info: FileInfo) -> Self {
        self.file_info = Some(file_info);
        self
    }

    /// The conversation target: chat id for group messages, otherwise the recipient.
    #[inline]
    pub fn target(&self) -> &str {
        self.chat_id.as_deref().unwrap_or(&self.to)
    }

    pub fn timestamp_instant(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(parse_stamp)
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Wall-clock `HH:MM` in the offset the server sent, empty when unknown.
    pub fn formatted_time(&self) -> String {
        self.timestamp
            .as_deref()
            .and_then(parse_stamp)
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_default()
    }

    /// Key used to recognise the same logical message arriving by different paths.
    pub fn dedup_key(&self) -> DedupKey {
        match &self.id {
            Some(id) => DedupKey::Id(id.clone()),
            None => DedupKey::Composite {
                from: self.from.clone(),
                target: self.target().to_string(),
                timestamp: self.timestamp.clone(),
                content: self.content.clone(),
            },
        }
    }

    /// Whether `other` looks like the server copy of this not-yet-acknowledged message.
    pub(crate) fn echoes(&self, other: &Message) -> bool {
        self.from == other.from
            && self.target() == other.target()
            && self.content == other.content
            && self.file_info.as_ref().map(|f| f.id()) == other.file_info.as_ref().map(|f| f.id())
    }
}

/// ISO-8601 date-time. Stamps without an offset are taken as UTC.
pub(crate) fn parse_stamp(ts: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(ts, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Id(String),
    Composite {
        from: String,
        target: String,
        timestamp: Option<String>,
        content: String,
    },
}
