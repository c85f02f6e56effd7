//! Stored entries and their ordering key.

use crate::types::Message;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Handle for a message inserted before the server acknowledged it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(Uuid);

impl LocalId {
    pub(crate) fn new() -> Self {
        LocalId(Uuid::new_v4())
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

/// Position of a timestamp in the store order.
///
/// Variant order is significant: stamps that are not ISO-8601 sort
/// lexically ahead of parsed instants, and entries without a stamp trail
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum TimeKey {
    Unparsed(String),
    At(DateTime<Utc>),
    Missing,
}

impl TimeKey {
    pub(crate) fn of(message: &Message) -> Self {
        match (&message.timestamp, message.timestamp_instant()) {
            (_, Some(instant)) => TimeKey::At(instant),
            (Some(raw), None) => TimeKey::Unparsed(raw.clone()),
            (None, None) => TimeKey::Missing,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) message: Message,
    /// Arrival counter; breaks ties between equal timestamps.
    pub(crate) seq: u64,
    pub(crate) time: TimeKey,
    pub(crate) local: Option<LocalId>,
    /// Inserted locally and not yet confirmed by the server.
    pub(crate) pending: bool,
}

impl Entry {
    pub(crate) fn new(message: Message, seq: u64) -> Self {
        Entry {
            time: TimeKey::of(&message),
            message,
            seq,
            local: None,
            pending: false,
        }
    }

    pub(crate) fn pending(message: Message, seq: u64, local: LocalId) -> Self {
        Entry {
            local: Some(local),
            pending: true,
            ..Entry::new(message, seq)
        }
    }

    /// Swap in a newer copy of the same message, keeping arrival position.
    pub(crate) fn replace(&mut self, message: Message) -> bool {
        if self.message == message {
            return false;
        }
        self.time = TimeKey::of(&message);
        self.message = message;
        true
    }

    /// Sent from here and not yet matched with the server's stored copy.
    pub(crate) fn awaiting_server_copy(&self) -> bool {
        self.local.is_some() && self.message.id.is_none()
    }

    pub(crate) fn has_id(&self, id: &str) -> bool {
        self.message.id.as_deref() == Some(id)
    }

    pub(crate) fn cmp_order(&self, other: &Entry) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}
