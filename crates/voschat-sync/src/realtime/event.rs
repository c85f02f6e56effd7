//! Events published by the realtime channel.

use crate::error::SyncError;
use crate::types::{Message, PresenceEvent};
use std::fmt;

/// Connection state of a [`RealtimeChannel`](super::RealtimeChannel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal. Reached only through `close()`.
    Closed,
}

impl ChannelState {
    #[inline]
    pub fn is_connected(self) -> bool {
        self == ChannelState::Connected
    }

    #[inline]
    pub fn is_closed(self) -> bool {
        self == ChannelState::Closed
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Non-fatal problems the channel reports without changing state by itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A frame that could not be decoded; the connection stays open.
    MalformedFrame { frame: String, reason: String },
    /// An outbound frame was not delivered.
    SendFailed { reason: String },
    /// A connection attempt failed; `attempt` counts from 1 since the last open.
    ConnectFailed { attempt: u32, error: String },
    /// An open connection ended.
    ConnectionLost { reason: String },
}

impl Diagnostic {
    pub fn as_error(&self) -> SyncError {
        match self {
            Diagnostic::MalformedFrame { reason, .. } => SyncError::MalformedFrame(reason.clone()),
            Diagnostic::SendFailed { reason } => SyncError::Network(reason.clone()),
            Diagnostic::ConnectFailed { error, .. } => SyncError::Network(error.clone()),
            Diagnostic::ConnectionLost { reason } => SyncError::Network(reason.clone()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedFrame { frame, reason } => {
                write!(f, "malformed frame ({}): {}", reason, frame)
            }
            Diagnostic::SendFailed { reason } => write!(f, "send failed: {}", reason),
            Diagnostic::ConnectFailed { attempt, error } => {
                write!(f, "connect attempt {} failed: {}", attempt, error)
            }
            Diagnostic::ConnectionLost { reason } => write!(f, "connection lost: {}", reason),
        }
    }
}

/// Everything a channel subscriber can observe, in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(Message),
    Presence(PresenceEvent),
    State(ChannelState),
    Diagnostic(Diagnostic),
}
