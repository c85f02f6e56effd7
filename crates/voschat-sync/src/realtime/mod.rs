//! Realtime channel: a reconnecting duplex connection carrying JSON frames.

pub mod channel;
pub mod connector;
pub mod event;

pub use channel::RealtimeChannel;
pub use connector::WsConnector;
pub use event::{ChannelEvent, ChannelState, Diagnostic};
