//! Realtime message sync core for VOSChat.
//!
//! - [`client`]: REST access to the chat server and reconnect policy.
//! - [`realtime`]: reconnecting WebSocket channel publishing decoded frames.
//! - [`store`]: ordered, de-duplicated message store with listeners.
//! - [`sync`]: coordinator that keeps a store current for one conversation.

pub mod client;
pub mod error;
pub mod protocol;
pub mod realtime;
pub mod store;
pub mod sync;
pub mod traits;
pub mod types;

pub use client::{ClientConfig, RestClient};
pub use error::{CodecError, Result, SyncError};
pub use realtime::{ChannelEvent, ChannelState, RealtimeChannel};
pub use store::{Delta, LocalId, MessageStore};
pub use sync::SyncCoordinator;
pub use traits::{ChatApi, FrameConnection, FrameConnector, SendReceipt};
pub use types::{Chat, FileInfo, Message, PresenceEvent, Scope, User};
