//! In-memory message store for one conversation.

mod entry;
pub mod message_store;

pub use entry::LocalId;
pub use message_store::{Delta, MessageStore, Subscription};
