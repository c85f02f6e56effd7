//! Coordination of history fetch, live events and local edits.

pub mod coordinator;

pub use coordinator::{SyncCoordinator, DEFAULT_FILE_CONTENT};
