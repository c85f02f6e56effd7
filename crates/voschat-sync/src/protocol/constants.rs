//! Protocol constants for the chat server API.
//!
//! # Organization
//!
//! ```text
//! constants/
//! ├── paths        - REST endpoint suffixes, relative to the API base
//! ├── frames       - realtime frame discriminator values
//! └── upload       - multipart upload shape
//! ```
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/messages` | Full history |
//! | POST | `/messages` | Send a message |
//! | DELETE | `/messages/{id}` | Delete a message |
//! | GET | `/messages/between/{a}/{b}` | One-to-one history |
//! | POST | `/files` | Multipart upload |
//! | POST | `/chats` | Create a chat |
//!
//! The realtime channel lives at `/ws` on the same host and carries text
//! frames only.

/// HTTP 404, mapped to `SyncError::NotFound`.
pub const STATUS_NOT_FOUND: u16 = 404;

/// REST endpoint suffixes.
pub mod paths {
    pub const MESSAGES: &str = "messages";
    pub const MESSAGES_BETWEEN: &str = "messages/between";
    pub const FILES: &str = "files";
    pub const CHATS: &str = "chats";
    pub const WEBSOCKET: &str = "ws";
}

/// Values of the `type` field on realtime frames.
pub mod frames {
    /// JSON field that discriminates frame kinds.
    pub const TYPE_FIELD: &str = "type";
    /// Explicit tag for message frames. Untagged frames are messages too.
    pub const MESSAGE: &str = "message";
    /// Tag sent by the server on presence updates.
    pub const STATUS: &str = "status";
}

/// Multipart upload shape for `POST /files`.
pub mod upload {
    pub const PART_NAME: &str = "file";
    pub const PART_CONTENT_TYPE: &str = "application/octet-stream";
}

pub const CONTENT_TYPE_JSON: &str = "application/json";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_relative() {
        for path in [
            paths::MESSAGES,
            paths::MESSAGES_BETWEEN,
            paths::FILES,
            paths::CHATS,
            paths::WEBSOCKET,
        ] {
            assert!(!path.starts_with('/'), "{} must be relative", path);
        }
    }
}
