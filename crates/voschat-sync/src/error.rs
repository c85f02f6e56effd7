//! Error types for the sync core.

use thiserror::Error;

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failure to map a wire payload onto a typed record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid JSON for {kind}: {reason}")]
    Structure { kind: &'static str, reason: String },

    #[error("invalid {kind}: {reason}")]
    Invalid { kind: &'static str, reason: String },

    #[error("failed to encode {kind}: {reason}")]
    Encode { kind: &'static str, reason: String },
}

/// Errors that can occur while talking to the chat server or syncing state.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SyncError {
    /// Whether a caller-driven retry has a chance of succeeding.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_is_retryable() {
        assert!(SyncError::Network("reset".into()).is_retryable());
        assert!(!SyncError::Server("nope".into()).is_retryable());
        assert!(!SyncError::ChannelClosed.is_retryable());
    }

    #[test]
    fn test_codec_error_converts_to_decode() {
        let err: SyncError = CodecError::Invalid {
            kind: "Message",
            reason: "empty sender".into(),
        }
        .into();
        assert!(matches!(err, SyncError::Decode(_)));
        assert_eq!(err.to_string(), "Decode error: invalid Message: empty sender");
    }

    #[test]
    fn test_not_found_display() {
        let err = SyncError::NotFound("message missing-id".into());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: message missing-id");
    }
}
