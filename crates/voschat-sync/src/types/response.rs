//! Generic `{success, data?, error?}` response envelope.

use crate::error::{CodecError, Result, SyncError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Payload of a successful response; `data` is required.
    pub fn into_data(self, kind: &'static str) -> Result<T> {
        match self.into_optional()? {
            Some(data) => Ok(data),
            None => Err(SyncError::Decode(CodecError::Invalid {
                kind,
                reason: "successful response without data".to_string(),
            })),
        }
    }

    /// Payload of a successful response when the server may omit it.
    pub fn into_optional(self) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(SyncError::Server(
                self.error
                    .unwrap_or_else(|| "request failed without an error message".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_server_message() {
        let resp: ApiResponse<u32> = ApiResponse::failure("chat name taken");
        match resp.into_data("Chat") {
            Err(SyncError::Server(msg)) => assert_eq!(msg, "chat name taken"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_data_is_decode_error() {
        let resp: ApiResponse<u32> = ApiResponse {
            success: true,
            data: None,
            error: None,
        };
        assert!(matches!(resp.into_data("FileInfo"), Err(SyncError::Decode(_))));
    }

    #[test]
    fn test_optional_data() {
        let resp: ApiResponse<u32> = ApiResponse {
            success: true,
            data: None,
            error: None,
        };
        assert_eq!(resp.into_optional().unwrap(), None);
        assert_eq!(ApiResponse::ok(7).into_optional().unwrap(), Some(7));
    }
}
