//! Wire codec for records exchanged with the chat server.
//!
//! Field names are fixed by the serde attributes on the record types.
//! Decoding is all-or-nothing: a structural error or a failed
//! [`WireRecord::validate`] rejects the whole payload.

use crate::error::CodecError;
use crate::protocol::constants::frames;
use crate::types::{
    ApiResponse, Chat, CreateChatRequest, Envelope, FileInfo, Message, PresenceEvent, User,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

type CodecResult<T> = std::result::Result<T, CodecError>;

/// A record with a fixed wire schema.
pub trait WireRecord: Serialize + DeserializeOwned {
    const KIND: &'static str;

    /// Semantic checks serde cannot express.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

fn require(field: &str, value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("`{}` must not be empty", field))
    } else {
        Ok(())
    }
}

impl WireRecord for Message {
    const KIND: &'static str = "Message";

    fn validate(&self) -> std::result::Result<(), String> {
        require("from", &self.from)?;
        if let Some(id) = &self.id {
            require("id", id)?;
        }
        if let Some(file) = &self.file_info {
            file.validate()?;
        }
        Ok(())
    }
}

impl WireRecord for FileInfo {
    const KIND: &'static str = "FileInfo";

    fn validate(&self) -> std::result::Result<(), String> {
        require("id", self.id())?;
        require("file_url", self.file_url())
    }
}

impl WireRecord for User {
    const KIND: &'static str = "User";

    fn validate(&self) -> std::result::Result<(), String> {
        require("id", &self.id)
    }
}

impl WireRecord for Chat {
    const KIND: &'static str = "Chat";

    fn validate(&self) -> std::result::Result<(), String> {
        require("id", &self.id)
    }
}

impl WireRecord for CreateChatRequest {
    const KIND: &'static str = "CreateChatRequest";

    fn validate(&self) -> std::result::Result<(), String> {
        require("name", &self.name)
    }
}

impl WireRecord for PresenceEvent {
    const KIND: &'static str = "UserStatus";

    fn validate(&self) -> std::result::Result<(), String> {
        require("type", &self.kind)?;
        require("user_id", &self.user_id)
    }
}

/// Untyped payload, for acknowledgements whose `data` is not inspected.
impl WireRecord for Value {
    const KIND: &'static str = "value";
}

impl<T: WireRecord> WireRecord for Vec<T> {
    const KIND: &'static str = "list";

    fn validate(&self) -> std::result::Result<(), String> {
        self.iter().enumerate().try_for_each(|(i, item)| {
            item.validate()
                .map_err(|reason| format!("{}[{}]: {}", T::KIND, i, reason))
        })
    }
}

fn checked<T: WireRecord>(record: T) -> CodecResult<T> {
    record
        .validate()
        .map_err(|reason| CodecError::Invalid {
            kind: T::KIND,
            reason,
        })?;
    Ok(record)
}

/// Serialize a record to its JSON wire form.
pub fn encode<T: WireRecord>(record: &T) -> CodecResult<Bytes> {
    serde_json::to_vec(record)
        .map(Bytes::from)
        .map_err(|e| CodecError::Encode {
            kind: T::KIND,
            reason: e.to_string(),
        })
}

/// Serialize a record to a JSON text frame.
pub fn encode_text<T: WireRecord>(record: &T) -> CodecResult<String> {
    serde_json::to_string(record).map_err(|e| CodecError::Encode {
        kind: T::KIND,
        reason: e.to_string(),
    })
}

/// Decode a record; the record kind is selected by `T`.
pub fn decode<T: WireRecord>(bytes: &[u8]) -> CodecResult<T> {
    let record: T = serde_json::from_slice(bytes).map_err(|e| CodecError::Structure {
        kind: T::KIND,
        reason: e.to_string(),
    })?;
    checked(record)
}

/// Decode a `{success, data?, error?}` response whose payload is a `T`.
pub fn decode_response<T: WireRecord>(bytes: &[u8]) -> CodecResult<ApiResponse<T>> {
    let response: ApiResponse<T> =
        serde_json::from_slice(bytes).map_err(|e| CodecError::Structure {
            kind: T::KIND,
            reason: e.to_string(),
        })?;
    if let Some(data) = &response.data {
        data.validate().map_err(|reason| CodecError::Invalid {
            kind: T::KIND,
            reason,
        })?;
    }
    Ok(response)
}

/// Decode a realtime text frame.
///
/// A `type` field other than `"message"` selects the presence schema;
/// frames without one are messages.
pub fn decode_frame(text: &str) -> CodecResult<Envelope> {
    let value: Value = serde_json::from_str(text).map_err(|e| CodecError::Structure {
        kind: "frame",
        reason: e.to_string(),
    })?;
    let Value::Object(fields) = &value else {
        return Err(CodecError::Structure {
            kind: "frame",
            reason: "frame is not a JSON object".to_string(),
        });
    };

    let is_presence = match fields.get(frames::TYPE_FIELD) {
        None | Some(Value::Null) => false,
        Some(Value::String(tag)) => tag != frames::MESSAGE,
        Some(other) => {
            return Err(CodecError::Invalid {
                kind: "frame",
                reason: format!("`type` must be a string, got {}", other),
            })
        }
    };

    if is_presence {
        from_value::<PresenceEvent>(value).map(Envelope::Presence)
    } else {
        from_value::<Message>(value).map(Envelope::Message)
    }
}

fn from_value<T: WireRecord>(value: Value) -> CodecResult<T> {
    let record: T = serde_json::from_value(value).map_err(|e| CodecError::Structure {
        kind: T::KIND,
        reason: e.to_string(),
    })?;
    checked(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_field_mapping() {
        let msg = Message::new("a", "b", "hi")
            .with_chat("room-1")
            .with_file(FileInfo::new("f1", "cat.png", 1024, "image/png", "/files/f1"));
        let json: Value = serde_json::from_slice(&encode(&msg).unwrap()).unwrap();
        assert_eq!(json["chat_id"], "room-1");
        assert_eq!(json["file_info"]["file_name"], "cat.png");
        assert_eq!(json["file_info"]["file_size"], 1024);
        assert!(json.get("id").is_none());
        assert!(json.get("timestamp").is_none());
        assert!(json.get("chatId").is_none());
    }

    #[test]
    fn test_decode_user() {
        let user: User = decode(
            br#"{"id":"1","username":"vos","created":"2024-01-01T00:00:00Z","last_seen":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(user.username, "vos");
        assert!(user.last_seen_at().is_some());
    }

    #[test]
    fn test_decode_chat() {
        let chat: Chat = decode(
            br#"{"id":"c1","name":"team","members":["b","a"],"is_group":true,"created":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(chat.is_group);
        assert!(chat.has_member("a"));
    }

    #[test]
    fn test_missing_required_field_rejects_payload() {
        let err = decode::<Message>(br#"{"content":"hi","from":"a"}"#).unwrap_err();
        assert!(matches!(err, CodecError::Structure { kind: "Message", .. }));
    }

    #[test]
    fn test_nested_invalid_file_rejects_message() {
        let err = decode::<Message>(
            br#"{"content":"x","from":"a","to":"b","file_info":{"id":"","file_name":"n","file_size":1,"file_type":"t","file_url":"u"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::Invalid { kind: "Message", .. }));
    }

    #[test]
    fn test_list_rejects_whole_payload_on_one_bad_item() {
        let err = decode::<Vec<Message>>(
            br#"[{"content":"ok","from":"a","to":"b"},{"content":"bad","from":"","to":"b"}]"#,
        )
        .unwrap_err();
        match err {
            CodecError::Invalid { reason, .. } => assert!(reason.contains("Message[1]")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let msg: Message =
            decode(br#"{"content":"hi","from":"a","to":"b","edited":false}"#).unwrap();
        assert_eq!(msg.content, "hi");
    }

    #[test]
    fn test_decode_response_validates_data() {
        let err = decode_response::<FileInfo>(
            br#"{"success":true,"data":{"id":"f","file_name":"n","file_size":1,"file_type":"t","file_url":""}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::Invalid { kind: "FileInfo", .. }));

        let resp =
            decode_response::<Vec<Message>>(br#"{"success":false,"error":"boom"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_frame_with_status_tag_is_presence() {
        let env = decode_frame(
            r#"{"type":"status","user_id":"7","online":true,"last_seen":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            env,
            Envelope::Presence(PresenceEvent::status("7", true, "2024-05-01T10:00:00Z"))
        );
    }

    #[test]
    fn test_untagged_frame_is_message() {
        let env = decode_frame(r#"{"id":"1","content":"hi","from":"a","to":"b"}"#).unwrap();
        assert!(matches!(env, Envelope::Message(m) if m.id.as_deref() == Some("1")));
    }

    #[test]
    fn test_explicit_message_tag() {
        let env =
            decode_frame(r#"{"type":"message","content":"hi","from":"a","to":"b"}"#).unwrap();
        assert!(matches!(env, Envelope::Message(_)));
    }

    #[test]
    fn test_tagged_frame_is_not_retried_as_message() {
        // Tagged as presence but shaped like a message: rejected, not reinterpreted.
        let err = decode_frame(r#"{"type":"status","content":"hi","from":"a","to":"b"}"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::Structure { kind: "UserStatus", .. }));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame("[1,2]").is_err());
        assert!(decode_frame(r#"{"type":5}"#).is_err());
    }

    #[test]
    fn test_file_info_survives_encode_decode() {
        let info = FileInfo::new("f9", "report.pdf", 52_133, "application/pdf", "/files/f9");
        let back: FileInfo = decode(&encode(&info).unwrap()).unwrap();
        assert_eq!(back, info);
    }
}
