use serde::{Deserialize, Serialize};

/// A one-to-one or group conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub name: String,
    /// Member user ids; order carries no meaning.
    pub members: Vec<String>,
    pub is_group: bool,
    pub created: String,
}

impl Chat {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

/// Body of `POST /chats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChatRequest {
    pub name: String,
    pub members: Vec<String>,
}
