use crate::types::Message;
use std::fmt;

/// The conversation whose messages share one store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every message visible to this client.
    All,
    /// One-to-one conversation between two users.
    Direct { user: String, peer: String },
    /// Group chat.
    Group { chat_id: String },
}

impl Scope {
    pub fn direct(user: impl Into<String>, peer: impl Into<String>) -> Self {
        Scope::Direct {
            user: user.into(),
            peer: peer.into(),
        }
    }

    pub fn group(chat_id: impl Into<String>) -> Self {
        Scope::Group {
            chat_id: chat_id.into(),
        }
    }

    pub fn contains(&self, msg: &Message) -> bool {
        match self {
            Scope::All => true,
            Scope::Direct { user, peer } => {
                msg.chat_id.is_none()
                    && ((msg.from == *user && msg.to == *peer)
                        || (msg.from == *peer && msg.to == *user))
            }
            Scope::Group { chat_id } => msg.chat_id.as_deref() == Some(chat_id.as_str()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Direct { user, peer } => write!(f, "direct:{}<->{}", user, peer),
            Scope::Group { chat_id } => write!(f, "group:{}", chat_id),
        }
    }
}
