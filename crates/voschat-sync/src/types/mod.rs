pub mod chat;
pub mod envelope;
pub mod file_info;
pub mod message;
pub mod presence;
pub mod response;
pub mod scope;
pub mod user;

pub use chat::{Chat, CreateChatRequest};
pub use envelope::Envelope;
pub use file_info::FileInfo;
pub use message::{DedupKey, Message};
pub use presence::PresenceEvent;
pub use response::ApiResponse;
pub use scope::Scope;
pub use user::User;
