use crate::error::{Result, SyncError};
use crate::types::{Chat, FileInfo, Message};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Sink, Stream};
use std::pin::Pin;

/// Server acknowledgement of `POST /messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// The stored copy, when the server echoes it back.
    pub message: Option<Message>,
}

/// Abstraction for the REST operations of the chat server.
///
/// Calls carry no shared mutable state; each returned future is an
/// independent request and dropping it cancels the request.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    async fn list_messages(&self) -> Result<Vec<Message>>;
    async fn list_messages_between(&self, user_a: &str, user_b: &str) -> Result<Vec<Message>>;
    async fn send_message(&self, message: &Message) -> Result<SendReceipt>;
    async fn delete_message(&self, id: &str) -> Result<()>;
    async fn upload_file(&self, data: Bytes, filename: &str) -> Result<FileInfo>;
    async fn create_chat(&self, name: &str, members: &[String]) -> Result<Chat>;
    async fn download_file(&self, file: &FileInfo) -> Result<Bytes>;
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = SyncError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One open duplex connection carrying JSON text frames.
///
/// The stream ends when the peer closes; an `Err` item reports a
/// transport failure and is followed by the end of the stream.
pub struct FrameConnection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Abstraction for opening realtime connections.
#[async_trait]
pub trait FrameConnector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<FrameConnection>;
}
