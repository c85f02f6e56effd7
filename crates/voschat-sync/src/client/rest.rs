//! REST client for the chat server API.

use crate::client::config::ClientConfig;
use crate::client::utils::{endpoint, endpoint_with_id, parse_base_url, resolve_file_url};
use crate::error::{Result, SyncError};
use crate::protocol::constants::{paths, upload, STATUS_NOT_FOUND};
use crate::protocol::{decode_response, WireRecord};
use crate::traits::{ChatApi, SendReceipt};
use crate::types::{ApiResponse, Chat, CreateChatRequest, FileInfo, Message};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// reqwest-backed implementation of [`ChatApi`].
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base: Url,
    config: Arc<ClientConfig>,
}

/// Raw outcome of one request.
struct RawResponse {
    status: u16,
    body: Bytes,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl RestClient {
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Self::with_client(http, config)
    }

    pub fn with_client(http: Client, config: ClientConfig) -> Result<Self> {
        let base = parse_base_url(&config.base_url)?;
        Ok(RestClient {
            http,
            base,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<RawResponse> {
        debug!("[REST-Out] {} {}", method, url);
        let request = build(self.http.request(method.clone(), url.clone()));
        let response = request.send().await.map_err(|e| {
            warn!("[REST] {} {} failed: {}", method, url, e);
            SyncError::Network(e.to_string())
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        debug!("[REST-In] {} {} -> {} ({} bytes)", method, url, status, body.len());
        Ok(RawResponse { status, body })
    }

    /// Map status and body onto the response envelope.
    fn interpret<T: WireRecord>(raw: RawResponse, what: &str) -> Result<ApiResponse<T>> {
        if raw.status == STATUS_NOT_FOUND {
            return Err(SyncError::NotFound(what.to_string()));
        }

        if raw.is_success() {
            return Ok(decode_response::<T>(&raw.body)?);
        }

        // Error statuses may still carry a failure envelope with a message.
        match decode_response::<Value>(&raw.body) {
            Ok(envelope) if !envelope.success => Err(SyncError::Server(
                envelope
                    .error
                    .unwrap_or_else(|| format!("HTTP {} for {}", raw.status, what)),
            )),
            _ => Err(SyncError::Server(format!(
                "HTTP {} for {}: {}",
                raw.status,
                what,
                String::from_utf8_lossy(&raw.body)
            ))),
        }
    }

    async fn fetch_messages(&self, url: Url, what: &str) -> Result<Vec<Message>> {
        let raw = self.execute(Method::GET, url, |r| r).await?;
        Self::interpret::<Vec<Message>>(raw, what)?.into_data("Vec<Message>")
    }
}

/// Multipart body for `POST /files`: one `file` part, octet-stream.
pub fn upload_form(data: Bytes, filename: &str) -> Result<Form> {
    let part = Part::bytes(data.to_vec())
        .file_name(filename.to_string())
        .mime_str(upload::PART_CONTENT_TYPE)
        .map_err(|e| SyncError::Config(e.to_string()))?;
    Ok(Form::new().part(upload::PART_NAME, part))
}

#[async_trait]
impl ChatApi for RestClient {
    async fn list_messages(&self) -> Result<Vec<Message>> {
        let url = endpoint(&self.base, &[paths::MESSAGES])?;
        self.fetch_messages(url, "messages").await
    }

    async fn list_messages_between(&self, user_a: &str, user_b: &str) -> Result<Vec<Message>> {
        let mut url = endpoint(&self.base, &[paths::MESSAGES_BETWEEN])?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Config(format!("{} cannot be a base URL", self.base)))?
            .push(user_a)
            .push(user_b);
        self.fetch_messages(url, &format!("messages between {} and {}", user_a, user_b))
            .await
    }

    async fn send_message(&self, message: &Message) -> Result<SendReceipt> {
        let url = endpoint(&self.base, &[paths::MESSAGES])?;
        let raw = self
            .execute(Method::POST, url, |r| r.json(message))
            .await?;
        if raw.is_success() && raw.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(SendReceipt::default());
        }
        let echoed = Self::interpret::<Message>(raw, "message")?.into_optional()?;
        Ok(SendReceipt { message: echoed })
    }

    async fn delete_message(&self, id: &str) -> Result<()> {
        let url = endpoint_with_id(&self.base, paths::MESSAGES, id)?;
        let raw = self.execute(Method::DELETE, url, |r| r).await?;
        if raw.is_success() && raw.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        Self::interpret::<Value>(raw, &format!("message {}", id))?.into_optional()?;
        Ok(())
    }

    async fn upload_file(&self, data: Bytes, filename: &str) -> Result<FileInfo> {
        let url = endpoint(&self.base, &[paths::FILES])?;
        let form = upload_form(data, filename)?;
        let raw = self
            .execute(Method::POST, url, |r| r.multipart(form))
            .await?;
        Self::interpret::<FileInfo>(raw, "file upload")?.into_data("FileInfo")
    }

    async fn create_chat(&self, name: &str, members: &[String]) -> Result<Chat> {
        let url = endpoint(&self.base, &[paths::CHATS])?;
        let request = CreateChatRequest {
            name: name.to_string(),
            members: members.to_vec(),
        };
        let raw = self
            .execute(Method::POST, url, |r| r.json(&request))
            .await?;
        Self::interpret::<Chat>(raw, "chat")?.into_data("Chat")
    }

    async fn download_file(&self, file: &FileInfo) -> Result<Bytes> {
        let url = resolve_file_url(&self.base, file.file_url())?;
        let raw = self.execute(Method::GET, url, |r| r).await?;
        if raw.status == STATUS_NOT_FOUND {
            return Err(SyncError::NotFound(format!("file {}", file.id())));
        }
        if !raw.is_success() {
            return Err(SyncError::Server(format!(
                "HTTP {} downloading {}",
                raw.status,
                file.file_name()
            )));
        }
        Ok(raw.body)
    }
}
