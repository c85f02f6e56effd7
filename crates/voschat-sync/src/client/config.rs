//! Configuration for the chat client.

use crate::client::retry::BackoffConfig;
use std::time::Duration;

/// Configuration for the REST client and the realtime channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// API base, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    /// Realtime endpoint, e.g. `ws://localhost:8080/ws`.
    pub ws_url: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// TCP/TLS connect timeout in milliseconds, also bounds the WebSocket handshake.
    pub connect_timeout_ms: u64,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Reconnect policy for the realtime channel.
    pub reconnect: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://localhost:8080/api".to_string(),
            ws_url: "ws://localhost:8080/ws".to_string(),
            request_timeout_ms: 30000,
            connect_timeout_ms: 10000,
            user_agent: concat!("voschat-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            reconnect: BackoffConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: BackoffConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
