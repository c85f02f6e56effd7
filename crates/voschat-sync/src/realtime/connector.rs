//! WebSocket transport for the realtime channel.

use crate::error::{Result, SyncError};
use crate::traits::{FrameConnection, FrameConnector};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

/// [`FrameConnector`] over tokio-tungstenite. Only text frames are surfaced.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl FrameConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<FrameConnection> {
        debug!("[WS] connecting to {}", url);
        let (ws, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                SyncError::Network(format!(
                    "connect to {} timed out after {:?}",
                    url, self.connect_timeout
                ))
            })??;

        let (write, read) = ws.split();
        let sink = write
            .sink_map_err(SyncError::from)
            .with(|text: String| async move { Ok::<_, SyncError>(WsMessage::Text(text)) });
        let stream = read.filter_map(|item| async move {
            match item {
                Ok(WsMessage::Text(text)) => Some(Ok(text)),
                Ok(WsMessage::Binary(data)) => {
                    debug!("[WS-In] ignoring binary frame ({} bytes)", data.len());
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(SyncError::from(e))),
            }
        });

        Ok(FrameConnection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
