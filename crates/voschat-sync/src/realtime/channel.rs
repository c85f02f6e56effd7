//! Realtime channel with an explicit reconnect state machine.
//!
//! A single driver task owns the connection: it connects, pumps inbound
//! frames to subscribers in receipt order, writes queued outbound frames,
//! and sleeps out the backoff delay between attempts. `close()` is the only
//! way out and cancels whatever the driver is waiting on.

use crate::client::{truncate_for_log, Backoff, BackoffConfig, ClientConfig};
use crate::error::{Result, SyncError};
use crate::protocol::{decode_frame, encode_text};
use crate::realtime::connector::WsConnector;
use crate::realtime::event::{ChannelEvent, ChannelState, Diagnostic};
use crate::traits::{FrameConnection, FrameConnector};
use crate::types::{Envelope, Message};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LOG_FRAME_CHARS: usize = 256;
const SINK_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle to the realtime connection. Dropping it closes the channel.
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    url: String,
    connector: Arc<dyn FrameConnector>,
    backoff: BackoffConfig,
    state_tx: watch::Sender<ChannelState>,
    close_tx: watch::Sender<bool>,
    subscribers: Mutex<Vec<async_channel::Sender<ChannelEvent>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

enum PumpExit {
    Closed,
    Lost(String),
}

impl RealtimeChannel {
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn FrameConnector>,
        backoff: BackoffConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let (close_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ChannelInner {
                url: url.into(),
                connector,
                backoff,
                state_tx,
                close_tx,
                subscribers: Mutex::new(Vec::new()),
                outbound: Mutex::new(None),
                driver: Mutex::new(None),
            }),
        }
    }

    /// WebSocket channel for `config.ws_url`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.ws_url.clone(),
            Arc::new(WsConnector::new(config.connect_timeout())),
            config.reconnect.clone(),
        )
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive every event published from now on.
    ///
    /// The receiver ends once the channel is closed.
    pub fn subscribe(&self) -> async_channel::Receiver<ChannelEvent> {
        let (tx, rx) = async_channel::unbounded();
        if !self.state().is_closed() {
            self.inner.subscribers.lock().push(tx);
        }
        rx
    }

    /// Start the driver task. Idempotent while the channel is open.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) -> Result<()> {
        if self.state().is_closed() {
            return Err(SyncError::ChannelClosed);
        }
        let mut driver = self.inner.driver.lock();
        if driver.is_some() {
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::InvalidState(format!("no tokio runtime: {}", e)))?;
        let inner = Arc::clone(&self.inner);
        *driver = Some(runtime.spawn(run(inner)));
        Ok(())
    }

    /// Queue a message for the open connection.
    ///
    /// Delivery is best effort: when no connection is open a
    /// `Diagnostic::SendFailed` is published instead.
    pub fn send(&self, message: &Message) -> Result<()> {
        if self.state().is_closed() {
            return Err(SyncError::ChannelClosed);
        }
        let text = encode_text(message)?;
        let queued = match self.inner.outbound.lock().as_ref() {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        };
        if !queued {
            self.inner.diagnose(Diagnostic::SendFailed {
                reason: "not connected".to_string(),
            });
        }
        Ok(())
    }

    /// Move to `Closed` and stop the driver. Safe to call repeatedly.
    pub fn close(&self) {
        if self.state().is_closed() {
            return;
        }
        self.inner.close_tx.send_replace(true);
        self.inner.set_state(ChannelState::Closed);
        self.inner.outbound.lock().take();
        self.inner.subscribers.lock().clear();
        self.inner.driver.lock().take();
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

impl ChannelInner {
    fn emit(&self, event: ChannelEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.try_send(event.clone()).is_ok());
    }

    fn diagnose(&self, diagnostic: Diagnostic) {
        warn!("[WS] {}: {}", self.url, diagnostic);
        self.emit(ChannelEvent::Diagnostic(diagnostic));
    }

    /// `Closed` is terminal; transitions out of it are ignored.
    fn set_state(&self, next: ChannelState) {
        let changed = self.state_tx.send_if_modified(|state| {
            if state.is_closed() || *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            info!("[WS] {} -> {}", self.url, next);
            self.emit(ChannelEvent::State(next));
        }
    }

    fn handle_frame(&self, text: &str) {
        debug!("[WS-In] {}", truncate_for_log(text, LOG_FRAME_CHARS));
        match decode_frame(text) {
            Ok(Envelope::Message(msg)) => self.emit(ChannelEvent::Message(msg)),
            Ok(Envelope::Presence(presence)) => self.emit(ChannelEvent::Presence(presence)),
            Err(e) => self.diagnose(Diagnostic::MalformedFrame {
                frame: truncate_for_log(text, LOG_FRAME_CHARS),
                reason: e.to_string(),
            }),
        }
    }

    async fn pump(
        &self,
        connection: FrameConnection,
        mut outbound: mpsc::UnboundedReceiver<String>,
        close_rx: &mut watch::Receiver<bool>,
    ) -> PumpExit {
        let FrameConnection {
            mut sink,
            mut stream,
        } = connection;

        loop {
            tokio::select! {
                biased;
                _ = closed(close_rx) => {
                    let _ = tokio::time::timeout(SINK_CLOSE_TIMEOUT, sink.close()).await;
                    return PumpExit::Closed;
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => return PumpExit::Lost(e.to_string()),
                    None => return PumpExit::Lost("closed by peer".to_string()),
                },
                Some(text) = outbound.recv() => {
                    debug!("[WS-Out] {}", truncate_for_log(&text, LOG_FRAME_CHARS));
                    if let Err(e) = sink.send(text).await {
                        self.diagnose(Diagnostic::SendFailed { reason: e.to_string() });
                    }
                }
            }
        }
    }
}

/// Resolves once the close flag is set.
async fn closed(close_rx: &mut watch::Receiver<bool>) {
    loop {
        let is_closed = *close_rx.borrow_and_update();
        if is_closed || close_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn run(inner: Arc<ChannelInner>) {
    let mut close_rx = inner.close_tx.subscribe();
    let mut backoff = Backoff::new(inner.backoff.clone());

    loop {
        if *close_rx.borrow() {
            break;
        }
        inner.set_state(ChannelState::Connecting);

        let attempt = tokio::select! {
            biased;
            _ = closed(&mut close_rx) => break,
            result = inner.connector.connect(&inner.url) => result,
        };

        match attempt {
            Ok(connection) => {
                backoff.reset();
                let (tx, rx) = mpsc::unbounded_channel();
                *inner.outbound.lock() = Some(tx);
                inner.set_state(ChannelState::Connected);

                let exit = inner.pump(connection, rx, &mut close_rx).await;
                inner.outbound.lock().take();
                match exit {
                    PumpExit::Closed => break,
                    PumpExit::Lost(reason) => {
                        inner.diagnose(Diagnostic::ConnectionLost { reason });
                    }
                }
            }
            Err(e) => {
                inner.diagnose(Diagnostic::ConnectFailed {
                    attempt: backoff.attempts() + 1,
                    error: e.to_string(),
                });
            }
        }

        inner.set_state(ChannelState::Disconnected);
        let delay = backoff.next_delay();
        debug!("[WS] reconnecting to {} in {:?}", inner.url, delay);
        tokio::select! {
            biased;
            _ = closed(&mut close_rx) => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("[WS] driver for {} stopped", inner.url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct RefusingConnector;

    #[async_trait]
    impl FrameConnector for RefusingConnector {
        async fn connect(&self, _url: &str) -> Result<FrameConnection> {
            Err(SyncError::Network("connection refused".into()))
        }
    }

    fn channel() -> RealtimeChannel {
        RealtimeChannel::new(
            "ws://test/ws",
            Arc::new(RefusingConnector),
            BackoffConfig::new()
                .with_initial_backoff(Duration::from_millis(5))
                .with_max_backoff(Duration::from_millis(20))
                .with_jitter(0.0),
        )
    }

    #[test]
    fn test_connect_outside_runtime_is_error() {
        let ch = channel();
        assert!(matches!(ch.connect(), Err(SyncError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_reports_diagnostic() {
        let ch = channel();
        let events = ch.subscribe();
        ch.send(&Message::new("a", "b", "hi")).unwrap();
        match events.try_recv().unwrap() {
            ChannelEvent::Diagnostic(Diagnostic::SendFailed { reason }) => {
                assert_eq!(reason, "not connected")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_failures_keep_retrying() {
        let ch = channel();
        let events = ch.subscribe();
        ch.connect().unwrap();

        let mut attempts = Vec::new();
        while attempts.len() < 3 {
            if let ChannelEvent::Diagnostic(Diagnostic::ConnectFailed { attempt, .. }) =
                events.recv().await.unwrap()
            {
                attempts.push(attempt);
            }
        }
        assert_eq!(attempts, vec![1, 2, 3]);
        ch.close();
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let ch = channel();
        ch.connect().unwrap();
        ch.close();
        ch.close();
        assert_eq!(ch.state(), ChannelState::Closed);
        assert!(matches!(ch.connect(), Err(SyncError::ChannelClosed)));
        assert!(matches!(
            ch.send(&Message::new("a", "b", "hi")),
            Err(SyncError::ChannelClosed)
        ));
        assert!(ch.subscribe().recv().await.is_err());
    }
}
