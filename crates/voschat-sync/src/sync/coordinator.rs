//! Ties the REST client, realtime channel and store together for one scope.

use crate::error::{Result, SyncError};
use crate::realtime::{ChannelEvent, ChannelState, RealtimeChannel};
use crate::store::{Delta, MessageStore};
use crate::traits::{ChatApi, SendReceipt};
use crate::types::{Chat, FileInfo, Message, PresenceEvent, Scope};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Content used for file messages sent without a caption.
pub const DEFAULT_FILE_CONTENT: &str = "File sent";

type PresenceSubscribers = Arc<Mutex<Vec<async_channel::Sender<PresenceEvent>>>>;

/// Keeps a [`MessageStore`] in sync with the server for one [`Scope`].
///
/// History is fetched over REST while live frames queue up in the channel
/// subscription; once history is committed the queue is drained in arrival
/// order, so a live message never lands ahead of the page it follows.
pub struct SyncCoordinator {
    api: Arc<dyn ChatApi>,
    channel: RealtimeChannel,
    store: MessageStore,
    presence: PresenceSubscribers,
    session: Mutex<Session>,
}

#[derive(Default)]
struct Session {
    scope: Option<Scope>,
    pump: Option<JoinHandle<()>>,
}

impl SyncCoordinator {
    pub fn new(api: Arc<dyn ChatApi>, channel: RealtimeChannel) -> Self {
        Self::with_store(api, channel, MessageStore::new())
    }

    pub fn with_store(
        api: Arc<dyn ChatApi>,
        channel: RealtimeChannel,
        store: MessageStore,
    ) -> Self {
        Self {
            api,
            channel,
            store,
            presence: Arc::new(Mutex::new(Vec::new())),
            session: Mutex::new(Session::default()),
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn channel(&self) -> &RealtimeChannel {
        &self.channel
    }

    pub fn scope(&self) -> Option<Scope> {
        self.session.lock().scope.clone()
    }

    /// Presence notifications from now on. Ends when the coordinator stops.
    pub fn presence(&self) -> async_channel::Receiver<PresenceEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.presence.lock().push(tx);
        rx
    }

    /// Connect, load history for `scope`, then apply live events.
    ///
    /// Dropping the returned future before it completes closes the channel
    /// and releases the scope, as a failed history fetch does.
    pub async fn start(&self, scope: Scope) -> Result<()> {
        {
            let mut session = self.session.lock();
            if session.scope.is_some() {
                return Err(SyncError::InvalidState(format!(
                    "already syncing {}",
                    scope
                )));
            }
            session.scope = Some(scope.clone());
        }
        let mut claim = StartClaim {
            coordinator: self,
            committed: false,
        };

        // Subscribe before connecting so no frame between open and the
        // history commit is lost.
        let events = self.channel.subscribe();
        self.channel.connect()?;

        let history = fetch_history(self.api.as_ref(), &scope)
            .await
            .inspect_err(|e| warn!("[Sync] {}: history fetch failed: {}", scope, e))?;
        let inserted = self.store.ingest_history(history);
        info!("[Sync] {}: loaded {} messages", scope, inserted);

        let pump = tokio::spawn(pump(
            Arc::clone(&self.api),
            self.store.clone(),
            Arc::clone(&self.presence),
            scope,
            events,
        ));
        self.session.lock().pump = Some(pump);
        claim.committed = true;
        Ok(())
    }

    /// Close the channel and detach every listener. Safe to call repeatedly.
    pub fn stop(&self) {
        self.channel.close();
        if let Some(pump) = self.session.lock().pump.take() {
            pump.abort();
        }
        self.store.clear_subscriptions();
        self.presence.lock().clear();
    }

    /// Send a message, showing it in the store until the server answers.
    pub async fn send(&self, message: Message) -> Result<SendReceipt> {
        let visible = self
            .scope()
            .map_or(true, |scope| scope.contains(&message));
        let local = visible.then(|| self.store.insert_pending(message.clone()));

        match self.api.send_message(&message).await {
            Ok(receipt) => {
                if let Some(local) = local {
                    self.store.acknowledge(local, receipt.message.clone());
                }
                Ok(receipt)
            }
            Err(e) => {
                warn!("[Sync] send from {} failed: {}", message.from, e);
                if let Some(local) = local {
                    self.store.discard_pending(local);
                }
                Err(e)
            }
        }
    }

    /// Upload `data` and send a message carrying the returned file metadata.
    ///
    /// `template` supplies sender, recipient and optional caption.
    pub async fn send_file(
        &self,
        data: Bytes,
        filename: &str,
        template: Message,
    ) -> Result<SendReceipt> {
        let info = self.api.upload_file(data, filename).await?;
        debug!("[Sync] uploaded {} as {}", filename, info.id());
        let mut message = template.with_file(info);
        if message.content.trim().is_empty() {
            message.content = DEFAULT_FILE_CONTENT.to_string();
        }
        self.send(message).await
    }

    /// Delete on the server, then locally. A `NotFound` from the server
    /// still removes the local copy and is returned to the caller.
    pub async fn delete(&self, id: &str) -> Result<()> {
        match self.api.delete_message(id).await {
            Ok(()) => {
                self.store.remove(id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                self.store.remove(id);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_chat(&self, name: &str, members: &[String]) -> Result<Chat> {
        self.api.create_chat(name, members).await
    }

    pub async fn download_file(&self, file: &FileInfo) -> Result<Bytes> {
        self.api.download_file(file).await
    }
}

/// Undoes a `start` that did not reach its commit, including one whose
/// future was dropped mid-fetch.
struct StartClaim<'a> {
    coordinator: &'a SyncCoordinator,
    committed: bool,
}

impl Drop for StartClaim<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        debug!("[Sync] start abandoned, closing channel");
        self.coordinator.channel.close();
        self.coordinator.session.lock().scope = None;
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        if let Some(pump) = self.session.get_mut().pump.take() {
            pump.abort();
        }
    }
}

async fn fetch_history(api: &dyn ChatApi, scope: &Scope) -> Result<Vec<Message>> {
    let history = match scope {
        Scope::All | Scope::Group { .. } => api.list_messages().await?,
        Scope::Direct { user, peer } => api.list_messages_between(user, peer).await?,
    };
    Ok(history.into_iter().filter(|m| scope.contains(m)).collect())
}

fn forward_presence(subscribers: &PresenceSubscribers, event: PresenceEvent) {
    subscribers
        .lock()
        .retain(|tx| tx.try_send(event.clone()).is_ok());
}

async fn pump(
    api: Arc<dyn ChatApi>,
    store: MessageStore,
    presence: PresenceSubscribers,
    scope: Scope,
    events: async_channel::Receiver<ChannelEvent>,
) {
    let mut opened = false;

    while let Ok(event) = events.recv().await {
        match event {
            ChannelEvent::Message(message) => {
                if !scope.contains(&message) {
                    continue;
                }
                match store.ingest_live(message) {
                    Delta::Duplicate => debug!("[Sync] {}: duplicate live message", scope),
                    delta => debug!("[Sync] {}: live message {:?}", scope, delta),
                }
            }
            ChannelEvent::Presence(event) => forward_presence(&presence, event),
            ChannelEvent::State(ChannelState::Connected) => {
                if opened {
                    // Reconnected: fill whatever was missed while down.
                    match fetch_history(api.as_ref(), &scope).await {
                        Ok(history) => {
                            let inserted = store.ingest_history(history);
                            info!("[Sync] {}: resync added {} messages", scope, inserted);
                        }
                        Err(e) => warn!("[Sync] {}: resync failed: {}", scope, e),
                    }
                }
                opened = true;
            }
            ChannelEvent::State(state) => debug!("[Sync] {}: channel {}", scope, state),
            ChannelEvent::Diagnostic(diagnostic) => {
                debug!("[Sync] {}: {}", scope, diagnostic)
            }
        }
    }

    debug!("[Sync] {}: event stream ended", scope);
}
