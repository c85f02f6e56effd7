//! Ordered, de-duplicated message store with change notification.

use crate::store::entry::{Entry, LocalId};
use crate::types::{DedupKey, Message};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::debug;

type Listener = Arc<dyn Fn(&[Message]) + Send + Sync>;

/// Outcome of [`MessageStore::ingest_live`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    Inserted,
    /// Replaced the optimistic copy inserted under `local`.
    Reconciled { local: LocalId },
    Duplicate,
}

/// Thread-safe store of one conversation's messages.
///
/// Cloning yields another handle to the same store. Mutations are
/// serialised; listeners run after each commit, in commit order, and must
/// not mutate the store from inside the callback.
#[derive(Clone)]
pub struct MessageStore {
    shared: Arc<Shared>,
}

struct Shared {
    /// Held across mutate + notify so listeners observe commits in order.
    writer: Mutex<()>,
    state: Mutex<State>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: Mutex<u64>,
    snapshots: watch::Sender<Arc<Vec<Message>>>,
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    /// Position of each entry by dedup key. Rebuilt whenever `entries` is re-sorted.
    index: HashMap<DedupKey, usize>,
    next_seq: u64,
}

/// Keeps a listener attached; dropping it detaches the listener.
#[must_use = "dropping a Subscription detaches the listener"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

enum Merge {
    /// Newer copies replace stored ones (history).
    Replace,
    /// Known keys are left untouched (live frames).
    Keep,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn position_of_key(&self, key: &DedupKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    fn position_of_local(&self, local: LocalId) -> Option<usize> {
        self.entries.iter().position(|e| e.local == Some(local))
    }

    /// Local entry still waiting for its server copy.
    fn unsynced_echo_of(&self, message: &Message) -> Option<usize> {
        message.id.as_ref()?;
        self.entries
            .iter()
            .position(|e| e.awaiting_server_copy() && e.message.echoes(message))
    }

    fn merge(&mut self, message: Message, policy: Merge) -> (Delta, bool) {
        let key = message.dedup_key();
        if let Some(pos) = self.position_of_key(&key) {
            let changed = match policy {
                Merge::Replace => self.entries[pos].replace(message),
                Merge::Keep => false,
            };
            return (Delta::Duplicate, changed);
        }

        if let Some(pos) = self.unsynced_echo_of(&message) {
            let entry = &mut self.entries[pos];
            let stale = entry.message.dedup_key();
            entry.replace(message);
            entry.pending = false;
            let local = entry.local.unwrap_or_else(LocalId::new);
            if self.index.get(&stale) == Some(&pos) {
                self.index.remove(&stale);
            }
            self.index.insert(key, pos);
            return (Delta::Reconciled { local }, true);
        }

        let seq = self.next_seq();
        self.index.insert(key, self.entries.len());
        self.entries.push(Entry::new(message, seq));
        (Delta::Inserted, true)
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.cmp_order(b));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.message.dedup_key(), pos))
            .collect();
    }

    fn messages(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(()),
                state: Mutex::new(State::default()),
                listeners: Mutex::new(Vec::new()),
                next_listener: Mutex::new(0),
                snapshots,
            }),
        }
    }

    /// Run `mutate` as one commit and notify when it reports a change.
    fn commit<R>(&self, mutate: impl FnOnce(&mut State) -> (R, bool)) -> R {
        let _writer = self.shared.writer.lock();
        let (result, snapshot) = {
            let mut state = self.shared.state.lock();
            let (result, changed) = mutate(&mut state);
            if changed {
                state.sort();
            }
            (result, changed.then(|| state.messages()))
        };
        if let Some(messages) = snapshot {
            self.notify(messages);
        }
        result
    }

    fn notify(&self, messages: Vec<Message>) {
        let listeners: Vec<Listener> = self
            .shared
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in &listeners {
            listener(messages.as_slice());
        }
        self.shared.snapshots.send_replace(Arc::new(messages));
    }

    /// Merge a fetched history page. Returns how many entries were new.
    pub fn ingest_history(&self, messages: Vec<Message>) -> usize {
        let batch = messages.len();
        let inserted = self.commit(|state| {
            let mut inserted = 0;
            let mut changed = false;
            for message in messages {
                let (delta, touched) = state.merge(message, Merge::Replace);
                if delta == Delta::Inserted {
                    inserted += 1;
                }
                changed |= touched;
            }
            (inserted, changed)
        });
        debug!("[Store] history: {} received, {} new", batch, inserted);
        inserted
    }

    /// Apply one message pushed by the server.
    pub fn ingest_live(&self, message: Message) -> Delta {
        self.commit(|state| state.merge(message, Merge::Keep))
    }

    /// Remove the message with server id `id`. No-op when absent.
    pub fn remove(&self, id: &str) -> bool {
        self.commit(|state| {
            let before = state.entries.len();
            state.entries.retain(|e| !e.has_id(id));
            let removed = state.entries.len() != before;
            (removed, removed)
        })
    }

    /// Insert a message the server has not confirmed yet.
    pub fn insert_pending(&self, message: Message) -> LocalId {
        let local = LocalId::new();
        self.commit(|state| {
            let seq = state.next_seq();
            state.entries.push(Entry::pending(message, seq, local));
            ((), true)
        });
        local
    }

    /// Confirm a pending entry, adopting the server copy when there is one.
    ///
    /// If another entry already carries the server id, the pending copy is
    /// dropped in its favour. Without a server copy the entry stays open to
    /// reconciliation with the echo that arrives later.
    pub fn acknowledge(&self, local: LocalId, confirmed: Option<Message>) -> bool {
        self.commit(|state| {
            let Some(pos) = state.position_of_local(local) else {
                return (false, false);
            };

            let Some(confirmed) = confirmed else {
                let entry = &mut state.entries[pos];
                let was_pending = std::mem::replace(&mut entry.pending, false);
                return (true, was_pending);
            };

            let taken = confirmed.id.as_deref().is_some_and(|id| {
                state
                    .entries
                    .iter()
                    .enumerate()
                    .any(|(i, e)| i != pos && e.has_id(id))
            });
            if taken {
                state.entries.remove(pos);
                return (true, true);
            }

            let entry = &mut state.entries[pos];
            let was_pending = std::mem::replace(&mut entry.pending, false);
            let replaced = entry.replace(confirmed);
            (true, was_pending || replaced)
        })
    }

    /// Drop a pending entry whose send failed.
    pub fn discard_pending(&self, local: LocalId) -> bool {
        self.commit(|state| {
            match state
                .entries
                .iter()
                .position(|e| e.pending && e.local == Some(local))
            {
                Some(pos) => {
                    state.entries.remove(pos);
                    (true, true)
                }
                None => (false, false),
            }
        })
    }

    pub fn is_pending(&self, local: LocalId) -> bool {
        let state = self.shared.state.lock();
        state
            .position_of_local(local)
            .is_some_and(|pos| state.entries[pos].pending)
    }

    /// Call `listener` with the full ordered sequence after every commit.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Message]) + Send + Sync + 'static,
    {
        let id = {
            let mut next = self.shared.next_listener.lock();
            *next += 1;
            *next
        };
        self.shared.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Snapshots published after every commit.
    pub fn watch(&self) -> watch::Receiver<Arc<Vec<Message>>> {
        self.shared.snapshots.subscribe()
    }

    pub fn clear_subscriptions(&self) {
        self.shared.listeners.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.shared.state.lock().messages()
    }

    pub fn get(&self, id: &str) -> Option<Message> {
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .find(|e| e.has_id(id))
            .map(|e| e.message.clone())
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("len", &self.len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn msg(id: &str, ts: &str, content: &str) -> Message {
        Message::new("alice", "bob", content)
            .with_id(id)
            .with_timestamp(ts)
    }

    fn ids(store: &MessageStore) -> Vec<String> {
        store
            .snapshot()
            .into_iter()
            .map(|m| m.id.unwrap_or_default())
            .collect()
    }

    fn counting(store: &MessageStore) -> (Arc<AtomicUsize>, Subscription) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let sub = store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (calls, sub)
    }

    #[test]
    fn test_history_is_sorted_and_deduplicated() {
        let store = MessageStore::new();
        let inserted = store.ingest_history(vec![
            msg("2", "2024-05-01T10:02:00Z", "second"),
            msg("1", "2024-05-01T10:01:00Z", "first"),
            msg("2", "2024-05-01T10:02:00Z", "second"),
        ]);
        assert_eq!(inserted, 2);
        assert_eq!(ids(&store), vec!["1", "2"]);
    }

    #[test]
    fn test_history_is_idempotent_and_silent() {
        let store = MessageStore::new();
        let batch = vec![msg("1", "2024-05-01T10:01:00Z", "hi")];
        store.ingest_history(batch.clone());
        let (calls, _sub) = counting(&store);
        assert_eq!(store.ingest_history(batch), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_merges_with_live_entries() {
        let store = MessageStore::new();
        store.ingest_live(msg("3", "2024-05-01T10:03:00Z", "live"));
        store.ingest_history(vec![msg("1", "2024-05-01T10:01:00Z", "old")]);
        assert_eq!(ids(&store), vec!["1", "3"]);
    }

    #[test]
    fn test_history_copy_replaces_stored_copy() {
        let store = MessageStore::new();
        store.ingest_live(msg("1", "2024-05-01T10:01:00Z", "draft"));
        store.ingest_history(vec![msg("1", "2024-05-01T10:01:00Z", "edited")]);
        assert_eq!(store.get("1").unwrap().content, "edited");
    }

    #[test]
    fn test_live_duplicate_is_noop() {
        let store = MessageStore::new();
        let (calls, _sub) = counting(&store);
        let m = msg("1", "2024-05-01T10:01:00Z", "hi");
        assert_eq!(store.ingest_live(m.clone()), Delta::Inserted);
        assert_eq!(store.ingest_live(m), Delta::Duplicate);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_composite_key_without_id() {
        let store = MessageStore::new();
        let m = Message::new("a", "b", "hi").with_timestamp("2024-05-01T10:00:00Z");
        assert_eq!(store.ingest_live(m.clone()), Delta::Inserted);
        assert_eq!(store.ingest_live(m.clone()), Delta::Duplicate);
        assert_eq!(
            store.ingest_live(m.with_timestamp("2024-05-01T10:00:01Z")),
            Delta::Inserted
        );
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let store = MessageStore::new();
        store.ingest_live(msg("b", "2024-05-01T10:00:00Z", "x"));
        store.ingest_live(msg("a", "2024-05-01T10:00:00Z", "y"));
        assert_eq!(ids(&store), vec!["b", "a"]);
    }

    #[test]
    fn test_unparseable_and_missing_timestamps() {
        let store = MessageStore::new();
        store.ingest_live(Message::new("a", "b", "no stamp").with_id("n"));
        store.ingest_live(msg("p", "2024-05-01T10:00:00Z", "parsed"));
        store.ingest_live(msg("u", "sometime", "unparsed"));
        assert_eq!(ids(&store), vec!["u", "p", "n"]);
    }

    #[test]
    fn test_remove() {
        let store = MessageStore::new();
        store.ingest_history(vec![
            msg("1", "2024-05-01T10:01:00Z", "a"),
            msg("2", "2024-05-01T10:02:00Z", "b"),
        ]);
        let (calls, _sub) = counting(&store);
        assert!(store.remove("1"));
        assert!(!store.remove("1"));
        assert!(!store.remove("missing"));
        assert_eq!(ids(&store), vec!["2"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pending_then_acknowledged() {
        let store = MessageStore::new();
        store.ingest_live(msg("1", "2024-05-01T10:01:00Z", "earlier"));
        let local = store.insert_pending(Message::new("alice", "bob", "hello"));
        assert!(store.is_pending(local));
        assert_eq!(store.snapshot().last().unwrap().content, "hello");

        let confirmed = msg("9", "2024-05-01T10:00:00Z", "hello");
        assert!(store.acknowledge(local, Some(confirmed)));
        assert!(!store.is_pending(local));
        assert_eq!(ids(&store), vec!["9", "1"]);
    }

    #[test]
    fn test_live_echo_reconciles_pending() {
        let store = MessageStore::new();
        let local = store.insert_pending(Message::new("alice", "bob", "hello"));
        let delta = store.ingest_live(msg("9", "2024-05-01T10:00:00Z", "hello"));
        assert_eq!(delta, Delta::Reconciled { local });
        assert_eq!(store.len(), 1);

        // The REST acknowledgement arriving afterwards changes nothing.
        let (calls, _sub) = counting(&store);
        assert!(store.acknowledge(local, Some(msg("9", "2024-05-01T10:00:00Z", "hello"))));
        assert_eq!(store.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_echo_after_bare_acknowledgement_reconciles() {
        let store = MessageStore::new();
        store.ingest_live(msg("1", "2024-05-01T10:01:00Z", "earlier"));
        let local = store.insert_pending(Message::new("alice", "bob", "hello"));
        assert!(store.acknowledge(local, None));
        assert!(!store.is_pending(local));

        let delta = store.ingest_live(msg("9", "2024-05-01T10:00:00Z", "hello"));
        assert_eq!(delta, Delta::Reconciled { local });
        assert_eq!(ids(&store), vec!["9", "1"]);
    }

    #[test]
    fn test_history_page_reconciles_bare_acknowledgement() {
        let store = MessageStore::new();
        let local = store.insert_pending(Message::new("alice", "bob", "hello"));
        store.acknowledge(local, None);
        assert_eq!(store.ingest_history(vec![msg("9", "2024-05-01T10:00:00Z", "hello")]), 0);
        assert_eq!(ids(&store), vec!["9"]);
        assert_eq!(store.ingest_live(msg("9", "2024-05-01T10:00:00Z", "hello")), Delta::Duplicate);
    }

    #[test]
    fn test_large_history_resync_keeps_index_consistent() {
        let store = MessageStore::new();
        let page: Vec<Message> = (0..5000u32)
            .map(|i| {
                let (h, m, sec) = (i / 3600, (i / 60) % 60, i % 60);
                let ts = format!("2024-05-01T{:02}:{:02}:{:02}Z", h, m, sec);
                msg(&i.to_string(), &ts, "x")
            })
            .collect();
        assert_eq!(store.ingest_history(page.clone()), 5000);
        assert_eq!(store.ingest_history(page), 0);

        assert!(store.remove("42"));
        assert_eq!(
            store.ingest_live(msg("42", "2024-05-01T00:00:42Z", "x")),
            Delta::Inserted
        );
        assert_eq!(
            store.ingest_live(msg("4999", "2024-05-01T01:23:19Z", "x")),
            Delta::Duplicate
        );
        assert_eq!(store.len(), 5000);
    }

    #[test]
    fn test_acknowledge_drops_pending_when_id_taken() {
        let store = MessageStore::new();
        let local = store.insert_pending(Message::new("alice", "bob", "hello").with_chat("room"));
        // Same id but the echo check fails (different target), so both coexist.
        store.ingest_live(msg("9", "2024-05-01T10:00:00Z", "hello"));
        assert_eq!(store.len(), 2);
        assert!(store.acknowledge(local, Some(msg("9", "2024-05-01T10:00:00Z", "hello"))));
        assert_eq!(ids(&store), vec!["9"]);
    }

    #[test]
    fn test_discard_pending() {
        let store = MessageStore::new();
        let local = store.insert_pending(Message::new("alice", "bob", "lost"));
        assert!(store.discard_pending(local));
        assert!(!store.discard_pending(local));
        assert!(store.is_empty());
        assert!(!store.acknowledge(local, None));
    }

    #[test]
    fn test_listeners_see_full_sequence_and_detach() {
        let store = MessageStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.subscribe(move |messages| {
            sink.lock().push(messages.len());
        });
        store.ingest_live(msg("1", "2024-05-01T10:01:00Z", "a"));
        store.ingest_live(msg("2", "2024-05-01T10:02:00Z", "b"));
        sub.unsubscribe();
        store.ingest_live(msg("3", "2024-05-01T10:03:00Z", "c"));
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_read_store() {
        let store = MessageStore::new();
        let reader = store.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |_| {
            sink.store(reader.len(), Ordering::SeqCst);
        });
        store.ingest_live(msg("1", "2024-05-01T10:01:00Z", "a"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_subscriptions() {
        let store = MessageStore::new();
        let (calls, _sub) = counting(&store);
        store.clear_subscriptions();
        store.ingest_live(msg("1", "2024-05-01T10:01:00Z", "a"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_watch_receives_snapshots() {
        let store = MessageStore::new();
        let rx = store.watch();
        store.ingest_history(vec![msg("1", "2024-05-01T10:01:00Z", "a")]);
        assert_eq!(rx.borrow().len(), 1);
        assert!(rx.has_changed().unwrap());
    }
}
