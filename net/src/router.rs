//! The per-node router: typed send/broadcast, handler dispatch and the
//! `message_id` dedup window (§6, and the bounded-window redesign recorded
//! in DESIGN.md).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use ezchain_crypto::Hash;
use tracing::warn;

use crate::error::{NetError, Result};
use crate::message::{Envelope, MessageType};

pub type Handler = Box<dyn Fn(&Envelope) + Send + Sync>;

/// A sliding window of observed `message_id`s, bounded at `capacity` and
/// evicting oldest-first once full. The reference router keeps an unbounded
/// Python `set()`; this is a deliberate redesign for long-running nodes.
struct DedupWindow {
    capacity: usize,
    order: VecDeque<Hash>,
    seen: HashSet<Hash>,
}

impl DedupWindow {
    fn new(capacity: usize) -> Self {
        Self { capacity, order: VecDeque::with_capacity(capacity), seen: HashSet::with_capacity(capacity) }
    }

    /// Returns `true` if `id` was newly inserted, `false` if already seen.
    fn observe(&mut self, id: Hash) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

/// Default dedup window capacity; large enough to absorb a burst of
/// re-broadcasts from a handful of peers without growing unbounded.
pub const DEFAULT_DEDUP_CAPACITY: usize = 4096;

struct RouterState {
    handlers: HashMap<MessageType, Handler>,
    dedup: DedupWindow,
    outbox: Vec<Envelope>,
}

/// A single node's router: owns exactly one mutable critical section (§5
/// "each node's router... own one mutable critical section"). Transport is
/// out of scope (§10 Non-goals) — `send`/`broadcast` append to an in-memory
/// outbox that a transport layer would drain.
pub struct Router {
    node_id: String,
    state: Mutex<RouterState>,
}

impl Router {
    pub fn new(node_id: String) -> Self {
        Self::with_dedup_capacity(node_id, DEFAULT_DEDUP_CAPACITY)
    }

    pub fn with_dedup_capacity(node_id: String, dedup_capacity: usize) -> Self {
        Self {
            node_id,
            state: Mutex::new(RouterState {
                handlers: HashMap::new(),
                dedup: DedupWindow::new(dedup_capacity),
                outbox: Vec::new(),
            }),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn register_handler(&self, message_type: MessageType, handler: Handler) {
        let mut state = self.state.lock().expect("router lock poisoned");
        state.handlers.insert(message_type, handler);
    }

    /// Queues `envelope` to a single named peer.
    pub fn send(&self, envelope: Envelope) {
        let mut state = self.state.lock().expect("router lock poisoned");
        state.outbox.push(envelope);
    }

    /// Queues `envelope` with no `to_node_id`, meaning "all peers".
    pub fn broadcast(&self, mut envelope: Envelope) {
        envelope.to_node_id = None;
        self.send(envelope);
    }

    /// Drains every envelope queued since the last drain, in FIFO order.
    pub fn drain_outbox(&self) -> Vec<Envelope> {
        let mut state = self.state.lock().expect("router lock poisoned");
        std::mem::take(&mut state.outbox)
    }

    /// Dispatches an incoming envelope to its registered handler, rejecting
    /// a replay already present in the dedup window.
    pub fn receive(&self, envelope: Envelope) -> Result<()> {
        let mut state = self.state.lock().expect("router lock poisoned");
        if !state.dedup.observe(envelope.message_id) {
            warn!(message_id = %ezchain_crypto::hex_encode(&envelope.message_id), "dropping duplicate message");
            return Err(NetError::Duplicate(ezchain_crypto::hex_encode(&envelope.message_id)));
        }
        match state.handlers.get(&envelope.message_type) {
            Some(handler) => {
                handler(&envelope);
                Ok(())
            }
            None => Err(NetError::NoHandler(envelope.message_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{BlockCommittedPayload, Payload};
    use ezchain_crypto::ZERO_HASH;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn envelope(timestamp: i64) -> Envelope {
        Envelope::new(
            Payload::BlockCommitted(BlockCommittedPayload { block_index: 1, merkle_root: ZERO_HASH }),
            "test-net".to_string(),
            "1".to_string(),
            "node-a".to_string(),
            None,
            timestamp,
        )
    }

    #[test]
    fn duplicate_message_id_is_rejected() {
        let router = Router::new("node-b".to_string());
        router.register_handler(MessageType::BlockCommitted, Box::new(|_| {}));
        let env = envelope(1);
        assert!(router.receive(env.clone()).is_ok());
        assert!(matches!(router.receive(env), Err(NetError::Duplicate(_))));
    }

    #[test]
    fn unregistered_type_reports_no_handler() {
        let router = Router::new("node-c".to_string());
        assert!(matches!(router.receive(envelope(1)), Err(NetError::NoHandler(_))));
    }

    #[test]
    fn registered_handler_is_invoked() {
        let router = Router::new("node-d".to_string());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        router.register_handler(MessageType::BlockCommitted, Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        router.receive(envelope(1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dedup_window_evicts_oldest_once_full() {
        let mut window = DedupWindow::new(2);
        assert!(window.observe([1u8; 32]));
        assert!(window.observe([2u8; 32]));
        assert!(window.observe([3u8; 32]));
        assert!(window.observe([1u8; 32])); // evicted, so this is "new" again
    }

    #[test]
    fn broadcast_clears_to_node_id() {
        let router = Router::new("node-e".to_string());
        let mut env = envelope(1);
        env.to_node_id = Some("node-f".to_string());
        router.broadcast(env);
        let drained = router.drain_outbox();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].to_node_id.is_none());
    }
}
