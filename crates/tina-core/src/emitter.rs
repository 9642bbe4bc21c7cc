//! In-process event source.
//!
//! Listeners register for a set of event kinds and receive matching events on
//! their own unbounded queue, in emission order.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::events::{EventKind, StoreEvent};

pub type EventReceiver = mpsc::UnboundedReceiver<Arc<StoreEvent>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    kinds: Vec<EventKind>,
    tx: mpsc::UnboundedSender<Arc<StoreEvent>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

#[derive(Clone, Default)]
pub struct EventEmitter {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.registry().listeners.len())
            .finish()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // The registry holds no invariant a panicking holder could break.
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a listener for `kinds`.
    pub fn on(&self, kinds: &[EventKind]) -> (ListenerId, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.registry();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push(Listener {
            id,
            kinds: kinds.to_vec(),
            tx,
        });
        (id, rx)
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry();
        let before = registry.listeners.len();
        registry.listeners.retain(|l| l.id != id);
        registry.listeners.len() != before
    }

    /// Deliver `event` to every listener registered for its kind.
    /// Returns how many listeners received it.
    pub fn emit(&self, event: StoreEvent) -> usize {
        let kind = event.kind();
        let event = Arc::new(event);
        let mut registry = self.registry();
        let mut delivered = 0;

        registry.listeners.retain(|listener| {
            if !listener.kinds.contains(&kind) {
                return true;
            }
            match listener.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    tracing::debug!(event = %kind, "Dropping listener with closed queue");
                    false
                }
            }
        });

        if delivered == 0 {
            tracing::debug!(event = %kind, "No listener for event");
        }
        delivered
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry()
            .listeners
            .iter()
            .filter(|l| l.kinds.contains(&kind))
            .count()
    }
}
