use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::trace;

use tollgate_core::chunk::ChunkEvent;
use tollgate_core::constants::EVENT_BUS_CAPACITY;

/// In-process publisher of `chunk-payment` events, keyed by session id.
///
/// Bounded multi-producer/multi-consumer: slow subscribers observe
/// `Lagged` on their receiver rather than back-pressuring the stream. The
/// external SSE layer subscribes here and re-emits the same payload.
pub struct EventBus {
    sessions: Mutex<HashMap<String, broadcast::Sender<ChunkEvent>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to a session's event stream, creating it if needed.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ChunkEvent> {
        let mut sessions = self.sessions.lock().expect("event bus poisoned");
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to its session. Returns the number of receivers
    /// reached; sessions nobody listens to are pruned.
    pub fn publish(&self, event: &ChunkEvent) -> usize {
        let mut sessions = self.sessions.lock().expect("event bus poisoned");
        let Some(sender) = sessions.get(&event.session_id) else {
            return 0;
        };
        match sender.send(event.clone()) {
            Ok(n) => {
                trace!(session_id = %event.session_id, receivers = n, "chunk event published");
                n
            }
            Err(_) => {
                sessions.remove(&event.session_id);
                0
            }
        }
    }
}
