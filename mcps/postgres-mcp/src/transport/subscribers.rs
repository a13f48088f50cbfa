//! SSE subscriber registry
//!
//! Every open `/sse` stream holds a [`Subscription`]. Responses to `/mcp`
//! requests are broadcast to all of them. Delivery never waits: a
//! subscriber whose buffer is full misses that message and nobody else is
//! affected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

#[derive(Default)]
struct HubState {
    next_id: u64,
    senders: HashMap<u64, mpsc::Sender<String>>,
    closed: bool,
}

/// Owner of every live subscriber channel
pub struct SubscriberHub {
    state: Mutex<HubState>,
    buffer: usize,
}

impl SubscriberHub {
    /// Create a hub whose subscribers buffer up to `buffer` messages each
    pub fn new(buffer: usize) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            buffer: buffer.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // Map operations cannot leave the state half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new subscriber
    ///
    /// After [`close_all`](Self::close_all) the returned subscription is
    /// already closed.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        if !state.closed {
            state.senders.insert(id, tx);
        }
        drop(state);

        Subscription {
            id,
            rx,
            hub: Arc::clone(self),
        }
    }

    /// Send `message` to every subscriber, returning how many received it
    pub fn broadcast(&self, message: &str) -> usize {
        let mut state = self.lock();
        let mut delivered = 0;
        let mut gone = Vec::new();

        for (id, tx) in &state.senders {
            match tx.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = id, "SSE subscriber buffer full, dropping message");
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }

        for id in gone {
            state.senders.remove(&id);
        }
        delivered
    }

    /// Close every subscriber channel and refuse new ones
    pub fn close_all(&self) {
        let mut state = self.lock();
        state.closed = true;
        let count = state.senders.len();
        state.senders.clear();
        tracing::debug!("Closed {} SSE subscribers", count);
    }

    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.lock().senders.remove(&id);
    }
}

/// One subscriber's receiving end; deregisters itself on drop
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<String>,
    hub: Arc<SubscriberHub>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next broadcast message, or `None` once the hub has closed this channel
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<String, TryRecvError> {
        self.rx.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
        tracing::info!(subscriber = self.id, "SSE client disconnected");
    }
}
