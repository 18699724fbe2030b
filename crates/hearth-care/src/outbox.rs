//! Committed-but-undelivered changes.
//!
//! The registry pushes one entry per commit while it still holds the
//! booking's gate, so entries for a booking are queued in commit order.
//! The relay drains them asynchronously.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::events::DomainEvent;
use crate::registry::CareFile;

#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub version: u64,
    pub file: Arc<CareFile>,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug, Default)]
pub struct Outbox {
    queue: Mutex<VecDeque<OutboxEntry>>,
    notify: Notify,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: OutboxEntry) {
        self.queue.lock().push_back(entry);
        self.notify.notify_one();
    }

    /// Take up to `max` entries from the front.
    pub fn drain(&self, max: usize) -> Vec<OutboxEntry> {
        let mut queue = self.queue.lock();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Resolves once something has been pushed since the last wake-up.
    pub async fn ready(&self) {
        self.notify.notified().await;
    }
}
