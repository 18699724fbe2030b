//! # Outbox Relay
//!
//! Drains committed changes to the record repository and the notification
//! dispatcher, off the request path. For each outbox entry the snapshot is
//! persisted first, then each event is dispatched in order.
//!
//! Port calls are synchronous and run under `spawn_blocking`. Transient
//! failures are retried with exponential backoff (200ms, 400ms, 800ms by
//! default) and a final attempt; a delivery that still fails is logged and
//! counted, and the relay moves on. Lifecycle state is never rolled back
//! because a collaborator was down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::RelayConfig;
use crate::outbox::{Outbox, OutboxEntry};
use crate::ports::{NotificationDispatcher, PortError, RecordRepository};

/// Totals for one drain or for the lifetime of [`Relay::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub persisted: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl RelayStats {
    fn absorb(&mut self, other: RelayStats) {
        self.persisted += other.persisted;
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

pub struct Relay {
    outbox: Arc<Outbox>,
    repository: Arc<dyn RecordRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: RelayConfig,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("pending", &self.outbox.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Relay {
    pub fn new(
        outbox: Arc<Outbox>,
        repository: Arc<dyn RecordRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: RelayConfig,
    ) -> Self {
        Self {
            outbox,
            repository,
            dispatcher,
            config,
        }
    }

    /// Deliver until `shutdown` flips to `true`, then drain what is left.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> RelayStats {
        tracing::info!(
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "outbox relay started"
        );
        let mut total = RelayStats::default();
        loop {
            total.absorb(self.flush().await);
            tokio::select! {
                _ = self.outbox.ready() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        total.absorb(self.flush().await);
        tracing::info!(
            persisted = total.persisted,
            delivered = total.delivered,
            failed = total.failed,
            "outbox relay stopped"
        );
        total
    }

    /// Deliver everything currently queued.
    pub async fn flush(&self) -> RelayStats {
        let mut stats = RelayStats::default();
        loop {
            let batch = self.outbox.drain(self.config.batch_size.max(1));
            if batch.is_empty() {
                return stats;
            }
            for entry in batch {
                stats.absorb(self.deliver(entry).await);
            }
        }
    }

    async fn deliver(&self, entry: OutboxEntry) -> RelayStats {
        let mut stats = RelayStats::default();
        let booking_id = entry.file.booking.id;

        let repository = Arc::clone(&self.repository);
        let file = Arc::clone(&entry.file);
        let version = entry.version;
        let saved = retry_blocking(&self.config, "record repository save", move || {
            repository.save(version, &file)
        })
        .await;
        match saved {
            Ok(()) => stats.persisted += 1,
            Err(e) => {
                stats.failed += 1;
                metrics::counter!("hearth_outbox_failed_total").increment(1);
                tracing::error!(%booking_id, version, error = %e, "snapshot not persisted");
            }
        }

        for event in entry.events {
            let dispatcher = Arc::clone(&self.dispatcher);
            let name = event.name();
            let event = Arc::new(event);
            let sent = {
                let event = Arc::clone(&event);
                retry_blocking(&self.config, "notification dispatch", move || {
                    dispatcher.dispatch(&event)
                })
                .await
            };
            match sent {
                Ok(()) => {
                    stats.delivered += 1;
                    metrics::counter!("hearth_outbox_delivered_total").increment(1);
                }
                Err(e) => {
                    stats.failed += 1;
                    metrics::counter!("hearth_outbox_failed_total").increment(1);
                    tracing::error!(
                        %booking_id,
                        event = name,
                        event_id = %event.id,
                        error = %e,
                        "event not delivered"
                    );
                }
            }
        }
        stats
    }
}

/// Run `call` on the blocking pool, retrying transient failures with
/// exponential backoff, then one final attempt.
async fn retry_blocking<F>(
    config: &RelayConfig,
    what: &'static str,
    call: F,
) -> Result<(), PortError>
where
    F: Fn() -> Result<(), PortError> + Clone + Send + 'static,
{
    for attempt in 0..config.max_retries {
        match run_blocking(call.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() => {
                let delay = Duration::from_millis(
                    config.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt)),
                );
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    "{what} failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    run_blocking(call).await
}

async fn run_blocking<F>(call: F) -> Result<(), PortError>
where
    F: Fn() -> Result<(), PortError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call())
        .await
        .unwrap_or_else(|e| Err(PortError::Unavailable(format!("delivery task failed: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RelayConfig {
        RelayConfig {
            max_retries: 3,
            base_delay_ms: 1,
            batch_size: 8,
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_blocking(&fast(), "test", move || {
            if c.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(PortError::Unavailable("down".into()))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_exhaust_after_final_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_blocking(&fast(), "test", move || {
            c.fetch_add(1, Ordering::SeqCst);
            Err(PortError::Unavailable("down".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), fast().max_retries + 1);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_blocking(&fast(), "test", move || {
            c.fetch_add(1, Ordering::SeqCst);
            Err(PortError::Rejected("bad payload".into()))
        })
        .await;
        assert_eq!(result, Err(PortError::Rejected("bad payload".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
