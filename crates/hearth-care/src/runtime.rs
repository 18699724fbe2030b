//! # Care Runtime
//!
//! Wires the registry, sitter calendar, outbox, clock, and collaborator
//! ports together and hands out the four services. Cloning a runtime is
//! cheap; all clones share state.

use std::sync::Arc;

use hearth_core::BookingId;

use crate::adapters::{
    InMemoryArtifactStore, InMemoryChildDirectory, InMemoryRecordRepository, LogDispatcher,
};
use crate::audit::{self, Violation};
use crate::bookings::BookingManager;
use crate::calendar::SitterCalendar;
use crate::clock::{Clock, SystemClock};
use crate::config::{CarePolicy, PolicyError, RelayConfig};
use crate::handover::HandoverProtocol;
use crate::incidents::IncidentTracker;
use crate::outbox::Outbox;
use crate::ports::{ArtifactStore, ChildDirectory, NotificationDispatcher, RecordRepository};
use crate::registry::{Effect, Registry};
use crate::relay::Relay;
use crate::sessions::SessionController;

pub(crate) struct Inner {
    pub(crate) registry: Registry,
    pub(crate) calendar: SitterCalendar,
    pub(crate) outbox: Arc<Outbox>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) policy: CarePolicy,
    pub(crate) children: Arc<dyn ChildDirectory>,
    pub(crate) artifacts: Arc<dyn ArtifactStore>,
    pub(crate) repository: Arc<dyn RecordRepository>,
    pub(crate) dispatcher: Arc<dyn NotificationDispatcher>,
}

impl Inner {
    /// Apply post-commit effects.
    pub(crate) fn settle(&self, booking_id: BookingId, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::ReleaseSitter { sitter_id } => {
                    if self.calendar.release(*sitter_id, booking_id) {
                        tracing::debug!(%booking_id, %sitter_id, "sitter reservation released");
                    }
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct CareRuntime {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CareRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CareRuntime")
            .field("bookings", &self.inner.registry.len())
            .field("outbox", &self.inner.outbox.len())
            .field("clock", &self.inner.clock)
            .finish_non_exhaustive()
    }
}

impl CareRuntime {
    pub fn builder() -> CareRuntimeBuilder {
        CareRuntimeBuilder::default()
    }

    pub fn bookings(&self) -> BookingManager<'_> {
        BookingManager::new(&self.inner)
    }

    pub fn handovers(&self) -> HandoverProtocol<'_> {
        HandoverProtocol::new(&self.inner)
    }

    pub fn sessions(&self) -> SessionController<'_> {
        SessionController::new(&self.inner)
    }

    pub fn incidents(&self) -> IncidentTracker<'_> {
        IncidentTracker::new(&self.inner)
    }

    pub fn calendar(&self) -> &SitterCalendar {
        &self.inner.calendar
    }

    pub fn policy(&self) -> &CarePolicy {
        &self.inner.policy
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Commits not yet picked up by the relay.
    pub fn pending_deliveries(&self) -> usize {
        self.inner.outbox.len()
    }

    /// A relay draining this runtime's outbox into its repository and
    /// dispatcher.
    pub fn relay(&self, config: RelayConfig) -> Relay {
        Relay::new(
            Arc::clone(&self.inner.outbox),
            Arc::clone(&self.inner.repository),
            Arc::clone(&self.inner.dispatcher),
            config,
        )
    }

    /// Check every care file and the sitter calendar for broken invariants.
    pub fn audit(&self) -> Vec<Violation> {
        let files = self.inner.registry.snapshots();
        audit::audit_all(&files, &self.inner.calendar)
    }
}

#[derive(Default)]
pub struct CareRuntimeBuilder {
    policy: Option<CarePolicy>,
    clock: Option<Arc<dyn Clock>>,
    children: Option<Arc<dyn ChildDirectory>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    repository: Option<Arc<dyn RecordRepository>>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
}

impl CareRuntimeBuilder {
    pub fn policy(mut self, policy: CarePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn children(mut self, children: Arc<dyn ChildDirectory>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn RecordRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Unset collaborators fall back to the in-memory adapters, the system
    /// clock, and the default policy.
    pub fn build(self) -> Result<CareRuntime, PolicyError> {
        let policy = self.policy.unwrap_or_default();
        policy.validate()?;
        let outbox = Arc::new(Outbox::new());
        let inner = Inner {
            registry: Registry::new(Arc::clone(&outbox)),
            calendar: SitterCalendar::new(),
            outbox,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            policy,
            children: self
                .children
                .unwrap_or_else(|| Arc::new(InMemoryChildDirectory::new())),
            artifacts: self
                .artifacts
                .unwrap_or_else(|| Arc::new(InMemoryArtifactStore::new())),
            repository: self
                .repository
                .unwrap_or_else(|| Arc::new(InMemoryRecordRepository::new())),
            dispatcher: self.dispatcher.unwrap_or_else(|| Arc::new(LogDispatcher)),
        };
        Ok(CareRuntime {
            inner: Arc::new(inner),
        })
    }
}
