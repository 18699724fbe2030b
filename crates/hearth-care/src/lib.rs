//! # hearth-care: Care Runtime
//!
//! The operational core of Hearth. Wraps the pure state machines from
//! `hearth-state` with per-booking serialization, authorization, policy,
//! pricing, sitter availability, and asynchronous delivery of domain events.
//!
//! ## Services
//!
//! | Service | Module | Owns |
//! |---|---|---|
//! | [`BookingManager`] | [`bookings`] | create, assign, begin/complete care, cancel, expiry sweep |
//! | [`HandoverProtocol`] | [`handover`] | the three-step trust handover and finalize |
//! | [`SessionController`] | [`sessions`] | session start/end, activity ledger, checklist, feed |
//! | [`IncidentTracker`] | [`incidents`] | incident reports and critical escalation |
//!
//! All four are obtained from a [`CareRuntime`].
//!
//! ## Consistency
//!
//! Every mutation goes through [`registry::Registry::apply`]: one gate per
//! booking, a private draft, an atomic snapshot swap on success. Concurrent
//! operations on one booking are totally ordered; a failed operation changes
//! nothing. Reads never block on the gate.
//!
//! ## Delivery
//!
//! Each commit enqueues its snapshot and events in the [`outbox::Outbox`].
//! The [`relay::Relay`] persists snapshots to the [`ports::RecordRepository`]
//! and pushes events to the [`ports::NotificationDispatcher`] with retry.

pub mod adapters;
pub mod audit;
mod authz;
pub mod bookings;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod events;
pub mod handover;
pub mod incidents;
pub mod outbox;
pub mod ports;
pub mod pricing;
pub mod registry;
pub mod relay;
pub mod runtime;
pub mod sessions;

pub use audit::Violation;
pub use bookings::{BookingFilter, BookingManager, BookingRequest, ASSIGNMENT_TIMEOUT_REASON};
pub use calendar::{Reservation, SitterCalendar};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CareConfig, CarePolicy, PolicyError, RelayConfig};
pub use events::{CareSummary, DomainEvent, DomainEventKind};
pub use handover::{FinalizedHandover, HandoverProtocol};
pub use incidents::{IncidentReport, IncidentTracker};
pub use ports::{
    ArtifactKind, ArtifactStore, ChildDirectory, NotificationDispatcher, PortError,
    RecordRepository,
};
pub use registry::CareFile;
pub use relay::{Relay, RelayStats};
pub use runtime::{CareRuntime, CareRuntimeBuilder};
pub use sessions::{FeedPage, SessionController};
