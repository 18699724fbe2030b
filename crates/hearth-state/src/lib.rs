//! # hearth-state: Lifecycle State Machines
//!
//! Pure state and transition functions for the childcare lifecycle. Nothing
//! in this crate locks, performs I/O, or reads the wall clock: every
//! transition takes `now` and the acting [`hearth_core::Role`] explicitly,
//! validates completely, and only then mutates. A transition that returns
//! `Err` leaves the value untouched.
//!
//! ## State Machines
//!
//! - **Booking** (`booking.rs`):
//!   `pending → confirmed → in_progress → completed`, with
//!   `pending | confirmed → cancelled`. Emergency is an orthogonal flag.
//!
//! - **Handover** (`handover.rs`): three guarded steps (medical disclosure,
//!   emergency contact, consent + signature) then an idempotent finalize.
//!
//! - **Session** (`session.rs`): `not_started → active → completed | aborted`.
//!   Owns the session's checklist and activity ledger.
//!
//! - **Incident** (`incident.rs`): `open → investigating → resolved`.
//!
//! ## Idempotency
//!
//! Re-invoking a transition that already applied returns
//! [`Outcome::Unchanged`] rather than an error.

pub mod booking;
pub mod checklist;
pub mod handover;
pub mod incident;
pub mod ledger;
pub mod session;
pub mod transition;

pub use booking::{
    Booking, BookingStatus, Cancellation, CancellationSource, EmergencyFlag, NewBooking,
};
pub use checklist::{Checklist, ChecklistItem};
pub use handover::{
    EmergencyContact, HandoverRecord, HandoverStatus, HandoverStep, MedicalDisclosure,
    SignatureParty,
};
pub use incident::{Incident, IncidentCategory, IncidentStatus, IncidentSubject, Severity};
pub use ledger::{ActivityDraft, ActivityEvent, ActivityKind, ActivityLedger, Appended, Mood};
pub use session::{AbortRecord, CareSession, SessionStatus};
pub use transition::{Outcome, TransitionRecord};
