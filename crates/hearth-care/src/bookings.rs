//! # Booking Lifecycle Manager
//!
//! Creates bookings, assigns sitters, and drives the booking through
//! `pending → confirmed → in_progress → completed` or `→ cancelled`.
//!
//! Creation validates the window against [`CarePolicy`](crate::config::CarePolicy),
//! confirms each child with the child directory, prices the booking, and
//! issues a confirmation code. Assignment reserves the sitter's calendar
//! inside the same commit, so two overlapping bookings can never both be
//! confirmed for one sitter. Cancellation voids any in-progress handover.
//!
//! The expiry sweep cancels bookings still `pending` within
//! `assignment_cutoff_minutes` of their start, with reason
//! `assignment_timeout`.

use std::collections::HashSet;

use chrono::NaiveDate;
use hearth_core::{
    Actor, BookingId, CareError, CareWindow, ChildId, ConfirmationCode, EntityKind, ParentId,
    RoomNumber, SitterId, ValidationError,
};
use hearth_state::{
    Booking, BookingStatus, CancellationSource, CareSession, HandoverRecord, NewBooking, Outcome,
    SessionStatus,
};
use serde::{Deserialize, Serialize};

use crate::authz;
use crate::events::{CareSummary, DomainEventKind};
use crate::pricing;
use crate::registry::{CareFile, Effect, Txn};
use crate::runtime::Inner;

const MAX_NOTES_LEN: usize = 2000;
const CODE_ATTEMPTS: usize = 8;

/// Cancellation reason recorded by the expiry sweep.
pub const ASSIGNMENT_TIMEOUT_REASON: &str = "assignment_timeout";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub parent_id: ParentId,
    pub child_ids: Vec<ChildId>,
    pub room: RoomNumber,
    pub window: CareWindow,
    #[serde(default)]
    pub notes: Option<String>,
}

/// All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub parent_id: Option<ParentId>,
    pub sitter_id: Option<SitterId>,
    pub date: Option<NaiveDate>,
    pub room: Option<RoomNumber>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.status.map_or(true, |s| booking.status == s)
            && self.parent_id.map_or(true, |p| booking.parent_id == p)
            && self.sitter_id.map_or(true, |s| booking.sitter_id == Some(s))
            && self.date.map_or(true, |d| booking.window.date() == d)
            && self.room.as_ref().map_or(true, |r| &booking.room == r)
    }
}

pub struct BookingManager<'a> {
    inner: &'a Inner,
}

impl<'a> BookingManager<'a> {
    pub(crate) fn new(inner: &'a Inner) -> Self {
        Self { inner }
    }

    pub fn create(&self, actor: &Actor, request: BookingRequest) -> Result<Booking, CareError> {
        if !(actor.role.is_operator() || actor.is_parent(request.parent_id)) {
            return Err(CareError::Forbidden(format!(
                "{} may not book care for parent {}",
                actor.role, request.parent_id
            )));
        }
        let policy = &self.inner.policy;
        let now = self.inner.clock.now();
        policy.check_window(&request.window, now)?;
        self.check_children(request.parent_id, &request.child_ids)?;
        let notes = normalize_notes(request.notes)?;
        let total = pricing::quote(policy, &request.window, request.child_ids.len())?;

        let mut rng = rand::thread_rng();
        for _ in 0..CODE_ATTEMPTS {
            let booking = Booking::new(
                NewBooking {
                    id: BookingId::new(),
                    confirmation_code: ConfirmationCode::generate(&mut rng),
                    room: request.room.clone(),
                    window: request.window,
                    parent_id: request.parent_id,
                    child_ids: request.child_ids.clone(),
                    total: total.clone(),
                    notes: notes.clone(),
                },
                now,
            );
            match self.inner.registry.insert(booking, *actor) {
                Ok(file) => {
                    let booking = &file.booking;
                    tracing::info!(
                        booking_id = %booking.id,
                        code = %booking.confirmation_code,
                        room = %booking.room,
                        total = %booking.total,
                        "booking created"
                    );
                    metrics::counter!("hearth_booking_transitions_total", "to" => BookingStatus::Pending.as_str())
                        .increment(1);
                    return Ok(booking.clone());
                }
                Err(CareError::Conflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(CareError::Conflict {
            entity: EntityKind::Booking,
            id: "confirmation_code".into(),
            reason: "could not allocate a unique confirmation code".into(),
        })
    }

    pub fn get(&self, actor: &Actor, booking_id: BookingId) -> Result<Booking, CareError> {
        let file = self.load(booking_id)?;
        authz::require_party(actor, &file.booking, "view")?;
        Ok(file.booking.clone())
    }

    /// Booking plus handover, session, and incidents.
    pub fn care_file(&self, actor: &Actor, booking_id: BookingId) -> Result<CareFile, CareError> {
        let file = self.load(booking_id)?;
        authz::require_party(actor, &file.booking, "view")?;
        Ok((*file).clone())
    }

    pub fn by_code(&self, actor: &Actor, code: &ConfirmationCode) -> Result<Booking, CareError> {
        let booking_id = self
            .inner
            .registry
            .booking_for_code(code)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, code))?;
        self.get(actor, booking_id)
    }

    /// Bookings visible to `actor` that match `filter`, ordered by start.
    pub fn list(&self, actor: &Actor, filter: &BookingFilter) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .inner
            .registry
            .snapshots()
            .iter()
            .map(|file| &file.booking)
            .filter(|b| authz::require_party(actor, b, "view").is_ok())
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| {
            (a.window.start(), a.created_at).cmp(&(b.window.start(), b.created_at))
        });
        bookings
    }

    /// Bind a sitter (pending → confirmed). Staff only.
    pub fn assign(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        sitter_id: SitterId,
    ) -> Result<Booking, CareError> {
        authz::require_operator(actor, "assign sitters")?;
        let calendar = &self.inner.calendar;
        let committed = self
            .inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, |txn| {
                let (now, role) = (txn.now(), txn.actor().role);
                let outcome = txn.file.booking.confirm(sitter_id, now, role)?;
                if outcome.is_applied() {
                    let booking = &txn.file.booking;
                    calendar.reserve(sitter_id, booking.id, booking.window)?;
                    txn.emit(DomainEventKind::SitterAssigned { sitter_id });
                }
                Ok(outcome)
            })
            .inspect_err(|e| rejected("assign", booking_id, e))?;
        record_transition(booking_id, &committed.value);
        Ok(committed.file.booking.clone())
    }

    /// Confirmed → in_progress. Requires a completed handover; creates the
    /// care session if finalize has not already.
    pub fn begin_care(&self, actor: &Actor, booking_id: BookingId) -> Result<Booking, CareError> {
        self.authorize(actor, booking_id, "begin care", authz::require_party)?;
        let committed = self
            .inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, begin_care_in)
            .inspect_err(|e| rejected("begin_care", booking_id, e))?;
        record_transition(booking_id, &committed.value);
        Ok(committed.file.booking.clone())
    }

    /// In_progress → completed. Requires the care session to have ended.
    pub fn complete_care(
        &self,
        actor: &Actor,
        booking_id: BookingId,
    ) -> Result<Booking, CareError> {
        self.authorize(actor, booking_id, "complete care", authz::require_party)?;
        let committed = self
            .inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, complete_in)
            .inspect_err(|e| rejected("complete_care", booking_id, e))?;
        self.inner.settle(booking_id, &committed.effects);
        record_transition(booking_id, &committed.value);
        Ok(committed.file.booking.clone())
    }

    /// Pending | confirmed → cancelled. The parent or staff may cancel.
    pub fn cancel(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        reason: &str,
    ) -> Result<Booking, CareError> {
        self.authorize(actor, booking_id, "cancel", authz::require_owner)?;
        let reason = match reason.trim() {
            "" => "cancelled on request",
            r => r,
        };
        let committed = self
            .inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, |txn| {
                cancel_in(txn, CancellationSource::Request, reason)
            })
            .inspect_err(|e| rejected("cancel", booking_id, e))?;
        self.inner.settle(booking_id, &committed.effects);
        record_transition(booking_id, &committed.value);
        Ok(committed.file.booking.clone())
    }

    /// Cancel every booking still pending past its assignment deadline.
    /// Returns the ids cancelled by this sweep.
    pub fn expire_stale(&self, actor: &Actor) -> Result<Vec<BookingId>, CareError> {
        authz::require_operator(actor, "expire bookings")?;
        let now = self.inner.clock.now();
        let policy = &self.inner.policy;
        let due: Vec<BookingId> = self
            .inner
            .registry
            .snapshots()
            .iter()
            .map(|file| &file.booking)
            .filter(|b| b.status == BookingStatus::Pending)
            .filter(|b| policy.assignment_deadline(&b.window) <= now)
            .map(|b| b.id)
            .collect();

        let mut expired = Vec::new();
        for booking_id in due {
            let result = self.inner.registry.apply(booking_id, now, *actor, |txn| {
                // Assigned since the scan.
                if txn.file.booking.status != BookingStatus::Pending {
                    return Ok(Outcome::Unchanged(txn.file.booking.status));
                }
                cancel_in(txn, CancellationSource::AssignmentTimeout, ASSIGNMENT_TIMEOUT_REASON)
            });
            match result {
                Ok(committed) => {
                    self.inner.settle(booking_id, &committed.effects);
                    if committed.value.is_applied() {
                        record_transition(booking_id, &committed.value);
                        expired.push(booking_id);
                    }
                }
                Err(e) => {
                    tracing::warn!(%booking_id, error = %e, "expiry sweep skipped booking");
                }
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired unassigned bookings");
        }
        Ok(expired)
    }

    fn load(&self, booking_id: BookingId) -> Result<std::sync::Arc<CareFile>, CareError> {
        self.inner
            .registry
            .get(booking_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, booking_id))
    }

    fn authorize(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        operation: &str,
        check: fn(&Actor, &Booking, &str) -> Result<(), CareError>,
    ) -> Result<(), CareError> {
        let file = self.load(booking_id)?;
        check(actor, &file.booking, operation)
    }

    fn check_children(&self, parent: ParentId, children: &[ChildId]) -> Result<(), CareError> {
        if children.is_empty() {
            return Err(ValidationError::NoChildren.into());
        }
        let max = self.inner.policy.max_children;
        if children.len() > max {
            return Err(ValidationError::TooManyChildren {
                count: children.len(),
                max,
            }
            .into());
        }
        let mut seen = HashSet::new();
        for child in children {
            if !seen.insert(child) {
                return Err(ValidationError::DuplicateChild(child.to_string()).into());
            }
            let known = self
                .inner
                .children
                .is_registered(parent, *child)
                .map_err(|e| CareError::Unavailable(e.to_string()))?;
            if !known {
                return Err(ValidationError::UnknownChild(child.to_string()).into());
            }
        }
        Ok(())
    }
}

fn normalize_notes(notes: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(notes) = notes else {
        return Ok(None);
    };
    let notes = notes.trim();
    if notes.is_empty() {
        return Ok(None);
    }
    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(ValidationError::FieldTooLong {
            field: "notes",
            max: MAX_NOTES_LEN,
        });
    }
    Ok(Some(notes.to_string()))
}

pub(crate) fn record_transition(booking_id: BookingId, outcome: &Outcome<BookingStatus>) {
    if let Outcome::Applied { from, to } = outcome {
        tracing::info!(%booking_id, %from, %to, "booking transition");
        metrics::counter!("hearth_booking_transitions_total", "to" => to.as_str()).increment(1);
    }
}

pub(crate) fn rejected(operation: &'static str, booking_id: BookingId, error: &CareError) {
    tracing::debug!(operation, %booking_id, code = error.code(), error = %error, "operation rejected");
}

/// Confirmed → in_progress inside an open transaction. Creates the session
/// when missing.
pub(crate) fn begin_care_in(txn: &mut Txn) -> Result<Outcome<BookingStatus>, CareError> {
    let (now, role) = (txn.now(), txn.actor().role);
    if txn.file.booking.status != BookingStatus::Confirmed {
        // Already in progress (no-op) or an invalid transition.
        return txn.file.booking.begin_care(now, role);
    }
    let booking = &txn.file.booking;
    let handover_done = txn
        .file
        .handover
        .as_ref()
        .is_some_and(HandoverRecord::is_complete);
    if !handover_done {
        return Err(precondition(booking, "begin care", "a completed trust handover"));
    }
    let sitter_id = booking
        .sitter_id
        .ok_or_else(|| precondition(booking, "begin care", "an assigned sitter"))?;
    let existing = txn.file.session.as_ref().map(|s| s.id);
    let session_id = match existing {
        Some(id) => id,
        None => {
            let session = CareSession::new(booking.id, sitter_id, booking.parent_id, now);
            let id = session.id;
            txn.file.session = Some(session);
            txn.emit(DomainEventKind::SessionCreated { session_id: id });
            id
        }
    };
    let outcome = txn.file.booking.begin_care(now, role)?;
    txn.emit(DomainEventKind::CareBegan { session_id });
    Ok(outcome)
}

/// In_progress → completed inside an open transaction.
pub(crate) fn complete_in(txn: &mut Txn) -> Result<Outcome<BookingStatus>, CareError> {
    let (now, role) = (txn.now(), txn.actor().role);
    if txn.file.booking.status != BookingStatus::InProgress {
        return txn.file.booking.complete(now, role);
    }
    let booking = &txn.file.booking;
    let session = match &txn.file.session {
        Some(s) if s.status == SessionStatus::Completed => s,
        _ => return Err(precondition(booking, "complete care", "an ended care session")),
    };
    let summary = CareSummary::of(session, booking.total.clone(), now);
    let sitter = booking.sitter_id;
    let outcome = txn.file.booking.complete(now, role)?;
    if let Some(sitter_id) = sitter {
        txn.defer(Effect::ReleaseSitter { sitter_id });
    }
    txn.emit(DomainEventKind::BookingCompleted { summary });
    Ok(outcome)
}

/// Cancel inside an open transaction, voiding an unfinished handover.
pub(crate) fn cancel_in(
    txn: &mut Txn,
    source: CancellationSource,
    reason: &str,
) -> Result<Outcome<BookingStatus>, CareError> {
    let (now, role) = (txn.now(), txn.actor().role);
    let outcome = txn.file.booking.cancel(source, reason, now, role)?;
    if !outcome.is_applied() {
        return Ok(outcome);
    }
    if let Some(handover) = txn.file.handover.as_mut() {
        if handover.void(reason, now)?.is_applied() {
            txn.emit(DomainEventKind::HandoverVoided {
                reason: reason.to_string(),
            });
        }
    }
    if let Some(sitter_id) = txn.file.booking.sitter_id {
        txn.defer(Effect::ReleaseSitter { sitter_id });
    }
    txn.emit(DomainEventKind::BookingCancelled {
        source,
        reason: reason.to_string(),
    });
    Ok(outcome)
}

fn precondition(booking: &Booking, operation: &str, requirement: &str) -> CareError {
    CareError::Precondition {
        entity: EntityKind::Booking,
        id: booking.id.to_string(),
        state: booking.status.to_string(),
        operation: operation.to_string(),
        requirement: requirement.to_string(),
    }
}
