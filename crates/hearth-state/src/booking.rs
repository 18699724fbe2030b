//! # Booking Lifecycle State Machine
//!
//! ## States
//!
//! ```text
//! Pending ──▶ Confirmed ──▶ InProgress ──▶ Completed (terminal)
//!    │            │
//!    └────────────┴──▶ Cancelled (terminal)
//! ```
//!
//! - `Pending → Confirmed` binds a sitter.
//! - `Confirmed → InProgress` happens when the trust handover completes.
//! - `InProgress → Completed` happens when the care session ends.
//! - Cancellation is only possible before care begins.
//!
//! The emergency flag is orthogonal to status. A critical incident raises
//! it without changing status, so a completed booking can still carry an
//! emergency.

use hearth_core::{
    BookingId, CareError, CareWindow, ChildId, ConfirmationCode, EntityKind, IncidentId, Money,
    ParentId, Role, RoomNumber, SitterId, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::transition::{Outcome, TransitionRecord};

// ─── Booking Status ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting sitter assignment.
    Pending,
    /// Sitter assigned, handover not yet complete.
    Confirmed,
    /// Handover complete; care is underway.
    InProgress,
    /// Care session ended (terminal).
    Completed,
    /// Cancelled before care began (terminal).
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// States directly reachable from this one.
    pub fn valid_transitions(&self) -> &'static [BookingStatus] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Completed],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    /// Whether a sitter must already be bound in this state.
    pub fn requires_sitter(&self) -> bool {
        matches!(self, Self::Confirmed | Self::InProgress | Self::Completed)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Flags and records ───────────────────────────────────────────────

/// Hotel-visible emergency raised by a critical incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyFlag {
    pub incident_id: IncidentId,
    pub raised_at: Timestamp,
    pub summary: String,
}

/// Why a booking was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationSource {
    /// A parent or staff member asked for it.
    Request,
    /// No sitter was assigned before the cutoff.
    AssignmentTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub source: CancellationSource,
    pub reason: String,
    pub cancelled_at: Timestamp,
    pub cancelled_by: Role,
}

/// Validated inputs for a new booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub id: BookingId,
    pub confirmation_code: ConfirmationCode,
    pub room: RoomNumber,
    pub window: CareWindow,
    pub parent_id: ParentId,
    pub child_ids: Vec<ChildId>,
    pub total: Money,
    pub notes: Option<String>,
}

// ─── Booking ─────────────────────────────────────────────────────────

/// A booking with its lifecycle state and transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub confirmation_code: ConfirmationCode,
    pub room: RoomNumber,
    pub window: CareWindow,
    pub parent_id: ParentId,
    pub child_ids: Vec<ChildId>,
    pub sitter_id: Option<SitterId>,
    pub status: BookingStatus,
    pub total: Money,
    pub notes: Option<String>,
    pub emergency: Option<EmergencyFlag>,
    pub cancellation: Option<Cancellation>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub transitions: Vec<TransitionRecord<BookingStatus>>,
}

impl Booking {
    /// Create a booking in `Pending`.
    pub fn new(params: NewBooking, now: Timestamp) -> Self {
        Self {
            id: params.id,
            confirmation_code: params.confirmation_code,
            room: params.room,
            window: params.window,
            parent_id: params.parent_id,
            child_ids: params.child_ids,
            sitter_id: None,
            status: BookingStatus::Pending,
            total: params.total,
            notes: params.notes,
            emergency: None,
            cancellation: None,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        }
    }

    /// Bind a sitter (PENDING → CONFIRMED).
    ///
    /// Repeating the call with the same sitter is a no-op. A different
    /// sitter on a confirmed booking is rejected.
    pub fn confirm(
        &mut self,
        sitter: SitterId,
        now: Timestamp,
        actor: Role,
    ) -> Result<Outcome<BookingStatus>, CareError> {
        if self.status == BookingStatus::Confirmed && self.sitter_id == Some(sitter) {
            return Ok(Outcome::Unchanged(self.status));
        }
        self.require_state(BookingStatus::Pending, BookingStatus::Confirmed)?;
        self.sitter_id = Some(sitter);
        Ok(self.do_transition(BookingStatus::Confirmed, now, actor, "sitter assigned"))
    }

    /// Start care (CONFIRMED → IN_PROGRESS).
    ///
    /// The handover guard is checked by the caller, which owns the
    /// handover record.
    pub fn begin_care(
        &mut self,
        now: Timestamp,
        actor: Role,
    ) -> Result<Outcome<BookingStatus>, CareError> {
        if self.status == BookingStatus::InProgress {
            return Ok(Outcome::Unchanged(self.status));
        }
        self.require_state(BookingStatus::Confirmed, BookingStatus::InProgress)?;
        Ok(self.do_transition(BookingStatus::InProgress, now, actor, "handover complete"))
    }

    /// Close out (IN_PROGRESS → COMPLETED).
    pub fn complete(
        &mut self,
        now: Timestamp,
        actor: Role,
    ) -> Result<Outcome<BookingStatus>, CareError> {
        if self.status == BookingStatus::Completed {
            return Ok(Outcome::Unchanged(self.status));
        }
        self.require_state(BookingStatus::InProgress, BookingStatus::Completed)?;
        Ok(self.do_transition(BookingStatus::Completed, now, actor, "care session ended"))
    }

    /// Cancel (PENDING | CONFIRMED → CANCELLED).
    pub fn cancel(
        &mut self,
        source: CancellationSource,
        reason: &str,
        now: Timestamp,
        actor: Role,
    ) -> Result<Outcome<BookingStatus>, CareError> {
        if self.status == BookingStatus::Cancelled {
            return Ok(Outcome::Unchanged(self.status));
        }
        if !matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(self.invalid(BookingStatus::Cancelled));
        }
        self.cancellation = Some(Cancellation {
            source,
            reason: reason.to_string(),
            cancelled_at: now,
            cancelled_by: actor,
        });
        Ok(self.do_transition(BookingStatus::Cancelled, now, actor, reason))
    }

    /// Raise the emergency flag. Keeps the first flag; returns whether
    /// this call raised it.
    pub fn flag_emergency(&mut self, flag: EmergencyFlag, now: Timestamp) -> bool {
        if self.emergency.is_some() {
            return false;
        }
        self.emergency = Some(flag);
        self.updated_at = now;
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_emergency(&self) -> bool {
        self.emergency.is_some()
    }

    fn invalid(&self, to: BookingStatus) -> CareError {
        CareError::InvalidTransition {
            entity: EntityKind::Booking,
            id: self.id.to_string(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    fn require_state(&self, expected: BookingStatus, to: BookingStatus) -> Result<(), CareError> {
        if self.status != expected {
            return Err(self.invalid(to));
        }
        Ok(())
    }

    fn do_transition(
        &mut self,
        to: BookingStatus,
        now: Timestamp,
        actor: Role,
        reason: &str,
    ) -> Outcome<BookingStatus> {
        let from = self.status;
        self.transitions.push(TransitionRecord {
            from_state: from,
            to_state: to,
            timestamp: now,
            reason: reason.to_string(),
            actor,
        });
        self.status = to;
        self.updated_at = now;
        Outcome::Applied { from, to }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> Timestamp {
        Timestamp::parse("2026-03-01T12:00:00Z").unwrap()
    }

    fn make_booking() -> Booking {
        let start = now().plus(Duration::hours(30));
        Booking::new(
            NewBooking {
                id: BookingId::new(),
                confirmation_code: ConfirmationCode::new("HX-ABCD-EFGH").unwrap(),
                room: RoomNumber::new("1204").unwrap(),
                window: CareWindow::new(start, start.plus(Duration::hours(4))).unwrap(),
                parent_id: ParentId::new(),
                child_ids: vec![ChildId::new()],
                total: Money::new(10_000, "USD").unwrap(),
                notes: None,
            },
            now(),
        )
    }

    fn confirmed() -> (Booking, SitterId) {
        let mut b = make_booking();
        let sitter = SitterId::new();
        b.confirm(sitter, now(), Role::HotelStaff).unwrap();
        (b, sitter)
    }

    #[test]
    fn new_booking_is_pending_without_sitter() {
        let b = make_booking();
        assert_eq!(b.status, BookingStatus::Pending);
        assert!(b.sitter_id.is_none());
        assert!(b.transitions.is_empty());
    }

    #[test]
    fn happy_path_records_every_transition() {
        let (mut b, sitter) = confirmed();
        assert_eq!(b.sitter_id, Some(sitter));
        b.begin_care(now(), Role::Parent).unwrap();
        b.complete(now(), Role::Sitter).unwrap();
        assert_eq!(b.status, BookingStatus::Completed);
        let path: Vec<_> = b.transitions.iter().map(|t| t.to_state).collect();
        assert_eq!(
            path,
            vec![
                BookingStatus::Confirmed,
                BookingStatus::InProgress,
                BookingStatus::Completed
            ]
        );
    }

    #[test]
    fn confirm_same_sitter_is_noop() {
        let (mut b, sitter) = confirmed();
        let outcome = b.confirm(sitter, now(), Role::HotelStaff).unwrap();
        assert_eq!(outcome, Outcome::Unchanged(BookingStatus::Confirmed));
        assert_eq!(b.transitions.len(), 1);
    }

    #[test]
    fn confirm_different_sitter_rejected() {
        let (mut b, sitter) = confirmed();
        let err = b.confirm(SitterId::new(), now(), Role::HotelStaff).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(b.sitter_id, Some(sitter));
    }

    #[test]
    fn cannot_skip_confirmed() {
        let mut b = make_booking();
        assert!(b.begin_care(now(), Role::Parent).is_err());
        assert!(b.complete(now(), Role::Parent).is_err());
        assert_eq!(b.status, BookingStatus::Pending);
    }

    #[test]
    fn cancel_from_pending_and_confirmed() {
        let mut b = make_booking();
        b.cancel(CancellationSource::Request, "plans changed", now(), Role::Parent)
            .unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
        let c = b.cancellation.clone().unwrap();
        assert_eq!(c.reason, "plans changed");
        assert_eq!(c.cancelled_by, Role::Parent);

        let (mut b2, _) = confirmed();
        b2.cancel(CancellationSource::Request, "x", now(), Role::HotelStaff)
            .unwrap();
        assert!(b2.is_terminal());
    }

    #[test]
    fn cancel_in_progress_rejected_and_status_unchanged() {
        let (mut b, _) = confirmed();
        b.begin_care(now(), Role::Parent).unwrap();
        let err = b
            .cancel(CancellationSource::Request, "x", now(), Role::Parent)
            .unwrap_err();
        match err {
            CareError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "in_progress");
                assert_eq!(to, "cancelled");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        assert_eq!(b.status, BookingStatus::InProgress);
        assert!(b.cancellation.is_none());
    }

    #[test]
    fn repeated_transitions_are_noops() {
        let (mut b, _) = confirmed();
        b.begin_care(now(), Role::Parent).unwrap();
        assert!(!b.begin_care(now(), Role::Parent).unwrap().is_applied());
        b.complete(now(), Role::Sitter).unwrap();
        assert!(!b.complete(now(), Role::Sitter).unwrap().is_applied());
        assert_eq!(b.transitions.len(), 3);

        let mut c = make_booking();
        c.cancel(CancellationSource::Request, "a", now(), Role::Parent).unwrap();
        assert!(!c
            .cancel(CancellationSource::Request, "b", now(), Role::Parent)
            .unwrap()
            .is_applied());
        assert_eq!(c.cancellation.unwrap().reason, "a");
    }

    #[test]
    fn emergency_flag_keeps_first() {
        let (mut b, _) = confirmed();
        let first = IncidentId::new();
        assert!(b.flag_emergency(
            EmergencyFlag {
                incident_id: first,
                raised_at: now(),
                summary: "fall".into(),
            },
            now()
        ));
        assert!(!b.flag_emergency(
            EmergencyFlag {
                incident_id: IncidentId::new(),
                raised_at: now(),
                summary: "second".into(),
            },
            now()
        ));
        assert_eq!(b.emergency.unwrap().incident_id, first);
        assert_eq!(b.status, BookingStatus::Confirmed);
    }

    #[test]
    fn valid_transitions_table() {
        assert!(BookingStatus::Completed.valid_transitions().is_empty());
        assert!(BookingStatus::Cancelled.valid_transitions().is_empty());
        assert!(BookingStatus::Pending
            .valid_transitions()
            .contains(&BookingStatus::Cancelled));
        assert!(!BookingStatus::InProgress
            .valid_transitions()
            .contains(&BookingStatus::Cancelled));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&BookingStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
