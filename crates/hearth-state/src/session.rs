//! # Care Session State Machine
//!
//! ```text
//! NotStarted ──start──▶ Active ──end──▶ Completed (terminal)
//!      │                  │
//!      └───────abort──────┴──▶ Aborted (terminal)
//! ```
//!
//! A session is created by handover finalization and owns its checklist
//! and activity ledger. Activity and checklist changes are only accepted
//! while `Active`. Once `ended_at` is set it never changes.
//!
//! Elapsed time is derived from `started_at` on every read.

use chrono::Duration;
use hearth_core::{
    BookingId, CareError, EntityKind, IncidentId, ParentId, Role, SessionId, SitterId, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::checklist::{Checklist, ChecklistItem};
use crate::ledger::{ActivityDraft, ActivityEvent, ActivityKind, ActivityLedger, Appended};
use crate::transition::{Outcome, TransitionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 4] = [
        Self::NotStarted,
        Self::Active,
        Self::Completed,
        Self::Aborted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    pub fn valid_transitions(&self) -> &'static [SessionStatus] {
        match self {
            Self::NotStarted => &[Self::Active, Self::Aborted],
            Self::Active => &[Self::Completed, Self::Aborted],
            Self::Completed | Self::Aborted => &[],
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortRecord {
    pub incident_id: Option<IncidentId>,
    pub reason: String,
    pub aborted_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareSession {
    pub id: SessionId,
    pub booking_id: BookingId,
    pub sitter_id: SitterId,
    pub parent_id: ParentId,
    pub status: SessionStatus,
    pub checklist: Checklist,
    /// Incidents linked to this session, in report order.
    pub emergency_log: Vec<IncidentId>,
    pub checked_in_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub abort: Option<AbortRecord>,
    pub transitions: Vec<TransitionRecord<SessionStatus>>,
    pub ledger: ActivityLedger,
}

impl CareSession {
    pub fn new(
        booking_id: BookingId,
        sitter_id: SitterId,
        parent_id: ParentId,
        now: Timestamp,
    ) -> Self {
        let id = SessionId::new();
        Self {
            id,
            booking_id,
            sitter_id,
            parent_id,
            status: SessionStatus::NotStarted,
            checklist: Checklist::new(),
            emergency_log: Vec::new(),
            checked_in_at: None,
            started_at: None,
            ended_at: None,
            created_at: now,
            abort: None,
            transitions: Vec::new(),
            ledger: ActivityLedger::new(id),
        }
    }

    /// Begin care (NOT_STARTED → ACTIVE) and log the opening check-in.
    pub fn start(&mut self, now: Timestamp, actor: Role) -> Result<Outcome<SessionStatus>, CareError> {
        match self.status {
            SessionStatus::Active => return Ok(Outcome::Unchanged(self.status)),
            SessionStatus::NotStarted => {}
            _ => return Err(self.invalid_state("start")),
        }
        let checkin = self
            .ledger
            .append(ActivityDraft::new(ActivityKind::Checkin, "Sitter checked in"), now)?;
        self.checked_in_at = Some(checkin.event.timestamp);
        self.started_at = Some(now);
        Ok(self.do_transition(SessionStatus::Active, now, actor, "care started"))
    }

    pub fn record_activity(
        &mut self,
        draft: ActivityDraft,
        now: Timestamp,
    ) -> Result<Appended, CareError> {
        self.require_active("record activity")?;
        self.ledger.append(draft, now)
    }

    /// Flip a checklist item; returns its new value.
    pub fn toggle_checklist(&mut self, item: ChecklistItem) -> Result<bool, CareError> {
        self.require_active("toggle checklist item")?;
        Ok(self.checklist.toggle(item))
    }

    /// Finish care (ACTIVE → COMPLETED).
    pub fn end(&mut self, now: Timestamp, actor: Role) -> Result<Outcome<SessionStatus>, CareError> {
        match self.status {
            SessionStatus::Completed => return Ok(Outcome::Unchanged(self.status)),
            SessionStatus::Active => {}
            _ => return Err(self.invalid_state("end")),
        }
        self.ended_at = Some(now);
        Ok(self.do_transition(SessionStatus::Completed, now, actor, "care ended"))
    }

    /// Abort (NOT_STARTED | ACTIVE → ABORTED). Terminal and immutable.
    pub fn abort(
        &mut self,
        incident_id: Option<IncidentId>,
        reason: &str,
        now: Timestamp,
        actor: Role,
    ) -> Result<Outcome<SessionStatus>, CareError> {
        match self.status {
            SessionStatus::Aborted => return Ok(Outcome::Unchanged(self.status)),
            SessionStatus::Completed => return Err(self.invalid_state("abort")),
            SessionStatus::NotStarted | SessionStatus::Active => {}
        }
        self.abort = Some(AbortRecord {
            incident_id,
            reason: reason.to_string(),
            aborted_at: now,
        });
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
        Ok(self.do_transition(SessionStatus::Aborted, now, actor, reason))
    }

    /// Link an incident. Duplicates are ignored.
    pub fn log_incident(&mut self, incident_id: IncidentId) {
        if !self.emergency_log.contains(&incident_id) {
            self.emergency_log.push(incident_id);
        }
    }

    /// Time in care: from start to end, or to `now` while active.
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::zero();
        };
        let until = self.ended_at.unwrap_or(now);
        until.since(started).max(Duration::zero())
    }

    /// Activity event ids in feed order.
    pub fn timeline(&self) -> Vec<hearth_core::ActivityEventId> {
        self.ledger.iter().map(|e| e.id).collect()
    }

    pub fn feed(&self) -> Vec<&ActivityEvent> {
        self.ledger.feed()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn require_active(&self, operation: &str) -> Result<(), CareError> {
        if self.status != SessionStatus::Active {
            return Err(self.invalid_state(operation));
        }
        Ok(())
    }

    fn invalid_state(&self, operation: &str) -> CareError {
        CareError::InvalidState {
            entity: EntityKind::Session,
            id: self.id.to_string(),
            state: self.status.to_string(),
            operation: operation.to_string(),
        }
    }

    fn do_transition(
        &mut self,
        to: SessionStatus,
        now: Timestamp,
        actor: Role,
        reason: &str,
    ) -> Outcome<SessionStatus> {
        let from = self.status;
        self.transitions.push(TransitionRecord {
            from_state: from,
            to_state: to,
            timestamp: now,
            reason: reason.to_string(),
            actor,
        });
        self.status = to;
        Outcome::Applied { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(mins: i64) -> Timestamp {
        Timestamp::parse("2026-03-01T18:00:00Z")
            .unwrap()
            .plus(Duration::minutes(mins))
    }

    fn session() -> CareSession {
        CareSession::new(BookingId::new(), SitterId::new(), ParentId::new(), t(0))
    }

    fn active() -> CareSession {
        let mut s = session();
        s.start(t(0), Role::Sitter).unwrap();
        s
    }

    #[test]
    fn start_appends_checkin_and_is_idempotent() {
        let mut s = session();
        assert!(s.start(t(0), Role::Sitter).unwrap().is_applied());
        assert_eq!(s.started_at, Some(t(0)));
        assert_eq!(s.feed().len(), 1);
        assert_eq!(s.feed()[0].kind, ActivityKind::Checkin);
        assert!(!s.start(t(5), Role::Sitter).unwrap().is_applied());
        assert_eq!(s.started_at, Some(t(0)));
        assert_eq!(s.feed().len(), 1);
    }

    #[test]
    fn activity_only_while_active() {
        let mut s = session();
        let err = s
            .record_activity(ActivityDraft::new(ActivityKind::Meal, "soup"), t(1))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");

        let mut s = active();
        s.record_activity(ActivityDraft::new(ActivityKind::Meal, "soup"), t(1))
            .unwrap();
        s.end(t(60), Role::Sitter).unwrap();
        assert_eq!(
            s.record_activity(ActivityDraft::new(ActivityKind::Nap, "zz"), t(61))
                .unwrap_err()
                .code(),
            "INVALID_STATE"
        );
        assert_eq!(s.feed().len(), 2);
    }

    #[test]
    fn end_requires_active() {
        let mut s = session();
        assert_eq!(s.end(t(1), Role::Sitter).unwrap_err().code(), "INVALID_STATE");
        let mut s = active();
        s.end(t(30), Role::Sitter).unwrap();
        assert!(!s.end(t(40), Role::Sitter).unwrap().is_applied());
        assert_eq!(s.ended_at, Some(t(30)));
    }

    #[test]
    fn aborted_session_cannot_end_or_restart() {
        let mut s = active();
        let incident = IncidentId::new();
        s.abort(Some(incident), "critical incident", t(10), Role::System)
            .unwrap();
        assert_eq!(s.status, SessionStatus::Aborted);
        assert_eq!(s.abort.as_ref().unwrap().incident_id, Some(incident));
        assert_eq!(s.end(t(20), Role::Sitter).unwrap_err().code(), "INVALID_STATE");
        assert_eq!(s.start(t(20), Role::Sitter).unwrap_err().code(), "INVALID_STATE");
        assert!(!s.abort(None, "again", t(30), Role::System).unwrap().is_applied());
        assert_eq!(s.ended_at, Some(t(10)));
    }

    #[test]
    fn completed_session_cannot_be_aborted() {
        let mut s = active();
        s.end(t(30), Role::Sitter).unwrap();
        assert!(s.abort(None, "late", t(31), Role::System).is_err());
        assert_eq!(s.status, SessionStatus::Completed);
    }

    #[test]
    fn not_started_session_can_abort() {
        let mut s = session();
        s.abort(None, "critical", t(1), Role::System).unwrap();
        assert_eq!(s.elapsed(t(50)), Duration::zero());
    }

    #[test]
    fn elapsed_is_derived() {
        let s = active();
        assert_eq!(s.elapsed(t(45)), Duration::minutes(45));
        assert_eq!(s.elapsed(t(90)), Duration::minutes(90));
        let mut s = active();
        s.end(t(30), Role::Sitter).unwrap();
        assert_eq!(s.elapsed(t(500)), Duration::minutes(30));
        assert_eq!(session().elapsed(t(10)), Duration::zero());
    }

    #[test]
    fn elapsed_clamps_clock_skew() {
        let s = active();
        assert_eq!(s.elapsed(t(-5)), Duration::zero());
    }

    #[test]
    fn checklist_only_while_active() {
        let mut s = session();
        assert!(s.toggle_checklist(ChecklistItem::SuppliesReady).is_err());
        let mut s = active();
        assert!(s.toggle_checklist(ChecklistItem::SuppliesReady).unwrap());
        assert!(s.checklist.is_checked(ChecklistItem::SuppliesReady));
    }

    #[test]
    fn incident_log_dedupes() {
        let mut s = active();
        let id = IncidentId::new();
        s.log_incident(id);
        s.log_incident(id);
        assert_eq!(s.emergency_log, vec![id]);
    }
}
