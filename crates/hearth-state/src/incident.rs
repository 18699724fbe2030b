//! # Incident Lifecycle
//!
//! ```text
//! Open ──▶ Investigating ──▶ Resolved (terminal)
//! ```
//!
//! Status moves forward one step at a time. Severity is fixed at report
//! time; only `Critical` forces the linked session to abort, and that
//! effect is applied by the caller that owns the session.

use hearth_core::{
    Actor, BookingId, CareError, EntityKind, IncidentId, Role, SessionId, Timestamp,
    ValidationError,
};
use serde::{Deserialize, Serialize};

use crate::transition::{Outcome, TransitionRecord};

const MAX_SUMMARY_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn forces_abort(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    Injury,
    Illness,
    AllergicReaction,
    MissingChild,
    Behavioral,
    SitterConduct,
    PropertyDamage,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 3] = [Self::Open, Self::Investigating, Self::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::Resolved => "resolved",
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Open => Some(Self::Investigating),
            Self::Investigating => Some(Self::Resolved),
            Self::Resolved => None,
        }
    }

    pub fn valid_transitions(&self) -> &'static [IncidentStatus] {
        match self {
            Self::Open => &[Self::Investigating],
            Self::Investigating => &[Self::Resolved],
            Self::Resolved => &[],
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an incident report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum IncidentSubject {
    Booking(BookingId),
    Session(SessionId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub booking_id: BookingId,
    pub session_id: Option<SessionId>,
    pub severity: Severity,
    pub category: IncidentCategory,
    pub summary: String,
    pub status: IncidentStatus,
    pub reporter: Actor,
    pub reported_at: Timestamp,
    pub updated_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
    pub resolution_note: Option<String>,
    pub transitions: Vec<TransitionRecord<IncidentStatus>>,
}

impl Incident {
    /// Open a new incident. The summary must be non-empty.
    pub fn report(
        booking_id: BookingId,
        session_id: Option<SessionId>,
        severity: Severity,
        category: IncidentCategory,
        summary: &str,
        reporter: Actor,
        now: Timestamp,
    ) -> Result<Self, CareError> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(ValidationError::EmptyField("summary").into());
        }
        if summary.chars().count() > MAX_SUMMARY_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "summary",
                max: MAX_SUMMARY_LEN,
            }
            .into());
        }
        Ok(Self {
            id: IncidentId::new(),
            booking_id,
            session_id,
            severity,
            category,
            summary: summary.to_string(),
            status: IncidentStatus::Open,
            reporter,
            reported_at: now,
            updated_at: now,
            resolved_at: None,
            resolution_note: None,
            transitions: Vec::new(),
        })
    }

    /// Move to `to`. Only the next status in line is accepted; asking for
    /// the current status is a no-op.
    pub fn update_status(
        &mut self,
        to: IncidentStatus,
        note: Option<&str>,
        now: Timestamp,
        actor: Role,
    ) -> Result<Outcome<IncidentStatus>, CareError> {
        if to == self.status {
            return Ok(Outcome::Unchanged(self.status));
        }
        if self.status.next() != Some(to) {
            return Err(CareError::InvalidTransition {
                entity: EntityKind::Incident,
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        let from = self.status;
        self.transitions.push(TransitionRecord {
            from_state: from,
            to_state: to,
            timestamp: now,
            reason: note.unwrap_or_default().to_string(),
            actor,
        });
        self.status = to;
        self.updated_at = now;
        if to == IncidentStatus::Resolved {
            self.resolved_at = Some(now);
            self.resolution_note = note.map(str::to_string);
        }
        Ok(Outcome::Applied { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Timestamp {
        Timestamp::parse("2026-03-01T19:00:00Z").unwrap()
    }

    fn incident(severity: Severity) -> Incident {
        Incident::report(
            BookingId::new(),
            None,
            severity,
            IncidentCategory::Injury,
            "scraped knee",
            Actor::system(),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
        assert!(Severity::Critical.forces_abort());
        assert!(!Severity::High.forces_abort());
    }

    #[test]
    fn summary_required() {
        let err = Incident::report(
            BookingId::new(),
            None,
            Severity::Low,
            IncidentCategory::Other,
            "  ",
            Actor::system(),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn linear_status_progression() {
        let mut i = incident(Severity::Medium);
        assert_eq!(i.status, IncidentStatus::Open);
        i.update_status(IncidentStatus::Investigating, None, now(), Role::HotelStaff)
            .unwrap();
        i.update_status(IncidentStatus::Resolved, Some("ice applied"), now(), Role::HotelStaff)
            .unwrap();
        assert_eq!(i.resolved_at, Some(now()));
        assert_eq!(i.resolution_note.as_deref(), Some("ice applied"));
        assert_eq!(i.transitions.len(), 2);
    }

    #[test]
    fn cannot_skip_or_reverse() {
        let mut i = incident(Severity::Low);
        assert!(i
            .update_status(IncidentStatus::Resolved, None, now(), Role::HotelStaff)
            .is_err());
        i.update_status(IncidentStatus::Investigating, None, now(), Role::HotelStaff)
            .unwrap();
        assert!(i
            .update_status(IncidentStatus::Open, None, now(), Role::HotelStaff)
            .is_err());
        assert_eq!(i.status, IncidentStatus::Investigating);
    }

    #[test]
    fn same_status_is_noop() {
        let mut i = incident(Severity::Low);
        let o = i
            .update_status(IncidentStatus::Open, None, now(), Role::HotelStaff)
            .unwrap();
        assert!(!o.is_applied());
        assert!(i.transitions.is_empty());
    }

    #[test]
    fn subject_serializes_tagged() {
        let id = BookingId::new();
        let json = serde_json::to_value(IncidentSubject::Booking(id)).unwrap();
        assert_eq!(json["type"], "booking");
        assert_eq!(json["id"], id.to_string());
    }
}
