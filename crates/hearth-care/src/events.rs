//! # Domain Events
//!
//! Every committed change to a care file emits one or more events. They
//! travel through the outbox to the notification dispatcher and double as
//! the change log for the record repository.

use std::collections::BTreeMap;

use hearth_core::{
    ActivityEventId, BookingId, IncidentId, Money, ParentId, Role, SessionId, SitterId, Timestamp,
};
use hearth_state::{
    ActivityKind, CancellationSource, CareSession, ChecklistItem, HandoverStep, IncidentCategory,
    IncidentStatus, Severity, SignatureParty,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub booking_id: BookingId,
    pub occurred_at: Timestamp,
    pub actor: Role,
    #[serde(flatten)]
    pub kind: DomainEventKind,
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Closing summary of a completed booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareSummary {
    pub session_id: SessionId,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub elapsed_minutes: i64,
    pub billed: Money,
    pub activity_counts: BTreeMap<ActivityKind, usize>,
    pub incident_count: usize,
    pub checklist_complete: bool,
}

impl CareSummary {
    pub fn of(session: &CareSession, billed: Money, now: Timestamp) -> Self {
        Self {
            session_id: session.id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            elapsed_minutes: session.elapsed(now).num_minutes(),
            billed,
            activity_counts: session.ledger.count_by_kind(),
            incident_count: session.emergency_log.len(),
            checklist_complete: session.checklist.is_ready(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEventKind {
    BookingCreated {
        parent_id: ParentId,
        total: Money,
    },
    SitterAssigned {
        sitter_id: SitterId,
    },
    CareBegan {
        session_id: SessionId,
    },
    BookingCompleted {
        summary: CareSummary,
    },
    BookingCancelled {
        source: CancellationSource,
        reason: String,
    },
    HandoverOpened,
    HandoverUpdated {
        step: HandoverStep,
        field: String,
    },
    SignatureAttached {
        party: SignatureParty,
    },
    HandoverStepChanged {
        from: HandoverStep,
        to: HandoverStep,
    },
    HandoverFinalized,
    HandoverVoided {
        reason: String,
    },
    SessionCreated {
        session_id: SessionId,
    },
    SessionStarted {
        session_id: SessionId,
    },
    ActivityRecorded {
        session_id: SessionId,
        event_id: ActivityEventId,
        kind: ActivityKind,
    },
    ChecklistToggled {
        session_id: SessionId,
        item: ChecklistItem,
        checked: bool,
    },
    SessionEnded {
        session_id: SessionId,
        elapsed_minutes: i64,
    },
    SessionAborted {
        session_id: SessionId,
        incident_id: Option<IncidentId>,
    },
    IncidentReported {
        incident_id: IncidentId,
        severity: Severity,
        category: IncidentCategory,
    },
    IncidentStatusChanged {
        incident_id: IncidentId,
        from: IncidentStatus,
        to: IncidentStatus,
    },
    EmergencyFlagged {
        incident_id: IncidentId,
    },
}

impl DomainEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BookingCreated { .. } => "booking_created",
            Self::SitterAssigned { .. } => "sitter_assigned",
            Self::CareBegan { .. } => "care_began",
            Self::BookingCompleted { .. } => "booking_completed",
            Self::BookingCancelled { .. } => "booking_cancelled",
            Self::HandoverOpened => "handover_opened",
            Self::HandoverUpdated { .. } => "handover_updated",
            Self::SignatureAttached { .. } => "signature_attached",
            Self::HandoverStepChanged { .. } => "handover_step_changed",
            Self::HandoverFinalized => "handover_finalized",
            Self::HandoverVoided { .. } => "handover_voided",
            Self::SessionCreated { .. } => "session_created",
            Self::SessionStarted { .. } => "session_started",
            Self::ActivityRecorded { .. } => "activity_recorded",
            Self::ChecklistToggled { .. } => "checklist_toggled",
            Self::SessionEnded { .. } => "session_ended",
            Self::SessionAborted { .. } => "session_aborted",
            Self::IncidentReported { .. } => "incident_reported",
            Self::IncidentStatusChanged { .. } => "incident_status_changed",
            Self::EmergencyFlagged { .. } => "emergency_flagged",
        }
    }
}
