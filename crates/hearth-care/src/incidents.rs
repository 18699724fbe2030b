//! # Incident and Escalation Tracker
//!
//! Records incidents against a booking or its session and escalates
//! critical ones. Within the reporting commit:
//!
//! - the incident is linked to the session's emergency log;
//! - an active session gets an `incident` activity so the parent's feed
//!   shows it in order;
//! - a `critical` incident aborts a session that has not ended, raises
//!   the booking's emergency flag, and frees the sitter's calendar.
//!
//! The incident activity is appended before the abort, while the session
//! still accepts activities.

use hearth_core::{Actor, BookingId, CareError, EntityKind, IncidentId, SessionId};
use hearth_state::{
    ActivityDraft, ActivityKind, EmergencyFlag, Incident, IncidentCategory, IncidentStatus,
    IncidentSubject, Outcome, SessionStatus, Severity,
};
use serde::{Deserialize, Serialize};

use crate::authz;
use crate::bookings::rejected;
use crate::events::DomainEventKind;
use crate::registry::Txn;
use crate::runtime::Inner;
use crate::sessions::{abort_in, session_mut};

const CRITICAL_ABORT_REASON: &str = "critical incident";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub subject: IncidentSubject,
    pub severity: Severity,
    pub category: IncidentCategory,
    pub summary: String,
}

pub struct IncidentTracker<'a> {
    inner: &'a Inner,
}

impl<'a> IncidentTracker<'a> {
    pub(crate) fn new(inner: &'a Inner) -> Self {
        Self { inner }
    }

    pub fn report(&self, actor: &Actor, report: IncidentReport) -> Result<Incident, CareError> {
        let booking_id = match report.subject {
            IncidentSubject::Booking(id) => id,
            IncidentSubject::Session(session_id) => self
                .inner
                .registry
                .booking_for_session(session_id)
                .ok_or_else(|| CareError::not_found(EntityKind::Session, session_id))?,
        };
        let file = self
            .inner
            .registry
            .get(booking_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, booking_id))?;
        authz::require_party(actor, &file.booking, "report incidents")?;

        let committed = self
            .inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, |txn| {
                report_in(txn, &report)
            })
            .inspect_err(|e| rejected("report_incident", booking_id, e))?;
        self.inner.settle(booking_id, &committed.effects);
        let incident = committed.value;

        metrics::counter!("hearth_incidents_reported_total", "severity" => incident.severity.as_str())
            .increment(1);
        if incident.severity.forces_abort() {
            tracing::warn!(
                incident_id = %incident.id,
                %booking_id,
                session_id = ?incident.session_id,
                "critical incident escalated"
            );
        } else {
            tracing::info!(
                incident_id = %incident.id,
                %booking_id,
                severity = %incident.severity,
                "incident reported"
            );
        }
        Ok(incident)
    }

    /// Advance an incident (open → investigating → resolved). Staff only.
    pub fn update_status(
        &self,
        actor: &Actor,
        incident_id: IncidentId,
        to: IncidentStatus,
        note: Option<&str>,
    ) -> Result<Incident, CareError> {
        authz::require_operator(actor, "update incident status")?;
        let booking_id = self.booking_of(incident_id)?;
        let committed = self
            .inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, |txn| {
                let (now, role) = (txn.now(), txn.actor().role);
                let incident = txn
                    .file
                    .incident_mut(incident_id)
                    .ok_or_else(|| CareError::not_found(EntityKind::Incident, incident_id))?;
                let outcome = incident.update_status(to, note, now, role)?;
                let updated = incident.clone();
                if let Outcome::Applied { from, to } = outcome {
                    txn.emit(DomainEventKind::IncidentStatusChanged {
                        incident_id,
                        from,
                        to,
                    });
                }
                Ok(updated)
            })
            .inspect_err(|e| rejected("update_incident_status", booking_id, e))?;
        tracing::info!(%incident_id, status = %committed.value.status, "incident status updated");
        Ok(committed.value)
    }

    pub fn get(&self, actor: &Actor, incident_id: IncidentId) -> Result<Incident, CareError> {
        let booking_id = self.booking_of(incident_id)?;
        let file = self
            .inner
            .registry
            .get(booking_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, booking_id))?;
        authz::require_party(actor, &file.booking, "view incidents")?;
        file.incident(incident_id)
            .cloned()
            .ok_or_else(|| CareError::not_found(EntityKind::Incident, incident_id))
    }

    /// Incidents on a booking, oldest first.
    pub fn list_for_booking(
        &self,
        actor: &Actor,
        booking_id: BookingId,
    ) -> Result<Vec<Incident>, CareError> {
        let file = self
            .inner
            .registry
            .get(booking_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, booking_id))?;
        authz::require_party(actor, &file.booking, "view incidents")?;
        Ok(file.incidents.clone())
    }

    fn booking_of(&self, incident_id: IncidentId) -> Result<BookingId, CareError> {
        self.inner
            .registry
            .booking_for_incident(incident_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Incident, incident_id))
    }
}

fn report_in(txn: &mut Txn, report: &IncidentReport) -> Result<Incident, CareError> {
    let (now, actor) = (txn.now(), txn.actor());
    if let IncidentSubject::Session(session_id) = report.subject {
        session_mut(txn, session_id)?;
    }
    let booking_id = txn.file.booking.id;
    let session_id: Option<SessionId> = txn.file.session.as_ref().map(|s| s.id);
    let incident = Incident::report(
        booking_id,
        session_id,
        report.severity,
        report.category,
        &report.summary,
        actor,
        now,
    )?;
    let incident_id = incident.id;
    txn.emit(DomainEventKind::IncidentReported {
        incident_id,
        severity: incident.severity,
        category: incident.category,
    });

    if let Some(session) = txn.file.session.as_mut() {
        session.log_incident(incident_id);
        if session.status == SessionStatus::Active {
            let mut draft = ActivityDraft::new(ActivityKind::Incident, incident.summary.clone());
            draft.subtext = Some(format!("{} severity", incident.severity));
            let appended = session.record_activity(draft, now)?;
            let sid = session.id;
            txn.emit(DomainEventKind::ActivityRecorded {
                session_id: sid,
                event_id: appended.event.id,
                kind: ActivityKind::Incident,
            });
        }
    }

    if incident.severity.forces_abort() {
        abort_in(txn, incident_id, CRITICAL_ABORT_REASON)?;
        let flag = EmergencyFlag {
            incident_id,
            raised_at: now,
            summary: incident.summary.clone(),
        };
        if txn.file.booking.flag_emergency(flag, now) {
            txn.emit(DomainEventKind::EmergencyFlagged { incident_id });
        }
    }

    txn.file.incidents.push(incident.clone());
    Ok(incident)
}
