//! Cross-record invariant checks.
//!
//! Run against quiescent state (tests, periodic health checks). A commit
//! that releases a sitter settles the calendar just after the snapshot
//! swap, so an audit racing live traffic may briefly report a stale
//! reservation.

use std::collections::HashSet;
use std::sync::Arc;

use hearth_core::BookingId;
use hearth_state::{BookingStatus, HandoverStatus, SessionStatus, Severity};
use serde::Serialize;

use crate::calendar::SitterCalendar;
use crate::registry::CareFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub booking_id: BookingId,
    pub message: String,
}

pub fn audit_all(files: &[Arc<CareFile>], calendar: &SitterCalendar) -> Vec<Violation> {
    let mut violations = Vec::new();
    for file in files {
        for message in audit_file(file) {
            violations.push(Violation {
                booking_id: file.booking.id,
                message,
            });
        }
        let booking = &file.booking;
        if let Some(sitter) = booking.sitter_id {
            let held = calendar
                .reservations(sitter)
                .iter()
                .any(|r| r.booking_id == booking.id);
            let aborted = file
                .session
                .as_ref()
                .is_some_and(|s| s.status == SessionStatus::Aborted);
            let should_hold = match booking.status {
                BookingStatus::Confirmed => true,
                BookingStatus::InProgress => !aborted,
                _ => false,
            };
            if held != should_hold {
                violations.push(Violation {
                    booking_id: booking.id,
                    message: format!(
                        "sitter reservation {} for {} booking",
                        if held { "held" } else { "missing" },
                        booking.status
                    ),
                });
            }
        }
    }
    violations
}

/// Invariant violations within a single care file.
pub fn audit_file(file: &CareFile) -> Vec<String> {
    let mut out = Vec::new();
    let booking = &file.booking;
    let handover_complete = file
        .handover
        .as_ref()
        .is_some_and(|h| h.status == HandoverStatus::Complete);

    if booking.status.requires_sitter() && booking.sitter_id.is_none() {
        out.push(format!("{} booking has no sitter", booking.status));
    }
    if matches!(
        booking.status,
        BookingStatus::InProgress | BookingStatus::Completed
    ) {
        if !handover_complete {
            out.push(format!("{} booking without a completed handover", booking.status));
        }
        if file.session.is_none() {
            out.push(format!("{} booking without a care session", booking.status));
        }
    }
    if booking.status == BookingStatus::Cancelled {
        if let Some(h) = &file.handover {
            if h.status != HandoverStatus::Void {
                out.push(format!("cancelled booking has a {} handover", h.status.as_str()));
            }
        }
    }

    if let Some(session) = &file.session {
        if !handover_complete {
            out.push("care session exists before handover completed".into());
        }
        if booking.status == BookingStatus::Completed && session.status != SessionStatus::Completed
        {
            out.push(format!(
                "completed booking has a {} session",
                session.status.as_str()
            ));
        }
        if !session.ledger.is_well_ordered() {
            out.push("activity ledger out of order".into());
        }
        if session.started_at.is_some() && session.ledger.is_empty() {
            out.push("started session has no check-in".into());
        }
        let known: HashSet<_> = file.incidents.iter().map(|i| i.id).collect();
        if session.emergency_log.iter().any(|id| !known.contains(id)) {
            out.push("emergency log references an unknown incident".into());
        }
    }

    for incident in file
        .incidents
        .iter()
        .filter(|i| i.severity == Severity::Critical)
    {
        if !booking.has_emergency() {
            out.push(format!("critical incident {} without emergency flag", incident.id));
        }
        // Only incidents raised against the session bind it.
        let Some(session) = file
            .session
            .as_ref()
            .filter(|s| incident.session_id == Some(s.id))
        else {
            continue;
        };
        let ended_before = session.status == SessionStatus::Completed
            && session.ended_at.is_some_and(|t| t <= incident.reported_at);
        if !ended_before && session.status != SessionStatus::Aborted {
            out.push(format!(
                "critical incident {} left the session {}",
                incident.id,
                session.status.as_str()
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{
        CareWindow, ChildId, ConfirmationCode, Money, ParentId, Role, RoomNumber, SitterId,
        Timestamp,
    };
    use hearth_state::{Booking, CareSession, NewBooking};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn file() -> CareFile {
        CareFile::new(Booking::new(
            NewBooking {
                id: BookingId::new(),
                confirmation_code: ConfirmationCode::new("HX-AAAA-BBBB").unwrap(),
                room: RoomNumber::new("1204").unwrap(),
                window: CareWindow::new(ts("2026-03-01T18:00:00Z"), ts("2026-03-01T21:00:00Z"))
                    .unwrap(),
                parent_id: ParentId::new(),
                child_ids: vec![ChildId::new()],
                total: Money::new(7500, "USD").unwrap(),
                notes: None,
            },
            ts("2026-03-01T12:00:00Z"),
        ))
    }

    #[test]
    fn fresh_booking_is_clean() {
        assert!(audit_file(&file()).is_empty());
    }

    #[test]
    fn session_without_handover_flagged() {
        let mut f = file();
        let sitter = SitterId::new();
        f.booking
            .confirm(sitter, ts("2026-03-01T13:00:00Z"), Role::HotelStaff)
            .unwrap();
        f.session = Some(CareSession::new(
            f.booking.id,
            sitter,
            f.booking.parent_id,
            ts("2026-03-01T17:00:00Z"),
        ));
        let violations = audit_file(&f);
        assert!(violations
            .iter()
            .any(|v| v.contains("before handover completed")));
    }

    #[test]
    fn session_aborted_before_start_needs_no_checkin() {
        let mut f = file();
        let sitter = SitterId::new();
        let mut session =
            CareSession::new(f.booking.id, sitter, f.booking.parent_id, ts("2026-03-01T17:00:00Z"));
        session
            .abort(None, "critical incident", ts("2026-03-01T17:30:00Z"), Role::System)
            .unwrap();
        f.session = Some(session);
        assert!(!audit_file(&f).iter().any(|v| v.contains("check-in")));
    }

    #[test]
    fn stale_reservation_flagged() {
        let mut f = file();
        let sitter = SitterId::new();
        f.booking
            .confirm(sitter, ts("2026-03-01T13:00:00Z"), Role::HotelStaff)
            .unwrap();
        let calendar = SitterCalendar::new();
        let files = vec![Arc::new(f.clone())];
        let missing = audit_all(&files, &calendar);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("missing"));

        calendar.reserve(sitter, f.booking.id, f.booking.window).unwrap();
        assert!(audit_all(&files, &calendar).is_empty());
    }
}
