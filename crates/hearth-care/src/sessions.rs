//! # Session Controller
//!
//! Runs the live care session created by handover finalization: start
//! (which logs the check-in), activity and photo updates, checklist
//! toggles, the parent-facing feed, and end. Ending the session also
//! completes the booking in the same commit.
//!
//! Sessions are addressed by [`SessionId`] and resolved to their booking's
//! care file through the registry index.

use std::sync::Arc;

use chrono::Duration;
use hearth_core::{Actor, BookingId, CareError, EntityKind, IncidentId, SessionId, ValidationError};
use hearth_state::{
    ActivityDraft, ActivityEvent, ActivityKind, Booking, CareSession, ChecklistItem, Mood, Outcome,
    SessionStatus,
};
use serde::{Deserialize, Serialize};

use crate::authz;
use crate::bookings::{complete_in, record_transition, rejected};
use crate::events::DomainEventKind;
use crate::ports::ArtifactKind;
use crate::registry::{CareFile, Committed, Effect, Txn};
use crate::runtime::Inner;

pub const DEFAULT_FEED_LIMIT: usize = 50;
pub const MAX_FEED_LIMIT: usize = 200;

type AuthCheck = fn(&Actor, &Booking, &str) -> Result<(), CareError>;

/// One page of the activity feed. Pass `cursor` back as `since` to fetch
/// the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub events: Vec<ActivityEvent>,
    pub cursor: u64,
    pub has_more: bool,
}

pub struct SessionController<'a> {
    inner: &'a Inner,
}

impl<'a> SessionController<'a> {
    pub(crate) fn new(inner: &'a Inner) -> Self {
        Self { inner }
    }

    pub fn get(&self, actor: &Actor, session_id: SessionId) -> Result<CareSession, CareError> {
        let (_, file) = self.locate(actor, session_id, "view session", authz::require_party)?;
        session_of(&file, session_id).cloned()
    }

    /// not_started → active, logging the check-in.
    pub fn start(&self, actor: &Actor, session_id: SessionId) -> Result<CareSession, CareError> {
        let committed = self.apply(actor, session_id, "start session", authz::require_sitter, |txn| {
            let (now, role) = (txn.now(), txn.actor().role);
            let session = session_mut(txn, session_id)?;
            let outcome = session.start(now, role)?;
            if outcome.is_applied() {
                let checkin = session.ledger.first().map(|e| e.id);
                txn.emit(DomainEventKind::SessionStarted { session_id });
                if let Some(event_id) = checkin {
                    txn.emit(DomainEventKind::ActivityRecorded {
                        session_id,
                        event_id,
                        kind: ActivityKind::Checkin,
                    });
                }
            }
            Ok(outcome)
        })?;
        if committed.value.is_applied() {
            tracing::info!(%session_id, "care session started");
            metrics::counter!("hearth_activity_events_total", "kind" => ActivityKind::Checkin.as_str())
                .increment(1);
        }
        session_of(&committed.file, session_id).cloned()
    }

    /// Append to the activity ledger. A repeated check-in returns the
    /// original event.
    pub fn record_activity(
        &self,
        actor: &Actor,
        session_id: SessionId,
        draft: ActivityDraft,
    ) -> Result<ActivityEvent, CareError> {
        let committed = self.apply(actor, session_id, "record activity", authz::require_sitter, |txn| {
            let now = txn.now();
            let appended = session_mut(txn, session_id)?.record_activity(draft, now)?;
            if appended.created {
                txn.emit(DomainEventKind::ActivityRecorded {
                    session_id,
                    event_id: appended.event.id,
                    kind: appended.event.kind,
                });
            }
            Ok(appended)
        })?;
        let appended = committed.value;
        if appended.created {
            tracing::info!(
                %session_id,
                kind = %appended.event.kind,
                sequence = appended.event.sequence,
                clock_adjusted = appended.event.clock_adjusted,
                "activity recorded"
            );
            metrics::counter!("hearth_activity_events_total", "kind" => appended.event.kind.as_str())
                .increment(1);
        }
        Ok(appended.event)
    }

    /// Store a photo in the artifact store and record it as a `photo` event.
    pub fn upload_photo(
        &self,
        actor: &Actor,
        session_id: SessionId,
        content_type: &str,
        bytes: &[u8],
        caption: &str,
        mood: Option<Mood>,
    ) -> Result<ActivityEvent, CareError> {
        if bytes.is_empty() {
            return Err(ValidationError::EmptyField("photo").into());
        }
        // Fail before uploading if the caller cannot post here.
        self.locate(actor, session_id, "record activity", authz::require_sitter)?;
        let media = self
            .inner
            .artifacts
            .put(ArtifactKind::Photo, content_type, bytes)
            .map_err(|e| CareError::Unavailable(e.to_string()))?;
        let mut draft = ActivityDraft::new(ActivityKind::Photo, caption).with_media(media);
        if let Some(mood) = mood {
            draft = draft.with_mood(mood);
        }
        self.record_activity(actor, session_id, draft)
    }

    /// Flip a pre-care checklist item; returns its new value.
    pub fn toggle_checklist(
        &self,
        actor: &Actor,
        session_id: SessionId,
        item: ChecklistItem,
    ) -> Result<bool, CareError> {
        let committed = self.apply(actor, session_id, "toggle checklist", authz::require_sitter, |txn| {
            let checked = session_mut(txn, session_id)?.toggle_checklist(item)?;
            txn.emit(DomainEventKind::ChecklistToggled {
                session_id,
                item,
                checked,
            });
            Ok(checked)
        })?;
        Ok(committed.value)
    }

    /// Time in care so far, or the final duration once ended.
    pub fn elapsed(&self, actor: &Actor, session_id: SessionId) -> Result<Duration, CareError> {
        let (_, file) = self.locate(actor, session_id, "view session", authz::require_party)?;
        Ok(session_of(&file, session_id)?.elapsed(self.inner.clock.now()))
    }

    /// Events after sequence `since`, oldest first, at most `limit`.
    pub fn feed(
        &self,
        actor: &Actor,
        session_id: SessionId,
        since: u64,
        limit: usize,
    ) -> Result<FeedPage, CareError> {
        let (_, file) = self.locate(actor, session_id, "view feed", authz::require_party)?;
        let session = session_of(&file, session_id)?;
        let limit = match limit {
            0 => DEFAULT_FEED_LIMIT,
            n => n.min(MAX_FEED_LIMIT),
        };
        let pending = session.ledger.feed_since(since);
        let events: Vec<ActivityEvent> = pending.iter().take(limit).map(|&e| e.clone()).collect();
        let cursor = events.last().map_or(since, |e| e.sequence);
        Ok(FeedPage {
            session_id,
            status: session.status,
            has_more: pending.len() > events.len(),
            events,
            cursor,
        })
    }

    /// active → completed; completes the booking in the same commit.
    pub fn end(&self, actor: &Actor, session_id: SessionId) -> Result<CareSession, CareError> {
        let committed = self.apply(actor, session_id, "end session", authz::require_sitter, |txn| {
            let (now, role) = (txn.now(), txn.actor().role);
            let session = session_mut(txn, session_id)?;
            let ended = session.end(now, role)?;
            if ended.is_applied() {
                let elapsed_minutes = session.elapsed(now).num_minutes();
                txn.emit(DomainEventKind::SessionEnded {
                    session_id,
                    elapsed_minutes,
                });
            }
            let completed = complete_in(txn)?;
            Ok((ended, completed))
        })?;
        let booking_id = committed.file.booking.id;
        self.inner.settle(booking_id, &committed.effects);
        let (ended, completed) = committed.value;
        if ended.is_applied() {
            tracing::info!(%session_id, %booking_id, "care session ended");
        }
        record_transition(booking_id, &completed);
        session_of(&committed.file, session_id).cloned()
    }

    fn locate(
        &self,
        actor: &Actor,
        session_id: SessionId,
        operation: &str,
        check: AuthCheck,
    ) -> Result<(BookingId, Arc<CareFile>), CareError> {
        let booking_id = self
            .inner
            .registry
            .booking_for_session(session_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Session, session_id))?;
        let file = self
            .inner
            .registry
            .get(booking_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, booking_id))?;
        check(actor, &file.booking, operation)?;
        Ok((booking_id, file))
    }

    fn apply<R>(
        &self,
        actor: &Actor,
        session_id: SessionId,
        operation: &'static str,
        check: AuthCheck,
        op: impl FnOnce(&mut Txn) -> Result<R, CareError>,
    ) -> Result<Committed<R>, CareError> {
        let (booking_id, _) = self.locate(actor, session_id, operation, check)?;
        self.inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, op)
            .inspect_err(|e| rejected(operation, booking_id, e))
    }
}

fn session_of(file: &CareFile, session_id: SessionId) -> Result<&CareSession, CareError> {
    file.session
        .as_ref()
        .filter(|s| s.id == session_id)
        .ok_or_else(|| CareError::not_found(EntityKind::Session, session_id))
}

pub(crate) fn session_mut(txn: &mut Txn, session_id: SessionId) -> Result<&mut CareSession, CareError> {
    txn.file
        .session
        .as_mut()
        .filter(|s| s.id == session_id)
        .ok_or_else(|| CareError::not_found(EntityKind::Session, session_id))
}

/// Abort the booking's session for a critical incident. Returns `None`
/// when there is no session or it already ended normally.
///
/// The booking stays `in_progress` with its emergency flag raised, but the
/// sitter is no longer caring for anyone, so their reservation is released.
pub(crate) fn abort_in(
    txn: &mut Txn,
    incident_id: IncidentId,
    reason: &str,
) -> Result<Option<Outcome<SessionStatus>>, CareError> {
    let (now, role) = (txn.now(), txn.actor().role);
    let Some(session) = txn.file.session.as_mut() else {
        return Ok(None);
    };
    if session.status == SessionStatus::Completed {
        return Ok(None);
    }
    let session_id = session.id;
    let outcome = session.abort(Some(incident_id), reason, now, role)?;
    if outcome.is_applied() {
        txn.emit(DomainEventKind::SessionAborted {
            session_id,
            incident_id: Some(incident_id),
        });
        if let Some(sitter_id) = txn.file.booking.sitter_id {
            txn.defer(Effect::ReleaseSitter { sitter_id });
        }
    }
    Ok(Some(outcome))
}
