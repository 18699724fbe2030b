//! # Activity Ledger
//!
//! Append-only, time-ordered log of what happened during a care session.
//!
//! ## Invariants
//!
//! - The first event is always a `checkin`.
//! - Timestamps strictly increase in append order. A supplied timestamp at
//!   or before the last event's is moved to one millisecond after it and
//!   the event is marked `clock_adjusted`.
//! - A supplied timestamp never lies ahead of the ledger's clock. A future
//!   time is pulled back to `now` (and marked `clock_adjusted`) before the
//!   ordering clamp, so one fast device clock cannot drag every later event
//!   forward with it.
//! - Events are never removed or edited. A correction is a new event that
//!   names the event it corrects.
//! - Sequence numbers start at 1 and have no gaps, so a reader can resume
//!   a feed from the last sequence it saw.

use std::collections::BTreeMap;
use std::sync::Arc;

use hearth_core::{
    ActivityEventId, ArtifactRef, CareError, EntityKind, SessionId, Timestamp, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Maximum length of free-text event content.
pub const MAX_CONTENT_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Photo,
    Status,
    Meal,
    Nap,
    Incident,
    Checkin,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        Self::Photo,
        Self::Status,
        Self::Meal,
        Self::Nap,
        Self::Incident,
        Self::Checkin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Status => "status",
            Self::Meal => "meal",
            Self::Nap => "nap",
            Self::Incident => "incident",
            Self::Checkin => "checkin",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional mood annotation shown alongside an event in the parent's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Calm,
    Sleepy,
    Fussy,
    Upset,
}

/// An event as submitted, before the ledger stamps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub kind: ActivityKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media: Option<ArtifactRef>,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub subtext: Option<String>,
    /// When the event happened according to the submitter. Defaults to now.
    #[serde(default)]
    pub occurred_at: Option<Timestamp>,
    /// An earlier event this one corrects.
    #[serde(default)]
    pub corrects: Option<ActivityEventId>,
}

impl ActivityDraft {
    pub fn new(kind: ActivityKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            media: None,
            mood: None,
            subtext: None,
            occurred_at: None,
            corrects: None,
        }
    }

    pub fn at(mut self, ts: Timestamp) -> Self {
        self.occurred_at = Some(ts);
        self
    }

    pub fn with_media(mut self, media: ArtifactRef) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_mood(mut self, mood: Mood) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn correcting(mut self, id: ActivityEventId) -> Self {
        self.corrects = Some(id);
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let content = self.content.trim();
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "content",
                max: MAX_CONTENT_LEN,
            });
        }
        if let Some(sub) = &self.subtext {
            if sub.chars().count() > MAX_CONTENT_LEN {
                return Err(ValidationError::FieldTooLong {
                    field: "subtext",
                    max: MAX_CONTENT_LEN,
                });
            }
        }
        match self.kind {
            ActivityKind::Photo if self.media.is_none() => Err(ValidationError::EmptyField("media")),
            ActivityKind::Photo | ActivityKind::Checkin => Ok(()),
            _ if content.is_empty() => Err(ValidationError::EmptyField("content")),
            _ => Ok(()),
        }
    }
}

/// A stored ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: ActivityEventId,
    pub session_id: SessionId,
    /// 1-based position in the ledger.
    pub sequence: u64,
    pub kind: ActivityKind,
    pub content: String,
    pub media: Option<ArtifactRef>,
    pub mood: Option<Mood>,
    pub subtext: Option<String>,
    /// Feed-order timestamp.
    pub timestamp: Timestamp,
    /// Wall-clock time the ledger accepted the event.
    pub recorded_at: Timestamp,
    /// The submitted time was moved forward to keep ordering strict.
    pub clock_adjusted: bool,
    pub corrects: Option<ActivityEventId>,
}

/// Result of an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    pub event: ActivityEvent,
    /// False when the append resolved to an existing event (repeat check-in).
    pub created: bool,
}

/// Events per shared chunk.
const CHUNK_LEN: usize = 64;

/// The ledger for one session.
///
/// Full chunks are frozen behind an `Arc` and shared by every clone, so
/// copying a ledger costs one pointer per chunk plus the open tail rather
/// than the whole history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LedgerRecord", into = "LedgerRecord")]
pub struct ActivityLedger {
    session_id: SessionId,
    sealed: Vec<Arc<[ActivityEvent]>>,
    tail: Vec<ActivityEvent>,
}

/// Serialized form: the events as one flat list.
#[derive(Serialize, Deserialize)]
struct LedgerRecord {
    session_id: SessionId,
    events: Vec<ActivityEvent>,
}

impl From<LedgerRecord> for ActivityLedger {
    fn from(record: LedgerRecord) -> Self {
        let mut ledger = ActivityLedger::new(record.session_id);
        for event in record.events {
            ledger.push(event);
        }
        ledger
    }
}

impl From<ActivityLedger> for LedgerRecord {
    fn from(ledger: ActivityLedger) -> Self {
        LedgerRecord {
            session_id: ledger.session_id,
            events: ledger.iter().cloned().collect(),
        }
    }
}

impl ActivityLedger {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            sealed: Vec::new(),
            tail: Vec::new(),
        }
    }

    /// Append an event, stamping id, sequence and a monotonic timestamp.
    pub fn append(&mut self, draft: ActivityDraft, now: Timestamp) -> Result<Appended, CareError> {
        draft.validate()?;

        if draft.kind == ActivityKind::Checkin {
            if let Some(first) = self.first() {
                return Ok(Appended {
                    event: first.clone(),
                    created: false,
                });
            }
        } else if self.is_empty() {
            return Err(CareError::Precondition {
                entity: EntityKind::Session,
                id: self.session_id.to_string(),
                state: "empty ledger".to_string(),
                operation: format!("append {}", draft.kind),
                requirement: "a checkin event first".to_string(),
            });
        }

        if let Some(target) = draft.corrects {
            if self.get(target).is_none() {
                return Err(CareError::not_found(EntityKind::Activity, target));
            }
        }

        let (requested, from_future) = match draft.occurred_at {
            Some(at) if at > now => (now, true),
            Some(at) => (at, false),
            None => (now, false),
        };
        let (timestamp, clock_adjusted) = match self.last() {
            Some(last) if requested <= last.timestamp => (last.timestamp.next_millisecond(), true),
            _ => (requested, from_future),
        };

        let event = ActivityEvent {
            id: ActivityEventId::new(),
            session_id: self.session_id,
            sequence: self.len() as u64 + 1,
            kind: draft.kind,
            content: draft.content.trim().to_string(),
            media: draft.media,
            mood: draft.mood,
            subtext: draft.subtext,
            timestamp,
            recorded_at: now,
            clock_adjusted,
            corrects: draft.corrects,
        };
        self.push(event.clone());
        Ok(Appended {
            event,
            created: true,
        })
    }

    fn push(&mut self, event: ActivityEvent) {
        self.tail.push(event);
        if self.tail.len() == CHUNK_LEN {
            let full = std::mem::replace(&mut self.tail, Vec::with_capacity(CHUNK_LEN));
            self.sealed.push(Arc::from(full));
        }
    }

    /// Events oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ActivityEvent> + '_ {
        self.sealed
            .iter()
            .flat_map(|chunk| chunk.iter())
            .chain(self.tail.iter())
    }

    /// All events, oldest first.
    pub fn feed(&self) -> Vec<&ActivityEvent> {
        self.iter().collect()
    }

    /// Events with a sequence number greater than `sequence`, oldest first.
    pub fn feed_since(&self, sequence: u64) -> Vec<&ActivityEvent> {
        let start = usize::try_from(sequence).unwrap_or(usize::MAX);
        if start >= self.len() {
            return Vec::new();
        }
        let (chunk, offset) = (start / CHUNK_LEN, start % CHUNK_LEN);
        if chunk < self.sealed.len() {
            self.sealed[chunk][offset..]
                .iter()
                .chain(self.sealed[chunk + 1..].iter().flat_map(|c| c.iter()))
                .chain(self.tail.iter())
                .collect()
        } else {
            self.tail[start - self.sealed.len() * CHUNK_LEN..].iter().collect()
        }
    }

    pub fn get(&self, id: ActivityEventId) -> Option<&ActivityEvent> {
        self.iter().find(|e| e.id == id)
    }

    pub fn first(&self) -> Option<&ActivityEvent> {
        self.sealed
            .first()
            .and_then(|chunk| chunk.first())
            .or_else(|| self.tail.first())
    }

    pub fn last(&self) -> Option<&ActivityEvent> {
        self.tail
            .last()
            .or_else(|| self.sealed.last().and_then(|chunk| chunk.last()))
    }

    pub fn len(&self) -> usize {
        self.sealed.len() * CHUNK_LEN + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sealed.is_empty() && self.tail.is_empty()
    }

    pub fn count_by_kind(&self) -> BTreeMap<ActivityKind, usize> {
        let mut counts = BTreeMap::new();
        for e in self.iter() {
            *counts.entry(e.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Whether the stored events satisfy the ordering invariants.
    pub fn is_well_ordered(&self) -> bool {
        let first_is_checkin = self.first().map_or(true, |e| e.kind == ActivityKind::Checkin);
        let increasing = self
            .iter()
            .zip(self.iter().skip(1))
            .all(|(a, b)| a.timestamp < b.timestamp && a.sequence + 1 == b.sequence);
        first_is_checkin && increasing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-03-01T18:00:00Z").unwrap()
    }

    fn ledger_with_checkin() -> ActivityLedger {
        let mut l = ActivityLedger::new(SessionId::new());
        l.append(ActivityDraft::new(ActivityKind::Checkin, "arrived"), t0())
            .unwrap();
        l
    }

    #[test]
    fn first_event_must_be_checkin() {
        let mut l = ActivityLedger::new(SessionId::new());
        let err = l
            .append(ActivityDraft::new(ActivityKind::Meal, "pasta"), t0())
            .unwrap_err();
        assert_eq!(err.code(), "PRECONDITION_FAILED");
        assert!(l.is_empty());
    }

    #[test]
    fn repeat_checkin_returns_existing() {
        let mut l = ledger_with_checkin();
        let first_id = l.feed()[0].id;
        let again = l
            .append(ActivityDraft::new(ActivityKind::Checkin, "again"), t0())
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.event.id, first_id);
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn out_of_order_timestamp_is_clamped() {
        let mut l = ledger_with_checkin();
        let now = t0().plus(Duration::hours(1));
        let late = l
            .append(
                ActivityDraft::new(ActivityKind::Meal, "snack").at(t0().plus(Duration::minutes(30))),
                now,
            )
            .unwrap();
        assert!(!late.event.clock_adjusted);
        let early = l
            .append(
                ActivityDraft::new(ActivityKind::Nap, "nap").at(t0().plus(Duration::minutes(5))),
                now,
            )
            .unwrap();
        assert!(early.event.clock_adjusted);
        assert_eq!(early.event.timestamp, late.event.timestamp.next_millisecond());
        assert!(l.is_well_ordered());
    }

    #[test]
    fn future_timestamp_is_pulled_back_to_now() {
        let mut l = ledger_with_checkin();
        let now = t0().plus(Duration::minutes(1));
        let skewed = l
            .append(
                ActivityDraft::new(ActivityKind::Meal, "dinner").at(t0().plus(Duration::days(3650))),
                now,
            )
            .unwrap()
            .event;
        assert_eq!(skewed.timestamp, now);
        assert!(skewed.clock_adjusted);

        let later = t0().plus(Duration::minutes(2));
        let honest = l
            .append(ActivityDraft::new(ActivityKind::Status, "reading"), later)
            .unwrap()
            .event;
        assert_eq!(honest.timestamp, later);
        assert!(!honest.clock_adjusted);
        assert!(l.is_well_ordered());
    }

    #[test]
    fn photo_requires_media() {
        let mut l = ledger_with_checkin();
        let err = l
            .append(ActivityDraft::new(ActivityKind::Photo, "smile"), t0())
            .unwrap_err();
        assert_eq!(err, CareError::Validation(ValidationError::EmptyField("media")));
        let ok = l
            .append(
                ActivityDraft::new(ActivityKind::Photo, "")
                    .with_media(ArtifactRef::new("sha256:ab").unwrap()),
                t0(),
            )
            .unwrap();
        assert_eq!(ok.event.kind, ActivityKind::Photo);
    }

    #[test]
    fn empty_status_rejected() {
        let mut l = ledger_with_checkin();
        assert!(l
            .append(ActivityDraft::new(ActivityKind::Status, "   "), t0())
            .is_err());
    }

    #[test]
    fn corrections_must_reference_existing_event() {
        let mut l = ledger_with_checkin();
        let meal = l
            .append(ActivityDraft::new(ActivityKind::Meal, "pasta"), t0())
            .unwrap()
            .event;
        let fix = l
            .append(
                ActivityDraft::new(ActivityKind::Meal, "rice, not pasta").correcting(meal.id),
                t0(),
            )
            .unwrap()
            .event;
        assert_eq!(fix.corrects, Some(meal.id));
        assert_eq!(l.get(meal.id).unwrap().content, "pasta");

        let err = l
            .append(
                ActivityDraft::new(ActivityKind::Meal, "x").correcting(ActivityEventId::new()),
                t0(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn feed_since_resumes_after_cursor() {
        let mut l = ledger_with_checkin();
        for i in 0..4 {
            l.append(ActivityDraft::new(ActivityKind::Status, format!("s{i}")), t0())
                .unwrap();
        }
        assert_eq!(l.feed_since(0).len(), 5);
        let tail = l.feed_since(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 4);
        assert!(l.feed_since(99).is_empty());
    }

    #[test]
    fn long_ledger_spans_chunks_and_shares_history() {
        let mut l = ledger_with_checkin();
        for i in 0..150 {
            l.append(ActivityDraft::new(ActivityKind::Status, format!("s{i}")), t0())
                .unwrap();
        }
        assert_eq!(l.len(), 151);
        assert!(l.is_well_ordered());
        let feed = l.feed();
        for (i, e) in feed.iter().enumerate() {
            assert_eq!(e.sequence, i as u64 + 1);
        }
        assert_eq!(l.last().unwrap().sequence, 151);
        for cursor in [0, 63, 64, 65, 128, 150, 151] {
            let tail = l.feed_since(cursor);
            assert_eq!(tail.len(), 151 - cursor as usize);
            assert_eq!(tail.first().map(|e| e.sequence), (cursor < 151).then(|| cursor + 1));
        }

        let draft = l.clone();
        assert!(Arc::ptr_eq(&draft.sealed[0], &l.sealed[0]));
        assert_eq!(draft, l);

        let json = serde_json::to_value(&l).unwrap();
        assert_eq!(json["events"].as_array().unwrap().len(), 151);
        let back: ActivityLedger = serde_json::from_value(json).unwrap();
        assert_eq!(back, l);
    }

    #[test]
    fn count_by_kind() {
        let mut l = ledger_with_checkin();
        l.append(ActivityDraft::new(ActivityKind::Meal, "a"), t0()).unwrap();
        l.append(ActivityDraft::new(ActivityKind::Meal, "b"), t0()).unwrap();
        let counts = l.count_by_kind();
        assert_eq!(counts.get(&ActivityKind::Meal), Some(&2));
        assert_eq!(counts.get(&ActivityKind::Checkin), Some(&1));
    }

    proptest! {
        #[test]
        fn timestamps_strictly_increase_for_any_offsets(offsets in proptest::collection::vec(-600i64..600, 1..40)) {
            let mut l = ledger_with_checkin();
            for off in offsets {
                let draft = ActivityDraft::new(ActivityKind::Status, "tick")
                    .at(t0().plus(Duration::seconds(off)));
                l.append(draft, t0()).unwrap();
            }
            prop_assert!(l.is_well_ordered());
        }

        #[test]
        fn future_offsets_never_run_ahead_of_the_clock(offsets in proptest::collection::vec(-600i64..315_360_000, 1..40)) {
            let mut l = ledger_with_checkin();
            for off in offsets {
                let draft = ActivityDraft::new(ActivityKind::Status, "tick")
                    .at(t0().plus(Duration::seconds(off)));
                l.append(draft, t0()).unwrap();
            }
            prop_assert!(l.is_well_ordered());
            // At worst one millisecond per event past the clock.
            let bound = t0().plus(Duration::milliseconds(l.len() as i64));
            prop_assert!(l.feed().iter().all(|e| e.timestamp <= bound));
        }
    }
}
