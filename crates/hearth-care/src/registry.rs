//! # Care File Registry
//!
//! Holds one [`CareFile`] per booking: the booking together with its
//! handover, session, and incidents. Everything that changes together
//! lives in the same file, so a single commit covers, for example,
//! handover finalization plus session creation plus the booking moving to
//! `in_progress`.
//!
//! ## Serialization
//!
//! Each booking has its own gate. [`Registry::apply`] takes the gate, runs
//! the operation against a private draft of the current file, and on
//! success swaps the draft in as the new snapshot and queues it in the
//! outbox, still under the gate. Operations on different bookings never
//! contend. Readers clone the current `Arc` and never wait on the gate.
//!
//! A failed operation discards its draft, so an error never leaves a
//! partial change behind. A draft that emitted no events is also
//! discarded: every state change must announce itself.

use std::collections::HashMap;
use std::sync::Arc;

use hearth_core::{
    Actor, BookingId, CareError, ConfirmationCode, EntityKind, IncidentId, SessionId, SitterId,
    Timestamp,
};
use hearth_state::{Booking, CareSession, HandoverRecord, Incident};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{DomainEvent, DomainEventKind};
use crate::outbox::{Outbox, OutboxEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareFile {
    pub booking: Booking,
    pub handover: Option<HandoverRecord>,
    pub session: Option<CareSession>,
    pub incidents: Vec<Incident>,
}

impl CareFile {
    pub fn new(booking: Booking) -> Self {
        Self {
            booking,
            handover: None,
            session: None,
            incidents: Vec::new(),
        }
    }

    pub fn incident(&self, id: IncidentId) -> Option<&Incident> {
        self.incidents.iter().find(|i| i.id == id)
    }

    pub fn incident_mut(&mut self, id: IncidentId) -> Option<&mut Incident> {
        self.incidents.iter_mut().find(|i| i.id == id)
    }
}

/// Work that must happen after the commit, outside the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ReleaseSitter { sitter_id: SitterId },
}

/// A draft of one care file plus the events it will publish.
#[derive(Debug)]
pub struct Txn {
    pub file: CareFile,
    now: Timestamp,
    actor: Actor,
    events: Vec<DomainEventKind>,
    effects: Vec<Effect>,
}

impl Txn {
    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }

    pub fn emit(&mut self, kind: DomainEventKind) {
        self.events.push(kind);
    }

    pub fn defer(&mut self, effect: Effect) {
        self.effects.push(effect);
    }
}

/// Result of [`Registry::apply`].
#[derive(Debug)]
pub struct Committed<R> {
    pub value: R,
    pub file: Arc<CareFile>,
    /// Empty when the operation turned out to be a no-op.
    pub events: Vec<DomainEvent>,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    file: Arc<CareFile>,
}

#[derive(Debug)]
struct Slot {
    gate: Mutex<()>,
    current: RwLock<Versioned>,
}

#[derive(Debug)]
pub struct Registry {
    slots: RwLock<HashMap<BookingId, Arc<Slot>>>,
    sessions: RwLock<HashMap<SessionId, BookingId>>,
    incidents: RwLock<HashMap<IncidentId, BookingId>>,
    codes: RwLock<HashMap<ConfirmationCode, BookingId>>,
    outbox: Arc<Outbox>,
}

impl Registry {
    pub fn new(outbox: Arc<Outbox>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            incidents: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            outbox,
        }
    }

    /// Register a freshly created booking at version 1.
    ///
    /// Fails with `Conflict` if the confirmation code is already taken;
    /// the caller draws a new code and retries.
    pub fn insert(&self, booking: Booking, actor: Actor) -> Result<Arc<CareFile>, CareError> {
        let id = booking.id;
        let mut codes = self.codes.write();
        if codes.contains_key(&booking.confirmation_code) {
            return Err(CareError::Conflict {
                entity: EntityKind::Booking,
                id: booking.confirmation_code.to_string(),
                reason: "confirmation code already issued".into(),
            });
        }
        codes.insert(booking.confirmation_code.clone(), id);

        let event = DomainEvent {
            id: Uuid::new_v4(),
            booking_id: id,
            occurred_at: booking.created_at,
            actor: actor.role,
            kind: DomainEventKind::BookingCreated {
                parent_id: booking.parent_id,
                total: booking.total.clone(),
            },
        };
        let file = Arc::new(CareFile::new(booking));
        let slot = Slot {
            gate: Mutex::new(()),
            current: RwLock::new(Versioned {
                version: 1,
                file: Arc::clone(&file),
            }),
        };
        self.slots.write().insert(id, Arc::new(slot));
        self.outbox.push(OutboxEntry {
            version: 1,
            file: Arc::clone(&file),
            events: vec![event],
        });
        Ok(file)
    }

    /// Run `op` against booking `booking_id` under its gate.
    pub fn apply<R>(
        &self,
        booking_id: BookingId,
        now: Timestamp,
        actor: Actor,
        op: impl FnOnce(&mut Txn) -> Result<R, CareError>,
    ) -> Result<Committed<R>, CareError> {
        let slot = self
            .slot(booking_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, booking_id))?;
        let _gate = slot.gate.lock();
        let current = slot.current.read().clone();

        let mut txn = Txn {
            file: (*current.file).clone(),
            now,
            actor,
            events: Vec::new(),
            effects: Vec::new(),
        };
        let value = op(&mut txn)?;

        let Txn {
            file,
            events,
            effects,
            ..
        } = txn;
        if events.is_empty() {
            return Ok(Committed {
                value,
                file: current.file,
                events: Vec::new(),
                effects,
            });
        }

        self.index(booking_id, &file);
        let file = Arc::new(file);
        let version = current.version + 1;
        let events: Vec<DomainEvent> = events
            .into_iter()
            .map(|kind| DomainEvent {
                id: Uuid::new_v4(),
                booking_id,
                occurred_at: now,
                actor: actor.role,
                kind,
            })
            .collect();
        *slot.current.write() = Versioned {
            version,
            file: Arc::clone(&file),
        };
        self.outbox.push(OutboxEntry {
            version,
            file: Arc::clone(&file),
            events: events.clone(),
        });
        Ok(Committed {
            value,
            file,
            events,
            effects,
        })
    }

    pub fn get(&self, booking_id: BookingId) -> Option<Arc<CareFile>> {
        self.slot(booking_id)
            .map(|slot| Arc::clone(&slot.current.read().file))
    }

    pub fn version(&self, booking_id: BookingId) -> Option<u64> {
        self.slot(booking_id).map(|slot| slot.current.read().version)
    }

    pub fn booking_for_session(&self, session_id: SessionId) -> Option<BookingId> {
        self.sessions.read().get(&session_id).copied()
    }

    pub fn booking_for_incident(&self, incident_id: IncidentId) -> Option<BookingId> {
        self.incidents.read().get(&incident_id).copied()
    }

    pub fn booking_for_code(&self, code: &ConfirmationCode) -> Option<BookingId> {
        self.codes.read().get(code).copied()
    }

    /// Current snapshot of every care file, in no particular order.
    pub fn snapshots(&self) -> Vec<Arc<CareFile>> {
        let slots: Vec<Arc<Slot>> = self.slots.read().values().cloned().collect();
        slots
            .iter()
            .map(|slot| Arc::clone(&slot.current.read().file))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    fn slot(&self, booking_id: BookingId) -> Option<Arc<Slot>> {
        self.slots.read().get(&booking_id).cloned()
    }

    fn index(&self, booking_id: BookingId, file: &CareFile) {
        if let Some(session) = &file.session {
            self.sessions.write().insert(session.id, booking_id);
        }
        if !file.incidents.is_empty() {
            let mut incidents = self.incidents.write();
            for incident in &file.incidents {
                incidents.insert(incident.id, booking_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{CareWindow, ChildId, Money, ParentId, Role, RoomNumber};
    use hearth_state::{BookingStatus, NewBooking};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn booking(code: &str) -> Booking {
        Booking::new(
            NewBooking {
                id: BookingId::new(),
                confirmation_code: ConfirmationCode::new(code).unwrap(),
                room: RoomNumber::new("1204").unwrap(),
                window: CareWindow::new(ts("2026-03-01T18:00:00Z"), ts("2026-03-01T21:00:00Z"))
                    .unwrap(),
                parent_id: ParentId::new(),
                child_ids: vec![ChildId::new()],
                total: Money::new(7500, "USD").unwrap(),
                notes: None,
            },
            ts("2026-03-01T12:00:00Z"),
        )
    }

    fn registry() -> (Registry, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::new());
        (Registry::new(Arc::clone(&outbox)), outbox)
    }

    #[test]
    fn insert_queues_creation_event() {
        let (reg, outbox) = registry();
        let b = booking("HX-AAAA-BBBB");
        let id = b.id;
        reg.insert(b, Actor::system()).unwrap();
        assert_eq!(reg.version(id), Some(1));
        let entries = outbox.drain(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].events[0].name(), "booking_created");
    }

    #[test]
    fn duplicate_code_conflicts() {
        let (reg, _) = registry();
        reg.insert(booking("HX-AAAA-BBBB"), Actor::system()).unwrap();
        let err = reg
            .insert(booking("HX-AAAA-BBBB"), Actor::system())
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn failed_operation_leaves_snapshot_untouched() {
        let (reg, outbox) = registry();
        let b = booking("HX-AAAA-BBBB");
        let id = b.id;
        reg.insert(b, Actor::system()).unwrap();
        outbox.drain(10);

        let err = reg
            .apply(id, ts("2026-03-01T13:00:00Z"), Actor::system(), |txn| {
                txn.file.booking.notes = Some("scribble".into());
                txn.emit(DomainEventKind::HandoverOpened);
                Err::<(), _>(CareError::Forbidden("no".into()))
            })
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
        assert_eq!(reg.get(id).unwrap().booking.notes, None);
        assert_eq!(reg.version(id), Some(1));
        assert!(outbox.is_empty());
    }

    #[test]
    fn silent_draft_is_discarded() {
        let (reg, _) = registry();
        let b = booking("HX-AAAA-BBBB");
        let id = b.id;
        reg.insert(b, Actor::system()).unwrap();
        let committed = reg
            .apply(id, ts("2026-03-01T13:00:00Z"), Actor::system(), |txn| {
                txn.file.booking.notes = Some("ignored".into());
                Ok(())
            })
            .unwrap();
        assert!(committed.events.is_empty());
        assert_eq!(reg.get(id).unwrap().booking.notes, None);
    }

    #[test]
    fn commit_bumps_version_and_stamps_events() {
        let (reg, outbox) = registry();
        let b = booking("HX-AAAA-BBBB");
        let id = b.id;
        reg.insert(b, Actor::system()).unwrap();
        outbox.drain(10);

        let now = ts("2026-03-01T13:00:00Z");
        let sitter = SitterId::new();
        let committed = reg
            .apply(id, now, Actor::staff(Uuid::new_v4()), |txn| {
                let (now, role) = (txn.now(), txn.actor().role);
                txn.file.booking.confirm(sitter, now, role)?;
                txn.emit(DomainEventKind::SitterAssigned { sitter_id: sitter });
                Ok(())
            })
            .unwrap();
        assert_eq!(committed.file.booking.status, BookingStatus::Confirmed);
        assert_eq!(committed.events[0].occurred_at, now);
        assert_eq!(committed.events[0].actor, Role::HotelStaff);
        assert_eq!(reg.version(id), Some(2));
        assert_eq!(outbox.drain(10)[0].version, 2);
    }

    #[test]
    fn unknown_booking() {
        let (reg, _) = registry();
        let err = reg
            .apply(BookingId::new(), ts("2026-03-01T13:00:00Z"), Actor::system(), |_| Ok(()))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
