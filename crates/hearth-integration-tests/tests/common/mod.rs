//! Shared fixtures: a care runtime over in-memory collaborators with a
//! manual clock at 2026-03-01T12:00Z.

#![allow(dead_code)]

use std::sync::Arc;

use hearth_care::adapters::{InMemoryChildDirectory, InMemoryRecordRepository, RecordingDispatcher};
use hearth_care::{BookingRequest, CareRuntime, FinalizedHandover, ManualClock};
use hearth_core::{
    Actor, BookingId, CareWindow, ChildId, ParentId, RoomNumber, SessionId, SitterId, Timestamp,
};
use hearth_state::{Booking, EmergencyContact, MedicalDisclosure, SignatureParty};
use uuid::Uuid;

pub fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

/// Evening window on the fixture date, `start`..`end` hours UTC.
pub fn evening(start: u32, end: u32) -> CareWindow {
    CareWindow::new(
        ts(&format!("2026-03-01T{start:02}:00:00Z")),
        ts(&format!("2026-03-01T{end:02}:00:00Z")),
    )
    .unwrap()
}

pub fn staff() -> Actor {
    Actor::staff(Uuid::new_v4())
}

pub struct World {
    pub runtime: CareRuntime,
    pub clock: Arc<ManualClock>,
    pub children: Arc<InMemoryChildDirectory>,
    pub repository: Arc<InMemoryRecordRepository>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

/// One parent with one registered child.
#[derive(Debug, Clone, Copy)]
pub struct Family {
    pub parent_id: ParentId,
    pub child: ChildId,
}

impl Family {
    pub fn actor(&self) -> Actor {
        Actor::parent(self.parent_id)
    }
}

impl World {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(ts("2026-03-01T12:00:00Z")));
        let children = Arc::new(InMemoryChildDirectory::new());
        let repository = Arc::new(InMemoryRecordRepository::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let runtime = CareRuntime::builder()
            .clock(clock.clone())
            .children(children.clone())
            .repository(repository.clone())
            .dispatcher(dispatcher.clone())
            .build()
            .unwrap();
        Self {
            runtime,
            clock,
            children,
            repository,
            dispatcher,
        }
    }

    pub fn family(&self) -> Family {
        let parent_id = ParentId::new();
        Family {
            parent_id,
            child: self.children.register(parent_id),
        }
    }

    pub fn book(&self, family: &Family, window: CareWindow) -> Booking {
        self.runtime
            .bookings()
            .create(
                &family.actor(),
                BookingRequest {
                    parent_id: family.parent_id,
                    child_ids: vec![family.child],
                    room: RoomNumber::new("812").unwrap(),
                    window,
                    notes: None,
                },
            )
            .unwrap()
    }

    pub fn confirmed(&self, family: &Family, sitter: SitterId) -> Booking {
        let booking = self.book(family, evening(18, 21));
        self.runtime
            .bookings()
            .assign(&staff(), booking.id, sitter)
            .unwrap()
    }

    /// Walk all three handover steps with the parent signature only.
    pub fn fill_handover(&self, family: &Family, booking_id: BookingId) {
        let handovers = self.runtime.handovers();
        let parent = family.actor();
        handovers
            .submit_medical(
                &parent,
                booking_id,
                MedicalDisclosure {
                    allergies: String::new(),
                    medications: "inhaler as needed".into(),
                    notes: None,
                },
            )
            .unwrap();
        handovers.advance(&parent, booking_id).unwrap();
        handovers
            .submit_emergency_contact(
                &parent,
                booking_id,
                EmergencyContact {
                    name: "Sam Okafor".into(),
                    phone: "+44 20 7946 0018".into(),
                    relationship: None,
                },
            )
            .unwrap();
        handovers.advance(&parent, booking_id).unwrap();
        handovers.set_consent(&parent, booking_id, true).unwrap();
        handovers
            .upload_signature(&parent, booking_id, SignatureParty::Parent, "image/png", b"sig")
            .unwrap();
    }

    pub fn finalized(&self, family: &Family, sitter: SitterId) -> FinalizedHandover {
        let booking = self.confirmed(family, sitter);
        self.fill_handover(family, booking.id);
        self.runtime
            .handovers()
            .finalize(&family.actor(), booking.id)
            .unwrap()
    }

    pub fn active(&self, family: &Family, sitter: SitterId) -> (BookingId, SessionId) {
        let done = self.finalized(family, sitter);
        self.runtime
            .sessions()
            .start(&Actor::sitter(sitter), done.session.id)
            .unwrap();
        (done.booking.id, done.session.id)
    }
}
