//! # Trust Handover Protocol
//!
//! The three-step exchange between parent and sitter before care begins:
//! medical disclosure, emergency contact, then consent with both
//! signatures. The record opens lazily on first touch once the booking is
//! confirmed.
//!
//! Finalizing is the hinge of the lifecycle. In one commit it marks the
//! handover complete, creates the care session, and moves the booking to
//! `in_progress`. A cancellation racing the finalize is ordered by the
//! booking's gate: whichever commits first wins and the other fails on
//! state.

use std::sync::Arc;

use hearth_core::{Actor, ArtifactRef, BookingId, CareError, EntityKind, Timestamp, ValidationError};
use hearth_state::{
    Booking, BookingStatus, CareSession, EmergencyContact, HandoverRecord, HandoverStep,
    MedicalDisclosure, SignatureParty,
};
use serde::{Deserialize, Serialize};

use crate::authz;
use crate::bookings::{begin_care_in, record_transition, rejected};
use crate::events::DomainEventKind;
use crate::ports::ArtifactKind;
use crate::registry::{CareFile, Txn};
use crate::runtime::Inner;

type AuthCheck = fn(&Actor, &Booking, &str) -> Result<(), CareError>;

/// Everything finalize touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedHandover {
    pub handover: HandoverRecord,
    pub booking: Booking,
    pub session: CareSession,
}

pub struct HandoverProtocol<'a> {
    inner: &'a Inner,
}

impl<'a> HandoverProtocol<'a> {
    pub(crate) fn new(inner: &'a Inner) -> Self {
        Self { inner }
    }

    /// Open the record if it does not exist yet.
    pub fn open(&self, actor: &Actor, booking_id: BookingId) -> Result<HandoverRecord, CareError> {
        self.update(actor, booking_id, "open handover", authz::require_party, |_, _| {
            Ok(None)
        })
    }

    pub fn view(&self, actor: &Actor, booking_id: BookingId) -> Result<HandoverRecord, CareError> {
        let file = self
            .inner
            .registry
            .get(booking_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, booking_id))?;
        authz::require_party(actor, &file.booking, "view handover")?;
        file.handover
            .clone()
            .ok_or_else(|| CareError::not_found(EntityKind::Handover, booking_id))
    }

    /// Step 1.
    pub fn submit_medical(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        disclosure: MedicalDisclosure,
    ) -> Result<HandoverRecord, CareError> {
        self.update(
            actor,
            booking_id,
            "submit medical disclosure",
            authz::require_owner,
            |h, now| {
                h.submit_medical(disclosure, now)?;
                Ok(Some(DomainEventKind::HandoverUpdated {
                    step: HandoverStep::Medical,
                    field: "medical_disclosure".into(),
                }))
            },
        )
    }

    /// Step 2.
    pub fn submit_emergency_contact(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        contact: EmergencyContact,
    ) -> Result<HandoverRecord, CareError> {
        self.update(
            actor,
            booking_id,
            "submit emergency contact",
            authz::require_owner,
            |h, now| {
                h.submit_emergency_contact(contact, now)?;
                Ok(Some(DomainEventKind::HandoverUpdated {
                    step: HandoverStep::EmergencyContact,
                    field: "emergency_contact".into(),
                }))
            },
        )
    }

    /// Step 3.
    pub fn set_consent(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        given: bool,
    ) -> Result<HandoverRecord, CareError> {
        self.update(actor, booking_id, "record consent", authz::require_owner, |h, now| {
            h.set_consent(given, now)?;
            Ok(Some(DomainEventKind::HandoverUpdated {
                step: HandoverStep::Consent,
                field: "consent".into(),
            }))
        })
    }

    /// Step 3. The parent signature comes from the booking's parent, the
    /// sitter signature from the assigned sitter; staff may attach either.
    pub fn attach_signature(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        party: SignatureParty,
        signature: ArtifactRef,
    ) -> Result<HandoverRecord, CareError> {
        let check: AuthCheck = match party {
            SignatureParty::Parent => authz::require_owner,
            SignatureParty::Sitter => authz::require_sitter,
        };
        self.update(actor, booking_id, "attach signature", check, |h, now| {
            h.attach_signature(party, signature, now)?;
            Ok(Some(DomainEventKind::SignatureAttached { party }))
        })
    }

    /// Store signature bytes in the artifact store, then attach them.
    pub fn upload_signature(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        party: SignatureParty,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<HandoverRecord, CareError> {
        if bytes.is_empty() {
            return Err(ValidationError::EmptyField("signature").into());
        }
        let signature = self
            .inner
            .artifacts
            .put(ArtifactKind::Signature, content_type, bytes)
            .map_err(|e| CareError::Unavailable(e.to_string()))?;
        self.attach_signature(actor, booking_id, party, signature)
    }

    pub fn advance(&self, actor: &Actor, booking_id: BookingId) -> Result<HandoverRecord, CareError> {
        self.update(actor, booking_id, "advance handover", authz::require_party, |h, now| {
            let from = h.step;
            let to = h.advance(now)?;
            Ok(Some(DomainEventKind::HandoverStepChanged { from, to }))
        })
    }

    pub fn retreat(&self, actor: &Actor, booking_id: BookingId) -> Result<HandoverRecord, CareError> {
        self.update(actor, booking_id, "retreat handover", authz::require_party, |h, now| {
            let from = h.step;
            let to = h.retreat(now)?;
            Ok(Some(DomainEventKind::HandoverStepChanged { from, to }))
        })
    }

    /// Complete the handover, create the session, and start the booking.
    /// Safe to repeat.
    pub fn finalize(
        &self,
        actor: &Actor,
        booking_id: BookingId,
    ) -> Result<FinalizedHandover, CareError> {
        self.authorize(actor, booking_id, "finalize handover", authz::require_party)?;
        let committed = self
            .inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, |txn| {
                let now = txn.now();
                let handover = ensure_open(txn)?;
                let finalized = handover.finalize(now)?;
                if finalized.is_applied() {
                    txn.emit(DomainEventKind::HandoverFinalized);
                }
                let started = begin_care_in(txn)?;
                Ok((finalized, started))
            })
            .inspect_err(|e| rejected("finalize_handover", booking_id, e))?;
        let (finalized, started) = committed.value;
        if finalized.is_applied() {
            tracing::info!(%booking_id, "trust handover finalized");
        }
        record_transition(booking_id, &started);
        let file = committed.file;
        match (&file.handover, &file.session) {
            (Some(handover), Some(session)) => Ok(FinalizedHandover {
                handover: handover.clone(),
                booking: file.booking.clone(),
                session: session.clone(),
            }),
            _ => Err(CareError::not_found(EntityKind::Session, booking_id)),
        }
    }

    fn authorize(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        operation: &str,
        check: AuthCheck,
    ) -> Result<Arc<CareFile>, CareError> {
        let file = self
            .inner
            .registry
            .get(booking_id)
            .ok_or_else(|| CareError::not_found(EntityKind::Booking, booking_id))?;
        check(actor, &file.booking, operation)?;
        Ok(file)
    }

    fn update(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        operation: &'static str,
        check: AuthCheck,
        op: impl FnOnce(&mut HandoverRecord, Timestamp) -> Result<Option<DomainEventKind>, CareError>,
    ) -> Result<HandoverRecord, CareError> {
        self.authorize(actor, booking_id, operation, check)?;
        let committed = self
            .inner
            .registry
            .apply(booking_id, self.inner.clock.now(), *actor, |txn| {
                let now = txn.now();
                let handover = ensure_open(txn)?;
                if let Some(event) = op(handover, now)? {
                    txn.emit(event);
                }
                Ok(())
            })
            .inspect_err(|e| rejected(operation, booking_id, e))?;
        committed
            .file
            .handover
            .clone()
            .ok_or_else(|| CareError::not_found(EntityKind::Handover, booking_id))
    }
}

/// The booking's handover record, opened on first use.
fn ensure_open(txn: &mut Txn) -> Result<&mut HandoverRecord, CareError> {
    if txn.file.handover.is_none() {
        let booking = &txn.file.booking;
        match booking.status {
            BookingStatus::Confirmed => {}
            BookingStatus::Pending => {
                return Err(CareError::Precondition {
                    entity: EntityKind::Handover,
                    id: booking.id.to_string(),
                    state: booking.status.to_string(),
                    operation: "open handover".into(),
                    requirement: "a confirmed booking with an assigned sitter".into(),
                })
            }
            _ => {
                return Err(CareError::InvalidState {
                    entity: EntityKind::Booking,
                    id: booking.id.to_string(),
                    state: booking.status.to_string(),
                    operation: "open handover".into(),
                })
            }
        }
        let record = HandoverRecord::open(booking.id, txn.now());
        txn.file.handover = Some(record);
        txn.emit(DomainEventKind::HandoverOpened);
    }
    let booking_id = txn.file.booking.id;
    txn.file
        .handover
        .as_mut()
        .ok_or_else(|| CareError::not_found(EntityKind::Handover, booking_id))
}
