//! # Trust Handover Protocol
//!
//! Guarded three-step hand-off that must complete before care starts.
//!
//! ```text
//! Step 1: Medical ──advance──▶ Step 2: EmergencyContact ──advance──▶ Step 3: Consent
//!            ◀──retreat──                    ◀──retreat──                 │
//!                                                                     finalize
//!                                                                         ▼
//!                                                                     Complete
//! ```
//!
//! - Data for a step is recorded only while the protocol sits on that step.
//! - `advance` fails with `StepIncomplete` until the step's required
//!   fields are set.
//! - `finalize` needs consent and a parent signature, and is idempotent.
//! - Cancelling the booking voids an in-flight record. A void record
//!   accepts no further operations.

use hearth_core::{ArtifactRef, BookingId, CareError, EntityKind, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

use crate::transition::Outcome;

const MAX_TEXT_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoverStep {
    Medical,
    EmergencyContact,
    Consent,
}

impl HandoverStep {
    /// 1-based step number.
    pub fn number(&self) -> u8 {
        match self {
            Self::Medical => 1,
            Self::EmergencyContact => 2,
            Self::Consent => 3,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Medical => Some(Self::EmergencyContact),
            Self::EmergencyContact => Some(Self::Consent),
            Self::Consent => None,
        }
    }

    pub fn previous(&self) -> Option<Self> {
        match self {
            Self::Medical => None,
            Self::EmergencyContact => Some(Self::Medical),
            Self::Consent => Some(Self::EmergencyContact),
        }
    }
}

impl std::fmt::Display for HandoverStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step {}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoverStatus {
    InProgress,
    Complete,
    Void,
}

impl HandoverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Void => "void",
        }
    }
}

impl std::fmt::Display for HandoverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step 1 data. Empty strings and "None" are valid answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalDisclosure {
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MedicalDisclosure {
    fn validate(&self) -> Result<(), ValidationError> {
        check_len("allergies", &self.allergies)?;
        check_len("medications", &self.medications)?;
        if let Some(n) = &self.notes {
            check_len("notes", n)?;
        }
        Ok(())
    }
}

/// Step 2 data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relationship: Option<String>,
}

impl EmergencyContact {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("emergency_contact.name"));
        }
        check_len("emergency_contact.name", &self.name)?;
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Err(ValidationError::EmptyField("emergency_contact.phone"));
        }
        let allowed = phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        if !allowed || !(7..=15).contains(&digits) {
            return Err(ValidationError::InvalidPhone(self.phone.clone()));
        }
        Ok(())
    }
}

fn check_len(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::FieldTooLong {
            field,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

/// Who a signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureParty {
    Parent,
    Sitter,
}

/// The handover record for one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverRecord {
    pub booking_id: BookingId,
    pub step: HandoverStep,
    pub status: HandoverStatus,
    pub medical: Option<MedicalDisclosure>,
    pub emergency_contact: Option<EmergencyContact>,
    pub consent_given: bool,
    pub parent_signature: Option<ArtifactRef>,
    pub sitter_signature: Option<ArtifactRef>,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub void_reason: Option<String>,
}

impl HandoverRecord {
    /// Open a fresh record at step 1.
    pub fn open(booking_id: BookingId, now: Timestamp) -> Self {
        Self {
            booking_id,
            step: HandoverStep::Medical,
            status: HandoverStatus::InProgress,
            medical: None,
            emergency_contact: None,
            consent_given: false,
            parent_signature: None,
            sitter_signature: None,
            opened_at: now,
            updated_at: now,
            completed_at: None,
            void_reason: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == HandoverStatus::Complete
    }

    pub fn submit_medical(
        &mut self,
        disclosure: MedicalDisclosure,
        now: Timestamp,
    ) -> Result<(), CareError> {
        self.require_step(HandoverStep::Medical, "submit medical disclosure")?;
        disclosure.validate()?;
        self.medical = Some(disclosure);
        self.updated_at = now;
        Ok(())
    }

    pub fn submit_emergency_contact(
        &mut self,
        contact: EmergencyContact,
        now: Timestamp,
    ) -> Result<(), CareError> {
        self.require_step(HandoverStep::EmergencyContact, "submit emergency contact")?;
        contact.validate()?;
        self.emergency_contact = Some(EmergencyContact {
            name: contact.name.trim().to_string(),
            phone: contact.phone.trim().to_string(),
            relationship: contact.relationship,
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn set_consent(&mut self, given: bool, now: Timestamp) -> Result<(), CareError> {
        self.require_step(HandoverStep::Consent, "record consent")?;
        self.consent_given = given;
        self.updated_at = now;
        Ok(())
    }

    pub fn attach_signature(
        &mut self,
        party: SignatureParty,
        signature: ArtifactRef,
        now: Timestamp,
    ) -> Result<(), CareError> {
        self.require_step(HandoverStep::Consent, "attach signature")?;
        match party {
            SignatureParty::Parent => self.parent_signature = Some(signature),
            SignatureParty::Sitter => self.sitter_signature = Some(signature),
        }
        self.updated_at = now;
        Ok(())
    }

    /// Required fields still unset for `step`.
    pub fn missing_for(&self, step: HandoverStep) -> Vec<String> {
        let mut missing = Vec::new();
        match step {
            HandoverStep::Medical => {
                if self.medical.is_none() {
                    missing.push("medical_disclosure".to_string());
                }
            }
            HandoverStep::EmergencyContact => {
                if self.emergency_contact.is_none() {
                    missing.push("emergency_contact".to_string());
                }
            }
            HandoverStep::Consent => {
                if !self.consent_given {
                    missing.push("consent".to_string());
                }
                if self.parent_signature.is_none() {
                    missing.push("parent_signature".to_string());
                }
            }
        }
        missing
    }

    /// Move to the next step once the current one is filled in.
    pub fn advance(&mut self, now: Timestamp) -> Result<HandoverStep, CareError> {
        self.require_open("advance")?;
        let Some(next) = self.step.next() else {
            return Err(CareError::InvalidTransition {
                entity: EntityKind::Handover,
                id: self.booking_id.to_string(),
                from: self.step.to_string(),
                to: "step 4".to_string(),
            });
        };
        self.require_filled()?;
        self.step = next;
        self.updated_at = now;
        Ok(next)
    }

    /// Go back one step. Previously entered data is kept.
    pub fn retreat(&mut self, now: Timestamp) -> Result<HandoverStep, CareError> {
        self.require_open("retreat")?;
        let Some(prev) = self.step.previous() else {
            return Err(CareError::InvalidTransition {
                entity: EntityKind::Handover,
                id: self.booking_id.to_string(),
                from: self.step.to_string(),
                to: "step 0".to_string(),
            });
        };
        self.step = prev;
        self.updated_at = now;
        Ok(prev)
    }

    /// Complete the protocol. Repeat calls after success are no-ops.
    pub fn finalize(&mut self, now: Timestamp) -> Result<Outcome<HandoverStatus>, CareError> {
        if self.status == HandoverStatus::Complete {
            return Ok(Outcome::Unchanged(self.status));
        }
        self.require_open("finalize")?;
        if self.step != HandoverStep::Consent {
            return Err(CareError::InvalidTransition {
                entity: EntityKind::Handover,
                id: self.booking_id.to_string(),
                from: self.step.to_string(),
                to: HandoverStatus::Complete.to_string(),
            });
        }
        self.require_filled()?;
        self.status = HandoverStatus::Complete;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(Outcome::Applied {
            from: HandoverStatus::InProgress,
            to: HandoverStatus::Complete,
        })
    }

    /// Void an in-flight record. A completed record cannot be voided.
    pub fn void(&mut self, reason: &str, now: Timestamp) -> Result<Outcome<HandoverStatus>, CareError> {
        match self.status {
            HandoverStatus::Void => Ok(Outcome::Unchanged(self.status)),
            HandoverStatus::Complete => Err(CareError::InvalidTransition {
                entity: EntityKind::Handover,
                id: self.booking_id.to_string(),
                from: self.status.to_string(),
                to: HandoverStatus::Void.to_string(),
            }),
            HandoverStatus::InProgress => {
                self.status = HandoverStatus::Void;
                self.void_reason = Some(reason.to_string());
                self.updated_at = now;
                Ok(Outcome::Applied {
                    from: HandoverStatus::InProgress,
                    to: HandoverStatus::Void,
                })
            }
        }
    }

    fn require_open(&self, operation: &str) -> Result<(), CareError> {
        if self.status != HandoverStatus::InProgress {
            return Err(CareError::InvalidState {
                entity: EntityKind::Handover,
                id: self.booking_id.to_string(),
                state: self.status.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn require_step(&self, step: HandoverStep, operation: &str) -> Result<(), CareError> {
        self.require_open(operation)?;
        if self.step != step {
            return Err(CareError::InvalidState {
                entity: EntityKind::Handover,
                id: self.booking_id.to_string(),
                state: format!("at {}", self.step),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn require_filled(&self) -> Result<(), CareError> {
        let missing = self.missing_for(self.step);
        if !missing.is_empty() {
            return Err(CareError::StepIncomplete {
                id: self.booking_id.to_string(),
                step: self.step.number(),
                missing,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Timestamp {
        Timestamp::parse("2026-03-01T17:30:00Z").unwrap()
    }

    fn contact() -> EmergencyContact {
        EmergencyContact {
            name: "Dana Ruiz".into(),
            phone: "+1 (415) 555-0100".into(),
            relationship: Some("aunt".into()),
        }
    }

    fn sig() -> ArtifactRef {
        ArtifactRef::new("sha256:feed").unwrap()
    }

    fn at_consent() -> HandoverRecord {
        let mut h = HandoverRecord::open(BookingId::new(), now());
        h.submit_medical(
            MedicalDisclosure {
                allergies: "None".into(),
                medications: String::new(),
                notes: None,
            },
            now(),
        )
        .unwrap();
        h.advance(now()).unwrap();
        h.submit_emergency_contact(contact(), now()).unwrap();
        h.advance(now()).unwrap();
        h
    }

    #[test]
    fn advance_requires_medical_submission() {
        let mut h = HandoverRecord::open(BookingId::new(), now());
        let err = h.advance(now()).unwrap_err();
        match err {
            CareError::StepIncomplete { step, missing, .. } => {
                assert_eq!(step, 1);
                assert_eq!(missing, vec!["medical_disclosure".to_string()]);
            }
            other => panic!("expected StepIncomplete, got {other:?}"),
        }
        assert_eq!(h.step, HandoverStep::Medical);
    }

    #[test]
    fn empty_medical_answers_are_accepted() {
        let mut h = HandoverRecord::open(BookingId::new(), now());
        h.submit_medical(
            MedicalDisclosure {
                allergies: String::new(),
                medications: String::new(),
                notes: None,
            },
            now(),
        )
        .unwrap();
        assert_eq!(h.advance(now()).unwrap(), HandoverStep::EmergencyContact);
    }

    #[test]
    fn emergency_contact_validation() {
        let mut h = HandoverRecord::open(BookingId::new(), now());
        h.submit_medical(
            MedicalDisclosure {
                allergies: "peanuts".into(),
                medications: "".into(),
                notes: None,
            },
            now(),
        )
        .unwrap();
        h.advance(now()).unwrap();

        let blank_name = EmergencyContact {
            name: "  ".into(),
            ..contact()
        };
        assert!(h.submit_emergency_contact(blank_name, now()).is_err());
        let bad_phone = EmergencyContact {
            phone: "call me".into(),
            ..contact()
        };
        assert!(h.submit_emergency_contact(bad_phone, now()).is_err());
        assert!(h.advance(now()).is_err());

        h.submit_emergency_contact(contact(), now()).unwrap();
        assert_eq!(h.advance(now()).unwrap(), HandoverStep::Consent);
    }

    #[test]
    fn step_data_only_accepted_on_its_step() {
        let mut h = HandoverRecord::open(BookingId::new(), now());
        let err = h.set_consent(true, now()).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert!(h.submit_emergency_contact(contact(), now()).is_err());
    }

    #[test]
    fn retreat_rules() {
        let mut h = HandoverRecord::open(BookingId::new(), now());
        assert_eq!(h.retreat(now()).unwrap_err().code(), "INVALID_TRANSITION");
        let mut h = at_consent();
        assert_eq!(h.retreat(now()).unwrap(), HandoverStep::EmergencyContact);
        assert!(h.emergency_contact.is_some());
        assert_eq!(h.advance(now()).unwrap(), HandoverStep::Consent);
    }

    #[test]
    fn finalize_needs_consent_and_parent_signature() {
        let mut h = at_consent();
        let err = h.finalize(now()).unwrap_err();
        match err {
            CareError::StepIncomplete { step, missing, .. } => {
                assert_eq!(step, 3);
                assert_eq!(missing, vec!["consent".to_string(), "parent_signature".to_string()]);
            }
            other => panic!("expected StepIncomplete, got {other:?}"),
        }
        h.set_consent(true, now()).unwrap();
        assert!(h.finalize(now()).is_err());
        h.attach_signature(SignatureParty::Parent, sig(), now()).unwrap();
        assert!(h.finalize(now()).unwrap().is_applied());
        assert!(h.is_complete());
        assert_eq!(h.completed_at, Some(now()));
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut h = at_consent();
        h.set_consent(true, now()).unwrap();
        h.attach_signature(SignatureParty::Parent, sig(), now()).unwrap();
        h.finalize(now()).unwrap();
        let later = now().plus(chrono::Duration::minutes(5));
        assert_eq!(
            h.finalize(later).unwrap(),
            Outcome::Unchanged(HandoverStatus::Complete)
        );
        assert_eq!(h.completed_at, Some(now()));
    }

    #[test]
    fn advance_past_step_three_rejected() {
        let mut h = at_consent();
        h.set_consent(true, now()).unwrap();
        h.attach_signature(SignatureParty::Parent, sig(), now()).unwrap();
        assert_eq!(h.advance(now()).unwrap_err().code(), "INVALID_TRANSITION");
    }

    #[test]
    fn finalize_before_step_three_rejected() {
        let mut h = HandoverRecord::open(BookingId::new(), now());
        assert!(h.finalize(now()).is_err());
        assert_eq!(h.status, HandoverStatus::InProgress);
    }

    #[test]
    fn void_blocks_further_operations() {
        let mut h = at_consent();
        assert!(h.void("booking cancelled", now()).unwrap().is_applied());
        assert!(!h.void("again", now()).unwrap().is_applied());
        assert_eq!(h.set_consent(true, now()).unwrap_err().code(), "INVALID_STATE");
        assert_eq!(h.finalize(now()).unwrap_err().code(), "INVALID_STATE");
        assert_eq!(h.void_reason.as_deref(), Some("booking cancelled"));
    }

    #[test]
    fn completed_record_cannot_be_voided() {
        let mut h = at_consent();
        h.set_consent(true, now()).unwrap();
        h.attach_signature(SignatureParty::Parent, sig(), now()).unwrap();
        h.finalize(now()).unwrap();
        assert!(h.void("late cancel", now()).is_err());
        assert!(h.is_complete());
    }
}
