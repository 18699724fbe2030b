//! # Error Types: Structured Error Hierarchy
//!
//! All errors use `thiserror`. Two layers:
//!
//! - [`ValidationError`] covers field-level input faults detected before
//!   any state is touched.
//! - [`CareError`] is what every lifecycle operation returns. Transition
//!   variants carry the entity kind, its id, the current state, and the
//!   attempted target so callers can act without parsing messages.

use thiserror::Error;

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Booking,
    Handover,
    Session,
    Activity,
    Incident,
    Sitter,
    Child,
}

impl EntityKind {
    /// Lowercase name used in messages and error details.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Handover => "handover",
            Self::Session => "session",
            Self::Activity => "activity",
            Self::Incident => "incident",
            Self::Sitter => "sitter",
            Self::Child => "child",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty after trimming.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A text field exceeded its maximum length.
    #[error("{field} exceeds {max} characters")]
    FieldTooLong {
        /// Field name.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },

    /// Room identifier is empty, too long, or contains unsupported characters.
    #[error("invalid room number: \"{0}\" (expected 1-16 letters, digits or '-')")]
    InvalidRoomNumber(String),

    /// Confirmation code does not match `HX-XXXX-XXXX`.
    #[error("invalid confirmation code: \"{0}\" (expected HX-XXXX-XXXX)")]
    InvalidConfirmationCode(String),

    /// Artifact reference is empty or contains whitespace.
    #[error("invalid artifact reference: \"{0}\"")]
    InvalidArtifactRef(String),

    /// Currency is not a three-letter ISO 4217 code.
    #[error("invalid currency code: \"{0}\" (expected 3 uppercase letters)")]
    InvalidCurrency(String),

    /// Phone number has too few digits or unsupported characters.
    #[error("invalid phone number: \"{0}\"")]
    InvalidPhone(String),

    /// Identifier string is not a UUID.
    #[error("invalid identifier: \"{0}\"")]
    InvalidIdentifier(String),

    /// Timestamp string is not valid UTC RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Care window end is not after its start.
    #[error("care window end {end} must be after start {start}")]
    InvalidWindow {
        /// Window start (ISO 8601).
        start: String,
        /// Window end (ISO 8601).
        end: String,
    },

    /// Care window starts in the past or inside the booking lead time.
    #[error("care window must start after {earliest}, got {start}")]
    WindowInPast {
        /// Requested start.
        start: String,
        /// Earliest acceptable start.
        earliest: String,
    },

    /// Care window duration outside the platform limits.
    #[error("care duration of {minutes} minutes is outside the permitted range {min}..={max}")]
    DurationOutOfRange {
        /// Requested duration in minutes.
        minutes: i64,
        /// Platform minimum.
        min: i64,
        /// Platform maximum.
        max: i64,
    },

    /// A booking must reference at least one child.
    #[error("a booking must include at least one child")]
    NoChildren,

    /// Too many children for a single sitter.
    #[error("{count} children exceeds the limit of {max} per booking")]
    TooManyChildren {
        /// Requested count.
        count: usize,
        /// Policy limit.
        max: usize,
    },

    /// The same child appears twice in one booking.
    #[error("child {0} is listed more than once")]
    DuplicateChild(String),

    /// A referenced child does not exist for this parent.
    #[error("child {0} is not registered to this parent")]
    UnknownChild(String),

    /// A checklist item key is not part of the fixed item set.
    #[error("unknown checklist item: \"{0}\"")]
    UnknownChecklistItem(String),
}

/// Error returned by every lifecycle operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CareError {
    /// Input failed validation. Nothing was mutated.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The transition is not permitted from the current state.
    #[error("invalid {entity} transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// Entity kind.
        entity: EntityKind,
        /// Entity id.
        id: String,
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// The transition is structurally valid but a guard is unmet.
    #[error("precondition failed for {entity} {id} ({state}): {operation} requires {requirement}")]
    Precondition {
        /// Entity kind.
        entity: EntityKind,
        /// Entity id.
        id: String,
        /// Current state.
        state: String,
        /// The attempted operation.
        operation: String,
        /// What must hold first.
        requirement: String,
    },

    /// The operation collides with another record.
    #[error("conflict on {entity} {id}: {reason}")]
    Conflict {
        /// Entity kind.
        entity: EntityKind,
        /// Entity id.
        id: String,
        /// What collided.
        reason: String,
    },

    /// The operation is not accepted in the entity's current state.
    #[error("{entity} {id} is {state}: {operation} not permitted")]
    InvalidState {
        /// Entity kind.
        entity: EntityKind,
        /// Entity id.
        id: String,
        /// Current state.
        state: String,
        /// The rejected operation.
        operation: String,
    },

    /// A handover step cannot be left until its fields are populated.
    #[error("handover {id} step {step} incomplete: missing {}", .missing.join(", "))]
    StepIncomplete {
        /// Booking id owning the handover.
        id: String,
        /// Step number (1..=3).
        step: u8,
        /// Names of the unset required fields.
        missing: Vec<String>,
    },

    /// The referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: EntityKind,
        /// Requested id.
        id: String,
    },

    /// The caller's role or identity does not permit the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A collaborator (directory, artifact store) could not be reached.
    /// Raised before any state is touched.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

impl CareError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Precondition { .. } => "PRECONDITION_FAILED",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::StepIncomplete { .. } => "STEP_INCOMPLETE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unavailable(_) => "UNAVAILABLE",
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    ///
    /// Conflicts clear when the colliding booking is cancelled; an
    /// unavailable collaborator may come back.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }

    /// Shorthand for a not-found error.
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_names_states() {
        let err = CareError::InvalidTransition {
            entity: EntityKind::Booking,
            id: "b-1".into(),
            from: "in_progress".into(),
            to: "cancelled".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("booking"));
        assert!(msg.contains("in_progress -> cancelled"));
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn step_incomplete_lists_missing_fields() {
        let err = CareError::StepIncomplete {
            id: "b-1".into(),
            step: 3,
            missing: vec!["consent".into(), "parent_signature".into()],
        };
        assert!(err.to_string().ends_with("missing consent, parent_signature"));
    }

    #[test]
    fn validation_converts_via_from() {
        let err: CareError = ValidationError::NoChildren.into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflict_and_unavailable_are_retryable() {
        let conflict = CareError::Conflict {
            entity: EntityKind::Sitter,
            id: "s1".into(),
            reason: "overlap".into(),
        };
        assert!(conflict.is_retryable());
        assert!(CareError::Unavailable("directory".into()).is_retryable());
        assert!(!CareError::not_found(EntityKind::Session, "x").is_retryable());
        assert!(!CareError::Forbidden("no".into()).is_retryable());
    }
}
