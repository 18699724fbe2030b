//! Transition log entries and transition outcomes shared by every machine.

use hearth_core::{Role, Timestamp};
use serde::{Deserialize, Serialize};

/// Record of a single state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
    pub from_state: S,
    pub to_state: S,
    pub timestamp: Timestamp,
    pub reason: String,
    /// Role of the caller that drove the transition.
    pub actor: Role,
}

/// Result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<S> {
    /// The state changed.
    Applied { from: S, to: S },
    /// The requested state was already reached. Nothing changed.
    Unchanged(S),
}

impl<S: Copy> Outcome<S> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// The state after the request.
    pub fn state(&self) -> S {
        match self {
            Self::Applied { to, .. } => *to,
            Self::Unchanged(s) => *s,
        }
    }
}
