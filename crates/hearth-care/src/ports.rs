//! # Collaborator Ports
//!
//! The runtime depends on four external systems through these traits:
//! the child directory (identity), the artifact store (signatures and
//! photos), the record repository (durable copy of each care file), and
//! the notification dispatcher (push to parents, sitters, and hotel staff).
//!
//! All ports are synchronous. Child lookups and artifact uploads run before
//! the per-booking gate is taken; repository writes and notifications run
//! on the outbox relay, never inside a transition.

use hearth_core::{ArtifactRef, ChildId, ParentId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::DomainEvent;
use crate::registry::CareFile;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Transient; the relay retries these with backoff.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}

impl PortError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub trait ChildDirectory: Send + Sync {
    /// Whether `child` is registered under `parent`.
    fn is_registered(&self, parent: ParentId, child: ChildId) -> Result<bool, PortError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Signature,
    Photo,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::Photo => "photo",
        }
    }
}

pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` and return a stable reference to them.
    fn put(
        &self,
        kind: ArtifactKind,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<ArtifactRef, PortError>;
}

pub trait RecordRepository: Send + Sync {
    /// Persist a snapshot. `version` increases with every commit to the
    /// same booking; implementations must ignore stale versions.
    fn save(&self, version: u64, file: &CareFile) -> Result<(), PortError>;
}

pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, event: &DomainEvent) -> Result<(), PortError>;
}
