//! # Caller Identity
//!
//! The lifecycle uses the caller's role and subject id for authorization
//! only. Authentication happens outside the core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{ParentId, SitterId};

/// Roles recognized by the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Guest who owns the booking.
    Parent,
    /// Childcare provider assigned to the booking.
    Sitter,
    /// Hotel operations staff. Assigns sitters, triages incidents.
    HotelStaff,
    /// Internal jobs such as the stale-booking sweep.
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Sitter => "sitter",
            Self::HotelStaff => "hotel_staff",
            Self::System => "system",
        }
    }

    /// Parse the wire name of a role.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "parent" => Some(Self::Parent),
            "sitter" => Some(Self::Sitter),
            "hotel_staff" => Some(Self::HotelStaff),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Staff and system callers act across every booking.
    pub fn is_operator(&self) -> bool {
        matches!(self, Self::HotelStaff | Self::System)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller: a role bound to a subject id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    pub subject: Uuid,
}

impl Actor {
    pub fn new(role: Role, subject: Uuid) -> Self {
        Self { role, subject }
    }

    pub fn parent(id: ParentId) -> Self {
        Self::new(Role::Parent, *id.as_uuid())
    }

    pub fn sitter(id: SitterId) -> Self {
        Self::new(Role::Sitter, *id.as_uuid())
    }

    pub fn staff(subject: Uuid) -> Self {
        Self::new(Role::HotelStaff, subject)
    }

    /// The internal system actor (nil subject).
    pub fn system() -> Self {
        Self::new(Role::System, Uuid::nil())
    }

    /// Whether this caller is the given parent.
    pub fn is_parent(&self, id: ParentId) -> bool {
        self.role == Role::Parent && self.subject == *id.as_uuid()
    }

    /// Whether this caller is the given sitter.
    pub fn is_sitter(&self, id: SitterId) -> bool {
        self.role == Role::Sitter && self.subject == *id.as_uuid()
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.subject)
    }
}
