//! # hearth-core: Foundational Types for Hearth
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! shares: identifier newtypes, validated value types, UTC timestamps,
//! caller identity, money, and the error taxonomy returned by every
//! lifecycle operation.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `BookingId`, `SessionId`,
//!    `SitterId` and friends are distinct types. A `ChildId` cannot be
//!    passed where a `SitterId` is expected.
//!
//! 2. **Validated constructors.** `RoomNumber`, `ConfirmationCode` and
//!    `ArtifactRef` reject malformed input at construction and on
//!    deserialization.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] is always UTC with millisecond
//!    precision, so activity ordering is stable across serialization.
//!
//! 4. **One error taxonomy.** [`CareError`] names the entity, its current
//!    state, and the attempted transition for every rejected operation.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `hearth-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod actor;
pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

pub use actor::{Actor, Role};
pub use error::{CareError, EntityKind, ValidationError};
pub use identity::{
    ActivityEventId, ArtifactRef, BookingId, ChildId, ConfirmationCode, IncidentId, ParentId,
    RoomNumber, SessionId, SitterId,
};
pub use money::Money;
pub use temporal::{CareWindow, Timestamp};
