//! Role checks.
//!
//! Hotel staff and the system act on any booking. Parents act on their own
//! bookings; sitters on bookings they are assigned to.

use hearth_core::{Actor, CareError};
use hearth_state::Booking;

pub(crate) fn require_operator(actor: &Actor, operation: &str) -> Result<(), CareError> {
    if actor.role.is_operator() {
        return Ok(());
    }
    Err(CareError::Forbidden(format!(
        "{} may not {operation}",
        actor.role
    )))
}

pub(crate) fn is_owner(actor: &Actor, booking: &Booking) -> bool {
    actor.is_parent(booking.parent_id)
}

pub(crate) fn is_assigned_sitter(actor: &Actor, booking: &Booking) -> bool {
    booking.sitter_id.is_some_and(|s| actor.is_sitter(s))
}

/// Owner, assigned sitter, or operator.
pub(crate) fn require_party(
    actor: &Actor,
    booking: &Booking,
    operation: &str,
) -> Result<(), CareError> {
    if actor.role.is_operator() || is_owner(actor, booking) || is_assigned_sitter(actor, booking) {
        return Ok(());
    }
    Err(forbidden(actor, booking, operation))
}

pub(crate) fn require_owner(
    actor: &Actor,
    booking: &Booking,
    operation: &str,
) -> Result<(), CareError> {
    if actor.role.is_operator() || is_owner(actor, booking) {
        return Ok(());
    }
    Err(forbidden(actor, booking, operation))
}

pub(crate) fn require_sitter(
    actor: &Actor,
    booking: &Booking,
    operation: &str,
) -> Result<(), CareError> {
    if actor.role.is_operator() || is_assigned_sitter(actor, booking) {
        return Ok(());
    }
    Err(forbidden(actor, booking, operation))
}

fn forbidden(actor: &Actor, booking: &Booking, operation: &str) -> CareError {
    CareError::Forbidden(format!(
        "{} is not permitted to {operation} on booking {}",
        actor.role, booking.id
    ))
}
