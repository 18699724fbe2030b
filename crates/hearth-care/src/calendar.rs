//! Sitter availability.
//!
//! A sitter holds a reservation for every booking they are confirmed on
//! or caring for. Reservations for the same sitter never overlap.
//! Reserving happens inside the booking's gate as the last fallible step of
//! assignment; release happens after the commit that frees the sitter.

use std::collections::HashMap;

use hearth_core::{BookingId, CareError, CareWindow, EntityKind, SitterId};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub booking_id: BookingId,
    pub window: CareWindow,
}

#[derive(Debug, Default)]
pub struct SitterCalendar {
    reservations: Mutex<HashMap<SitterId, Vec<Reservation>>>,
}

impl SitterCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `window` for `sitter`. Re-reserving the same booking is a no-op.
    pub fn reserve(
        &self,
        sitter: SitterId,
        booking_id: BookingId,
        window: CareWindow,
    ) -> Result<(), CareError> {
        let mut all = self.reservations.lock();
        let held = all.entry(sitter).or_default();
        if held.iter().any(|r| r.booking_id == booking_id) {
            return Ok(());
        }
        if let Some(clash) = held.iter().find(|r| r.window.overlaps(&window)) {
            return Err(CareError::Conflict {
                entity: EntityKind::Sitter,
                id: sitter.to_string(),
                reason: format!("already booked for {} in an overlapping window", clash.booking_id),
            });
        }
        held.push(Reservation { booking_id, window });
        Ok(())
    }

    /// Returns whether a reservation was held.
    pub fn release(&self, sitter: SitterId, booking_id: BookingId) -> bool {
        let mut all = self.reservations.lock();
        let Some(held) = all.get_mut(&sitter) else {
            return false;
        };
        let before = held.len();
        held.retain(|r| r.booking_id != booking_id);
        let released = held.len() != before;
        if held.is_empty() {
            all.remove(&sitter);
        }
        released
    }

    pub fn reservations(&self, sitter: SitterId) -> Vec<Reservation> {
        let mut held = self
            .reservations
            .lock()
            .get(&sitter)
            .cloned()
            .unwrap_or_default();
        held.sort_by_key(|r| r.window.start());
        held
    }

    pub fn is_free(&self, sitter: SitterId, window: &CareWindow) -> bool {
        self.reservations
            .lock()
            .get(&sitter)
            .map_or(true, |held| !held.iter().any(|r| r.window.overlaps(window)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::Timestamp;

    fn window(start: &str, end: &str) -> CareWindow {
        CareWindow::new(Timestamp::parse(start).unwrap(), Timestamp::parse(end).unwrap()).unwrap()
    }

    #[test]
    fn overlapping_reservation_conflicts() {
        let cal = SitterCalendar::new();
        let sitter = SitterId::new();
        cal.reserve(
            sitter,
            BookingId::new(),
            window("2026-03-01T18:00:00Z", "2026-03-01T21:00:00Z"),
        )
        .unwrap();
        let err = cal
            .reserve(
                sitter,
                BookingId::new(),
                window("2026-03-01T20:00:00Z", "2026-03-01T23:00:00Z"),
            )
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        assert!(err.is_retryable());
    }

    #[test]
    fn back_to_back_is_fine() {
        let cal = SitterCalendar::new();
        let sitter = SitterId::new();
        cal.reserve(
            sitter,
            BookingId::new(),
            window("2026-03-01T18:00:00Z", "2026-03-01T21:00:00Z"),
        )
        .unwrap();
        cal.reserve(
            sitter,
            BookingId::new(),
            window("2026-03-01T21:00:00Z", "2026-03-01T23:00:00Z"),
        )
        .unwrap();
        assert_eq!(cal.reservations(sitter).len(), 2);
    }

    #[test]
    fn release_frees_the_window() {
        let cal = SitterCalendar::new();
        let sitter = SitterId::new();
        let booking = BookingId::new();
        let w = window("2026-03-01T18:00:00Z", "2026-03-01T21:00:00Z");
        cal.reserve(sitter, booking, w).unwrap();
        cal.reserve(sitter, booking, w).unwrap();
        assert!(!cal.is_free(sitter, &w));
        assert!(cal.release(sitter, booking));
        assert!(!cal.release(sitter, booking));
        assert!(cal.is_free(sitter, &w));
    }
}
