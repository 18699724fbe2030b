//! Booking price quotes.
//!
//! The window duration is rounded up to the billing increment, then billed
//! at the hourly rate plus a per-hour surcharge for each child beyond the
//! first. All arithmetic is integer cents.

use hearth_core::{CareWindow, Money, ValidationError};

use crate::config::CarePolicy;

/// Minutes actually billed for `window`.
pub fn billable_minutes(policy: &CarePolicy, window: &CareWindow) -> i64 {
    let increment = policy.billing_increment_minutes.max(1);
    let seconds = window.duration().num_seconds().max(0);
    let minutes = (seconds + 59) / 60;
    ((minutes + increment - 1) / increment) * increment
}

pub fn quote(
    policy: &CarePolicy,
    window: &CareWindow,
    children: usize,
) -> Result<Money, ValidationError> {
    let billable = billable_minutes(policy, window);
    let extra_children = children.saturating_sub(1) as i64;
    let per_hour = policy
        .hourly_rate_cents
        .saturating_add(policy.additional_child_rate_cents.saturating_mul(extra_children));
    let cents = per_hour.saturating_mul(billable) / 60;
    Money::new(cents, policy.currency.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::Timestamp;

    fn window(start: &str, end: &str) -> CareWindow {
        CareWindow::new(Timestamp::parse(start).unwrap(), Timestamp::parse(end).unwrap()).unwrap()
    }

    #[test]
    fn three_hours_one_child() {
        let w = window("2026-03-01T18:00:00Z", "2026-03-01T21:00:00Z");
        let price = quote(&CarePolicy::default(), &w, 1).unwrap();
        assert_eq!(price.minor_units(), 7500);
        assert_eq!(price.currency(), "USD");
    }

    #[test]
    fn rounds_up_to_increment() {
        let w = window("2026-03-01T18:00:00Z", "2026-03-01T19:01:00Z");
        assert_eq!(billable_minutes(&CarePolicy::default(), &w), 75);
    }

    #[test]
    fn additional_children_surcharge() {
        let w = window("2026-03-01T18:00:00Z", "2026-03-01T20:00:00Z");
        // 2h * (2500 + 2 * 800)
        assert_eq!(quote(&CarePolicy::default(), &w, 3).unwrap().minor_units(), 8200);
    }

    #[test]
    fn partial_minute_counts_as_a_minute() {
        let w = window("2026-03-01T18:00:00Z", "2026-03-01T19:00:00.500Z");
        let policy = CarePolicy {
            billing_increment_minutes: 1,
            ..CarePolicy::default()
        };
        assert_eq!(billable_minutes(&policy, &w), 61);
    }
}
