//! # Care Policy Configuration
//!
//! Operator-tunable limits and rates, loaded from YAML. Every field has a
//! default, so an empty document (or no file at all) yields a working
//! policy.
//!
//! ```yaml
//! policy:
//!   min_duration_minutes: 60
//!   hourly_rate_cents: 2500
//!   currency: USD
//! relay:
//!   max_retries: 3
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use hearth_core::{CareWindow, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policy file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("I/O error reading policy: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse policy YAML at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid policy: {0}")]
    Invalid(String),
}

/// Booking limits, pricing, and the assignment deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarePolicy {
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    /// Minimum gap between "now" and the window start at creation.
    pub min_lead_minutes: i64,
    /// A booking still pending this many minutes before its window starts
    /// is cancelled by the expiry sweep.
    pub assignment_cutoff_minutes: i64,
    pub hourly_rate_cents: i64,
    /// Per hour, for each child beyond the first.
    pub additional_child_rate_cents: i64,
    pub billing_increment_minutes: i64,
    pub currency: String,
    pub max_children: usize,
}

impl Default for CarePolicy {
    fn default() -> Self {
        Self {
            min_duration_minutes: 60,
            max_duration_minutes: 720,
            min_lead_minutes: 0,
            assignment_cutoff_minutes: 30,
            hourly_rate_cents: 2500,
            additional_child_rate_cents: 800,
            billing_increment_minutes: 15,
            currency: "USD".to_string(),
            max_children: 4,
        }
    }
}

impl CarePolicy {
    /// Reject internally inconsistent settings.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.min_duration_minutes <= 0 {
            return Err(PolicyError::Invalid(
                "min_duration_minutes must be positive".into(),
            ));
        }
        if self.max_duration_minutes < self.min_duration_minutes {
            return Err(PolicyError::Invalid(format!(
                "max_duration_minutes ({}) is below min_duration_minutes ({})",
                self.max_duration_minutes, self.min_duration_minutes
            )));
        }
        if self.min_lead_minutes < 0 || self.assignment_cutoff_minutes < 0 {
            return Err(PolicyError::Invalid(
                "lead and cutoff minutes must not be negative".into(),
            ));
        }
        if self.hourly_rate_cents < 0 || self.additional_child_rate_cents < 0 {
            return Err(PolicyError::Invalid("rates must not be negative".into()));
        }
        if self.billing_increment_minutes <= 0 {
            return Err(PolicyError::Invalid(
                "billing_increment_minutes must be positive".into(),
            ));
        }
        if self.max_children == 0 {
            return Err(PolicyError::Invalid("max_children must be at least 1".into()));
        }
        let currency_ok =
            self.currency.len() == 3 && self.currency.bytes().all(|b| b.is_ascii_uppercase());
        if !currency_ok {
            return Err(PolicyError::Invalid(format!(
                "currency {:?} is not an ISO 4217 code",
                self.currency
            )));
        }
        Ok(())
    }

    /// Check a requested window against the duration limits and lead time.
    ///
    /// The effective lead is never shorter than the assignment cutoff: a
    /// booking must leave staff time to assign a sitter before the expiry
    /// sweep would cancel it.
    pub fn check_window(&self, window: &CareWindow, now: Timestamp) -> Result<(), ValidationError> {
        let lead = self.min_lead_minutes.max(self.assignment_cutoff_minutes);
        let earliest = now.plus(Duration::minutes(lead));
        if window.start() <= now
            || window.start() < earliest
            || self.assignment_deadline(window) <= now
        {
            return Err(ValidationError::WindowInPast {
                start: window.start().to_iso8601(),
                earliest: earliest.to_iso8601(),
            });
        }
        let minutes = window.duration_minutes();
        if minutes < self.min_duration_minutes || minutes > self.max_duration_minutes {
            return Err(ValidationError::DurationOutOfRange {
                minutes,
                min: self.min_duration_minutes,
                max: self.max_duration_minutes,
            });
        }
        Ok(())
    }

    /// Instant after which a still-pending booking for `window` expires.
    pub fn assignment_deadline(&self, window: &CareWindow) -> Timestamp {
        window
            .start()
            .plus(Duration::minutes(-self.assignment_cutoff_minutes))
    }
}

/// Delivery settings for the outbox relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Retries after the first attempt, per delivery.
    pub max_retries: u32,
    /// Doubles on each retry.
    pub base_delay_ms: u64,
    pub batch_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            batch_size: 64,
        }
    }
}

/// Root of the policy YAML document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareConfig {
    pub policy: CarePolicy,
    pub relay: RelayConfig,
}

impl CareConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PolicyError> {
        Self::parse(yaml, Path::new("<inline>"))
    }

    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PolicyError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                PolicyError::Io(e)
            }
        })?;
        Self::parse(&content, path)
    }

    fn parse(yaml: &str, path: &Path) -> Result<Self, PolicyError> {
        // An empty document deserializes as unit, not as an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| PolicyError::YamlParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.policy.validate()?;
        if config.relay.batch_size == 0 {
            return Err(PolicyError::Invalid("relay.batch_size must be positive".into()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        CarePolicy::default().validate().unwrap();
        assert_eq!(RelayConfig::default().max_retries, 3);
    }

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(CareConfig::from_yaml_str("").unwrap(), CareConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let cfg = CareConfig::from_yaml_str(
            "policy:\n  hourly_rate_cents: 3000\n  currency: EUR\nrelay:\n  base_delay_ms: 5\n",
        )
        .unwrap();
        assert_eq!(cfg.policy.hourly_rate_cents, 3000);
        assert_eq!(cfg.policy.currency, "EUR");
        assert_eq!(cfg.policy.max_children, 4);
        assert_eq!(cfg.relay.base_delay_ms, 5);
        assert_eq!(cfg.relay.batch_size, 64);
    }

    #[test]
    fn inconsistent_durations_rejected() {
        let err = CareConfig::from_yaml_str(
            "policy:\n  min_duration_minutes: 120\n  max_duration_minutes: 60\n",
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Invalid(_)));
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let err = CareConfig::from_yaml_str("policy: [").unwrap_err();
        assert!(err.to_string().contains("<inline>"));
    }

    #[test]
    fn missing_file() {
        let err = CareConfig::load(Path::new("/nonexistent/hearth-policy.yaml")).unwrap_err();
        assert!(matches!(err, PolicyError::FileNotFound { .. }));
    }

    #[test]
    fn window_checks() {
        let policy = CarePolicy::default();
        let now = ts("2026-03-01T12:00:00Z");
        let ok = CareWindow::new(ts("2026-03-01T18:00:00Z"), ts("2026-03-01T21:00:00Z")).unwrap();
        policy.check_window(&ok, now).unwrap();

        let past = CareWindow::new(ts("2026-03-01T11:00:00Z"), ts("2026-03-01T13:00:00Z")).unwrap();
        assert!(matches!(
            policy.check_window(&past, now),
            Err(ValidationError::WindowInPast { .. })
        ));

        let short = CareWindow::new(ts("2026-03-01T18:00:00Z"), ts("2026-03-01T18:30:00Z")).unwrap();
        assert!(matches!(
            policy.check_window(&short, now),
            Err(ValidationError::DurationOutOfRange { minutes: 30, .. })
        ));
    }

    #[test]
    fn lead_time_enforced() {
        let policy = CarePolicy {
            min_lead_minutes: 120,
            ..CarePolicy::default()
        };
        let now = ts("2026-03-01T12:00:00Z");
        let soon = CareWindow::new(ts("2026-03-01T13:00:00Z"), ts("2026-03-01T15:00:00Z")).unwrap();
        assert!(policy.check_window(&soon, now).is_err());
    }

    #[test]
    fn window_inside_assignment_cutoff_rejected() {
        let policy = CarePolicy::default();
        let now = ts("2026-03-01T12:00:00Z");
        let rushed = CareWindow::new(ts("2026-03-01T12:20:00Z"), ts("2026-03-01T14:20:00Z")).unwrap();
        assert!(matches!(
            policy.check_window(&rushed, now),
            Err(ValidationError::WindowInPast { .. })
        ));
        let at_cutoff =
            CareWindow::new(ts("2026-03-01T12:30:00Z"), ts("2026-03-01T14:30:00Z")).unwrap();
        assert!(policy.check_window(&at_cutoff, now).is_err());
        let after_cutoff =
            CareWindow::new(ts("2026-03-01T12:31:00Z"), ts("2026-03-01T14:31:00Z")).unwrap();
        policy.check_window(&after_cutoff, now).unwrap();
        assert!(policy.assignment_deadline(&after_cutoff) > now);
    }

    #[test]
    fn deadline_precedes_start() {
        let policy = CarePolicy::default();
        let w = CareWindow::new(ts("2026-03-01T18:00:00Z"), ts("2026-03-01T21:00:00Z")).unwrap();
        assert_eq!(policy.assignment_deadline(&w), ts("2026-03-01T17:30:00Z"));
    }
}
