//! # Care-Readiness Checklist
//!
//! A fixed set of boolean items per session. Items toggle independently
//! and only feed a readiness signal; nothing else in the lifecycle waits
//! on them.

use std::collections::BTreeMap;

use hearth_core::ValidationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItem {
    RoomSafetyChecked,
    ChildInfoConfirmed,
    SuppliesReady,
    EmergencyContactsReviewed,
}

impl ChecklistItem {
    pub const ALL: [ChecklistItem; 4] = [
        Self::RoomSafetyChecked,
        Self::ChildInfoConfirmed,
        Self::SuppliesReady,
        Self::EmergencyContactsReviewed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoomSafetyChecked => "room_safety_checked",
            Self::ChildInfoConfirmed => "child_info_confirmed",
            Self::SuppliesReady => "supplies_ready",
            Self::EmergencyContactsReviewed => "emergency_contacts_reviewed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|item| item.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownChecklistItem(s.to_string()))
    }
}

impl std::fmt::Display for ChecklistItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checklist state for one session. Every item is present; all start unchecked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    items: BTreeMap<ChecklistItem, bool>,
}

impl Checklist {
    pub fn new() -> Self {
        Self {
            items: ChecklistItem::ALL.into_iter().map(|i| (i, false)).collect(),
        }
    }

    /// Flip an item and return its new value.
    pub fn toggle(&mut self, item: ChecklistItem) -> bool {
        let entry = self.items.entry(item).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn is_checked(&self, item: ChecklistItem) -> bool {
        self.items.get(&item).copied().unwrap_or(false)
    }

    pub fn checked_count(&self) -> usize {
        self.items.values().filter(|v| **v).count()
    }

    /// All items checked.
    pub fn is_ready(&self) -> bool {
        self.checked_count() == ChecklistItem::ALL.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChecklistItem, bool)> + '_ {
        self.items.iter().map(|(k, v)| (*k, *v))
    }
}

impl Default for Checklist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unchecked() {
        let c = Checklist::new();
        assert_eq!(c.iter().count(), 4);
        assert_eq!(c.checked_count(), 0);
        assert!(!c.is_ready());
    }

    #[test]
    fn toggles_are_independent() {
        let mut c = Checklist::new();
        assert!(c.toggle(ChecklistItem::SuppliesReady));
        assert!(c.is_checked(ChecklistItem::SuppliesReady));
        assert!(!c.is_checked(ChecklistItem::RoomSafetyChecked));
        assert!(!c.toggle(ChecklistItem::SuppliesReady));
        assert_eq!(c.checked_count(), 0);
    }

    #[test]
    fn ready_when_all_checked() {
        let mut c = Checklist::new();
        for item in ChecklistItem::ALL {
            c.toggle(item);
        }
        assert!(c.is_ready());
    }

    #[test]
    fn parse_known_and_unknown() {
        assert_eq!(
            ChecklistItem::parse("supplies_ready").unwrap(),
            ChecklistItem::SuppliesReady
        );
        assert!(ChecklistItem::parse("snacks").is_err());
    }

    #[test]
    fn serializes_as_map() {
        let json = serde_json::to_value(Checklist::new()).unwrap();
        assert_eq!(json["items"]["room_safety_checked"], false);
    }
}
