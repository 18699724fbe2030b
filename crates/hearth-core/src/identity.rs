//! # Identity Newtypes
//!
//! Identifier and reference newtypes shared across the lifecycle.
//!
//! ## Validation
//!
//! UUID-based identifiers are always valid by construction. String-based
//! values ([`RoomNumber`], [`ConfirmationCode`], [`ArtifactRef`]) validate
//! their format in `new()` and again on deserialization, so a malformed
//! value can never enter the system through a request body.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Route deserialization through the validating constructor.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Declare a UUID-backed identifier newtype.
macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(Uuid);

        impl $ty {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse from the hyphenated UUID form.
            pub fn parse(s: &str) -> Result<Self, ValidationError> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidIdentifier(s.to_string()))
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

uuid_identifier!(
    /// A childcare booking tied to one hotel stay.
    BookingId
);
uuid_identifier!(
    /// A live care session. At most one exists per booking.
    SessionId
);
uuid_identifier!(
    /// A single entry in a session's activity ledger.
    ActivityEventId
);
uuid_identifier!(
    /// A recorded safety incident.
    IncidentId
);
uuid_identifier!(
    /// The guest who books care.
    ParentId
);
uuid_identifier!(
    /// A vetted childcare provider.
    SitterId
);
uuid_identifier!(
    /// A child registered to a parent.
    ChildId
);

// ---------------------------------------------------------------------------
// String-based values (validated at construction)
// ---------------------------------------------------------------------------

/// Hotel room identifier where care takes place.
///
/// 1 to 16 ASCII letters, digits, or `-`. Stored uppercase so `"12a"` and
/// `"12A"` refer to the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoomNumber(String);

impl RoomNumber {
    /// Maximum length of a room identifier.
    pub const MAX_LEN: usize = 16;

    /// Validate and normalize a room identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim().to_ascii_uppercase();
        if s.is_empty()
            || s.len() > Self::MAX_LEN
            || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ValidationError::InvalidRoomNumber(raw));
        }
        Ok(Self(s))
    }

    /// Access the normalized room string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(RoomNumber);

impl std::fmt::Display for RoomNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-shareable booking confirmation code, `HX-XXXX-XXXX`.
///
/// Characters come from an alphabet without look-alikes (no `0`, `O`,
/// `1`, `I`), so codes survive being read aloud at a front desk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConfirmationCode(String);

impl ConfirmationCode {
    /// Alphabet used for generated codes.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    const PREFIX: &'static str = "HX-";

    /// Generate a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut code = String::with_capacity(12);
        code.push_str(Self::PREFIX);
        for i in 0..8 {
            if i == 4 {
                code.push('-');
            }
            let idx = rng.gen_range(0..Self::ALPHABET.len());
            code.push(Self::ALPHABET[idx] as char);
        }
        Self(code)
    }

    /// Parse a code, accepting lowercase input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim().to_ascii_uppercase();
        let valid = s.len() == 12
            && s.starts_with(Self::PREFIX)
            && s.as_bytes()[7] == b'-'
            && s[3..]
                .bytes()
                .enumerate()
                .all(|(i, b)| i == 4 || Self::ALPHABET.contains(&b));
        if !valid {
            return Err(ValidationError::InvalidConfirmationCode(raw));
        }
        Ok(Self(s))
    }

    /// Access the code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(ConfirmationCode);

impl std::fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a blob held by the artifact store.
///
/// The lifecycle never sees artifact bytes, only this reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Maximum reference length.
    pub const MAX_LEN: usize = 512;

    /// Validate a reference: non-empty, bounded, no whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() || s.len() > Self::MAX_LEN || s.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidArtifactRef(s));
        }
        Ok(Self(s))
    }

    /// Access the reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(ArtifactRef);

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn uuid_identifiers_are_distinct_and_parse() {
        let a = BookingId::new();
        let b = BookingId::new();
        assert_ne!(a, b);
        let parsed = BookingId::parse(&a.to_string()).unwrap();
        assert_eq!(parsed, a);
        assert!(SessionId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn identifier_serializes_as_bare_uuid() {
        let id = SitterId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn room_number_normalizes_case() {
        let room = RoomNumber::new(" 12a ").unwrap();
        assert_eq!(room.as_str(), "12A");
    }

    #[test]
    fn room_number_rejects_bad_input() {
        assert!(RoomNumber::new("").is_err());
        assert!(RoomNumber::new("room 12").is_err());
        assert!(RoomNumber::new("A".repeat(17)).is_err());
    }

    #[test]
    fn room_number_deserialize_validates() {
        let bad: Result<RoomNumber, _> = serde_json::from_str("\"12/B\"");
        assert!(bad.is_err());
        let ok: RoomNumber = serde_json::from_str("\"1204\"").unwrap();
        assert_eq!(ok.as_str(), "1204");
    }

    #[test]
    fn generated_codes_validate() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = ConfirmationCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), 12);
            let reparsed = ConfirmationCode::new(code.as_str().to_ascii_lowercase()).unwrap();
            assert_eq!(reparsed, code);
        }
    }

    #[test]
    fn confirmation_code_rejects_lookalikes() {
        assert!(ConfirmationCode::new("HX-ABCD-EFGH").is_ok());
        assert!(ConfirmationCode::new("HX-AB0D-EFGH").is_err());
        assert!(ConfirmationCode::new("HX-ABCDEFGHJ").is_err());
        assert!(ConfirmationCode::new("QX-ABCD-EFGH").is_err());
    }

    #[test]
    fn artifact_ref_rejects_whitespace() {
        assert!(ArtifactRef::new("sha256:abc").is_ok());
        assert!(ArtifactRef::new("").is_err());
        assert!(ArtifactRef::new("a b").is_err());
    }
}
