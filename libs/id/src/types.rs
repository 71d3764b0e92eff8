//! Typed ID definitions.

use crate::{define_id, define_key, IdError};

/// Maximum length of an externally-assigned key, in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Validates an externally-assigned key.
///
/// Keys are opaque: interior spaces are allowed (`"Room 101"`), blank and
/// control characters are not.
pub fn validate_key(s: &str) -> Result<(), IdError> {
    if s.trim().is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > MAX_KEY_LEN {
        return Err(IdError::TooLong {
            len: s.len(),
            max: MAX_KEY_LEN,
        });
    }
    if let Some(c) = s.chars().find(|c| c.is_control()) {
        return Err(IdError::InvalidCharacter(c));
    }
    Ok(())
}

// =============================================================================
// Externally-assigned keys
// =============================================================================

define_key!(RoomId, "room");
define_key!(UserId, "user");

// =============================================================================
// System-generated IDs
// =============================================================================

define_id!(RequestId, "req");

// =============================================================================
// Resource Version
// =============================================================================

/// Opaque per-document version stamp used for compare-and-swap writes.
///
/// Versions start at [`ResourceVersion::FIRST`] when a document is first
/// stored and increase by one on every successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceVersion(i64);

impl ResourceVersion {
    /// The version assigned to a newly stored document.
    pub const FIRST: Self = Self(1);

    /// Creates a version from its raw value.
    #[must_use]
    pub const fn new(version: i64) -> Self {
        Self(version)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Returns the version that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Default for ResourceVersion {
    fn default() -> Self {
        Self::FIRST
    }
}

impl std::fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for ResourceVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ResourceVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let version = i64::deserialize(deserializer)?;
        Ok(Self(version))
    }
}

// =============================================================================
// Tests
// =============================================================================
