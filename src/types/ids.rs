//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using a
//! CharacterId where a FacilityId is expected) and make the code more
//! self-documenting. All IDs arrive from the census stream as decimal strings
//! and are parsed into integers at the validation boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A character (player) identifier.
///
/// The census API uses `0` as a sentinel for "no character" (e.g., the
/// attacker of an environmental death). Use [`CharacterId::is_placeholder`]
/// to detect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub u64);

impl CharacterId {
    /// Returns true if this is the `0` sentinel rather than a real character.
    pub fn is_placeholder(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CharacterId {
    fn from(n: u64) -> Self {
        CharacterId(n)
    }
}

/// A facility (base) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(pub u64);

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FacilityId {
    fn from(n: u64) -> Self {
        FacilityId(n)
    }
}

/// A game server (world) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub u16);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for WorldId {
    fn from(n: u16) -> Self {
        WorldId(n)
    }
}

/// A continent (zone) identifier.
///
/// Zone IDs above `0xFFFF` encode instanced zones in the upper bits; the
/// listener stores them as delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ZoneId {
    fn from(n: u32) -> Self {
        ZoneId(n)
    }
}

/// A faction identifier (VS 1, NC 2, TR 3, NSO 4; 0 for unowned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub u16);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for FactionId {
    fn from(n: u16) -> Self {
        FactionId(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_id_placeholder() {
        assert!(CharacterId(0).is_placeholder());
        assert!(!CharacterId(5428010618020694593).is_placeholder());
    }

    #[test]
    fn ids_display_as_plain_numbers() {
        assert_eq!(CharacterId(42).to_string(), "42");
        assert_eq!(FacilityId(222280).to_string(), "222280");
        assert_eq!(WorldId(13).to_string(), "13");
        assert_eq!(ZoneId(2).to_string(), "2");
        assert_eq!(FactionId(3).to_string(), "3");
    }

    #[test]
    fn character_ids_order_numerically() {
        // RelativePlayerBlip pair normalization relies on Ord.
        assert!(CharacterId(1) < CharacterId(2));
        assert!(CharacterId(100) > CharacterId(99));
    }
}
