//! Normalized internal event records ("Blips").
//!
//! Blips are the unit of state change this listener produces. Raw census
//! events are stripped back and merged into a small set of variants that
//! downstream consumers read straight out of the buffer schema.
//!
//! Blips are write-once records: they are inserted exactly once (duplicate
//! inserts are ignored via the natural key) and never updated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CharacterId, FacilityId, FactionId, WorldId, ZoneId};

/// How a player's position in a [`PlayerBlip`] was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// The position comes from an event that places the player at the
    /// facility directly (capture/defend participation, vehicle kill with a
    /// reported facility, or a fresh kill-position carry-over).
    Confirmed,

    /// The position was inferred from correlation state older than the
    /// confirmed horizon but still within the recency window.
    Inferred,
}

impl Confidence {
    /// Database representation of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Confirmed => "confirmed",
            Confidence::Inferred => "inferred",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Associates a character with a facility at a point in time.
///
/// These are sent for facility captures and defences, vehicle kills with a
/// reported facility, and kill-position carry-over. Positions are reliable
/// for a short while only; consumers are expected to age them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerBlip {
    /// UTC timestamp of the triggering event.
    pub timestamp: DateTime<Utc>,
    /// Server the event took place on.
    pub world: WorldId,
    /// Continent of the facility.
    pub zone: ZoneId,
    /// Character being positioned.
    pub character: CharacterId,
    /// Facility the character is positioned at.
    pub facility: FacilityId,
    /// Whether the position is direct or inferred.
    pub confidence: Confidence,
}

/// Relative positioning between two players.
///
/// Emitted when players kill, heal, revive or spot each other. The order of
/// the characters has no relevance; for consistency the character with the
/// lower ID is always `character_a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativePlayerBlip {
    /// UTC timestamp of the triggering event.
    pub timestamp: DateTime<Utc>,
    /// Server the event took place on.
    pub world: WorldId,
    /// Continent the interaction happened on.
    pub zone: ZoneId,
    /// Player A of the relation (lower character ID).
    pub character_a: CharacterId,
    /// Player B of the relation (higher character ID).
    pub character_b: CharacterId,
}

impl RelativePlayerBlip {
    /// Builds a relative blip with the pair normalized lower-ID-first.
    pub fn new(
        timestamp: DateTime<Utc>,
        world: WorldId,
        zone: ZoneId,
        first: CharacterId,
        second: CharacterId,
    ) -> Self {
        let (character_a, character_b) = if first <= second {
            (first, second)
        } else {
            (second, first)
        };
        RelativePlayerBlip {
            timestamp,
            world,
            zone,
            character_a,
            character_b,
        }
    }
}

/// A player logged out and should be removed from active population tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLogoutBlip {
    /// UTC timestamp of the logout.
    pub timestamp: DateTime<Utc>,
    /// Server the character logged out from.
    pub world: WorldId,
    /// Character that logged out.
    pub character: CharacterId,
}

/// An ownership transition of a base.
///
/// Covers every cause of an owner change: captures, defences, continent
/// unlocks and post-maintenance resets all produce the same record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseControlBlip {
    /// UTC timestamp of the transition.
    pub timestamp: DateTime<Utc>,
    /// Server the base belongs to.
    pub world: WorldId,
    /// Continent of the base.
    pub zone: ZoneId,
    /// The base whose ownership changed.
    pub facility: FacilityId,
    /// Faction that held the base before the transition.
    pub old_faction: FactionId,
    /// Faction that holds the base after the transition.
    pub new_faction: FactionId,
}

/// The normalized unit of state change produced by the classifier.
///
/// Modeled as a tagged union because the writer and the transport boundary
/// branch on the variant rather than sharing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Blip {
    /// A character positioned at a facility.
    Player(PlayerBlip),
    /// Two characters positioned relative to each other.
    RelativePlayer(RelativePlayerBlip),
    /// A character left the game.
    Logout(PlayerLogoutBlip),
    /// A base changed owner.
    BaseControl(BaseControlBlip),
}

impl Blip {
    /// Returns the timestamp of the triggering event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Blip::Player(b) => b.timestamp,
            Blip::RelativePlayer(b) => b.timestamp,
            Blip::Logout(b) => b.timestamp,
            Blip::BaseControl(b) => b.timestamp,
        }
    }

    /// Returns the server the blip belongs to.
    pub fn world(&self) -> WorldId {
        match self {
            Blip::Player(b) => b.world,
            Blip::RelativePlayer(b) => b.world,
            Blip::Logout(b) => b.world,
            Blip::BaseControl(b) => b.world,
        }
    }

    /// Returns the variant kind, used for dispatch statistics and metrics.
    pub fn kind(&self) -> BlipKind {
        match self {
            Blip::Player(_) => BlipKind::Player,
            Blip::RelativePlayer(_) => BlipKind::RelativePlayer,
            Blip::Logout(_) => BlipKind::Logout,
            Blip::BaseControl(_) => BlipKind::BaseControl,
        }
    }
}

/// Discriminator for the four blip variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlipKind {
    Player,
    RelativePlayer,
    Logout,
    BaseControl,
}

impl BlipKind {
    /// All kinds, in the order they are reported in dispatch statistics.
    pub const ALL: [BlipKind; 4] = [
        BlipKind::Player,
        BlipKind::RelativePlayer,
        BlipKind::Logout,
        BlipKind::BaseControl,
    ];

    /// Stable lowercase name, matching the buffer table names.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlipKind::Player => "player_blip",
            BlipKind::RelativePlayer => "relative_player_blip",
            BlipKind::Logout => "player_logout",
            BlipKind::BaseControl => "base_control",
        }
    }
}

impl fmt::Display for BlipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 18, 30, 0).unwrap()
    }

    #[test]
    fn relative_blip_normalizes_pair_order() {
        let a = RelativePlayerBlip::new(ts(), WorldId(13), ZoneId(2), CharacterId(9), CharacterId(4));
        assert_eq!(a.character_a, CharacterId(4));
        assert_eq!(a.character_b, CharacterId(9));

        let b = RelativePlayerBlip::new(ts(), WorldId(13), ZoneId(2), CharacterId(4), CharacterId(9));
        assert_eq!(a, b);
    }

    #[test]
    fn blip_accessors_match_variant_fields() {
        let blip = Blip::BaseControl(BaseControlBlip {
            timestamp: ts(),
            world: WorldId(10),
            zone: ZoneId(4),
            facility: FacilityId(17),
            old_faction: FactionId(1),
            new_faction: FactionId(2),
        });
        assert_eq!(blip.timestamp(), ts());
        assert_eq!(blip.world(), WorldId(10));
        assert_eq!(blip.kind(), BlipKind::BaseControl);
    }

    #[test]
    fn kind_names_match_buffer_tables() {
        assert_eq!(BlipKind::Player.as_str(), "player_blip");
        assert_eq!(BlipKind::RelativePlayer.as_str(), "relative_player_blip");
        assert_eq!(BlipKind::Logout.as_str(), "player_logout");
        assert_eq!(BlipKind::BaseControl.as_str(), "base_control");
    }

    proptest! {
        /// The pair is always ordered regardless of argument order.
        #[test]
        fn relative_pair_always_ordered(x in 1u64..1_000_000, y in 1u64..1_000_000) {
            let blip = RelativePlayerBlip::new(
                ts(),
                WorldId(1),
                ZoneId(2),
                CharacterId(x),
                CharacterId(y),
            );
            prop_assert!(blip.character_a <= blip.character_b);
        }

        /// Swapping the arguments produces an identical record.
        #[test]
        fn relative_pair_symmetric(x in 1u64..1_000_000, y in 1u64..1_000_000) {
            let ab = RelativePlayerBlip::new(ts(), WorldId(1), ZoneId(2), CharacterId(x), CharacterId(y));
            let ba = RelativePlayerBlip::new(ts(), WorldId(1), ZoneId(2), CharacterId(y), CharacterId(x));
            prop_assert_eq!(ab, ba);
        }
    }
}
