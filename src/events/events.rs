//! Typed census event representations.
//!
//! This module defines typed representations of the upstream census events the
//! listener subscribes to. Each variant corresponds to a census service
//! message with only the fields needed for classification.
//!
//! # Event Types
//!
//! - `Death` - one player killed another (relative positioning source)
//! - `GainExperience` - heal/revive/spot ticks (relative positioning source)
//! - `PlayerFacilityCapture` / `PlayerFacilityDefend` - direct position source
//! - `VehicleDestroy` - direct position source when a facility is reported
//! - `FacilityControl` - base ownership transition
//! - `PlayerLogout` - population tracking removal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CharacterId, FacilityId, FactionId, WorldId, ZoneId};

/// Experience IDs that assert proximity between two players.
///
/// Heal (4), revive (7, 53), spot (36) and squad spot (54). The subscription
/// is filtered to exactly these IDs so the stream does not drown in the
/// firehose of unrelated experience ticks.
pub const PROXIMITY_EXPERIENCE_IDS: [u32; 5] = [4, 7, 36, 53, 54];

/// A decoded census event.
///
/// This enum contains only the event types the listener cares about. Unknown
/// event names are represented by returning `Parsed::Ignored` from the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CensusEvent {
    /// One character killed another.
    Death(DeathEvent),

    /// A scoped experience tick linking two characters.
    GainExperience(GainExperienceEvent),

    /// A character participated in capturing or defending a facility.
    PlayerFacility(PlayerFacilityEvent),

    /// A character destroyed a vehicle.
    VehicleDestroy(VehicleDestroyEvent),

    /// A facility changed owner.
    FacilityControl(FacilityControlEvent),

    /// A character logged out.
    PlayerLogout(PlayerLogoutEvent),
}

impl CensusEvent {
    /// Returns the UTC timestamp carried by the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CensusEvent::Death(e) => e.timestamp,
            CensusEvent::GainExperience(e) => e.timestamp,
            CensusEvent::PlayerFacility(e) => e.timestamp,
            CensusEvent::VehicleDestroy(e) => e.timestamp,
            CensusEvent::FacilityControl(e) => e.timestamp,
            CensusEvent::PlayerLogout(e) => e.timestamp,
        }
    }

    /// Returns the world the event belongs to.
    pub fn world(&self) -> WorldId {
        match self {
            CensusEvent::Death(e) => e.world,
            CensusEvent::GainExperience(e) => e.world,
            CensusEvent::PlayerFacility(e) => e.world,
            CensusEvent::VehicleDestroy(e) => e.world,
            CensusEvent::FacilityControl(e) => e.world,
            CensusEvent::PlayerLogout(e) => e.world,
        }
    }

    /// Returns the upstream event name, for logging and statistics.
    pub fn name(&self) -> &'static str {
        match self {
            CensusEvent::Death(_) => "Death",
            CensusEvent::GainExperience(_) => "GainExperience",
            CensusEvent::PlayerFacility(e) => match e.action {
                FacilityAction::Capture => "PlayerFacilityCapture",
                FacilityAction::Defend => "PlayerFacilityDefend",
            },
            CensusEvent::VehicleDestroy(_) => "VehicleDestroy",
            CensusEvent::FacilityControl(_) => "FacilityControl",
            CensusEvent::PlayerLogout(_) => "PlayerLogout",
        }
    }
}

/// A kill event.
///
/// The census API reports environmental deaths with attacker `0` and suicides
/// with attacker == victim; both are filtered during classification, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathEvent {
    /// UTC timestamp of the kill.
    pub timestamp: DateTime<Utc>,
    /// Server the kill took place on.
    pub world: WorldId,
    /// Continent the kill took place on.
    pub zone: ZoneId,
    /// The killing character (may be the `0` placeholder).
    pub attacker: CharacterId,
    /// The killed character.
    pub victim: CharacterId,
}

/// A filtered experience tick.
///
/// Only the proximity-asserting experience IDs in
/// [`PROXIMITY_EXPERIENCE_IDS`] are subscribed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainExperienceEvent {
    /// UTC timestamp of the tick.
    pub timestamp: DateTime<Utc>,
    /// Server the tick took place on.
    pub world: WorldId,
    /// Continent the tick took place on.
    pub zone: ZoneId,
    /// The character that earned the experience.
    pub character: CharacterId,
    /// The other character involved (heal target, spotted enemy, ...).
    pub other: CharacterId,
    /// The experience type.
    pub experience_id: u32,
}

/// Whether a facility interaction was a capture or a defence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityAction {
    /// The character's faction took the facility.
    Capture,
    /// The character's faction kept the facility.
    Defend,
}

/// A character's participation in a facility capture or defence.
///
/// These place the character at the facility directly and are the most
/// reliable position source available from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerFacilityEvent {
    /// Capture or defend.
    pub action: FacilityAction,
    /// UTC timestamp of the interaction.
    pub timestamp: DateTime<Utc>,
    /// Server the facility belongs to.
    pub world: WorldId,
    /// Continent of the facility.
    pub zone: ZoneId,
    /// The participating character.
    pub character: CharacterId,
    /// The facility captured or defended.
    pub facility: FacilityId,
}

/// A vehicle destruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDestroyEvent {
    /// UTC timestamp of the destruction.
    pub timestamp: DateTime<Utc>,
    /// Server the destruction took place on.
    pub world: WorldId,
    /// Continent the destruction took place on.
    pub zone: ZoneId,
    /// The destroying character (may be the `0` placeholder).
    pub attacker: CharacterId,
    /// The facility the destroyed vehicle was at, when the API reports one.
    ///
    /// The census API sends `facility_id: "0"` for most open-field vehicle
    /// kills; only destructions near a base carry a usable facility.
    pub facility: Option<FacilityId>,
}

/// A facility ownership transition.
///
/// Sent for captures, but also for continent unlocks and post-maintenance
/// resets. Defences appear as a transition with `old_faction == new_faction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityControlEvent {
    /// UTC timestamp of the transition.
    pub timestamp: DateTime<Utc>,
    /// Server the facility belongs to.
    pub world: WorldId,
    /// Continent of the facility.
    pub zone: ZoneId,
    /// The facility whose ownership changed.
    pub facility: FacilityId,
    /// The previous owner.
    pub old_faction: FactionId,
    /// The new owner.
    pub new_faction: FactionId,
}

/// A character logged out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLogoutEvent {
    /// UTC timestamp of the logout.
    pub timestamp: DateTime<Utc>,
    /// Server the character logged out from.
    pub world: WorldId,
    /// The character that logged out.
    pub character: CharacterId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 18, 30, 0).unwrap()
    }

    #[test]
    fn event_name_matches_upstream_discriminator() {
        let capture = CensusEvent::PlayerFacility(PlayerFacilityEvent {
            action: FacilityAction::Capture,
            timestamp: ts(),
            world: WorldId(1),
            zone: ZoneId(2),
            character: CharacterId(5),
            facility: FacilityId(222280),
        });
        assert_eq!(capture.name(), "PlayerFacilityCapture");

        let logout = CensusEvent::PlayerLogout(PlayerLogoutEvent {
            timestamp: ts(),
            world: WorldId(1),
            character: CharacterId(5),
        });
        assert_eq!(logout.name(), "PlayerLogout");
    }

    #[test]
    fn accessors_are_consistent_across_variants() {
        let death = CensusEvent::Death(DeathEvent {
            timestamp: ts(),
            world: WorldId(40),
            zone: ZoneId(6),
            attacker: CharacterId(1),
            victim: CharacterId(2),
        });
        assert_eq!(death.timestamp(), ts());
        assert_eq!(death.world(), WorldId(40));
    }

    #[test]
    fn proximity_ids_cover_heal_revive_and_spotting() {
        for id in [4, 7, 36, 53, 54] {
            assert!(PROXIMITY_EXPERIENCE_IDS.contains(&id));
        }
    }
}
