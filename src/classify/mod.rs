//! Event classification and decomposition.
//!
//! The classifier maps each validated census event to zero or more [`Blip`]s,
//! applying the position-inference rules that make kill events useful:
//!
//! - Facility capture/defend participation places a player directly
//! - A kill places the victim wherever the killer was last known to be
//! - A kill between two recently-located players asserts their proximity
//! - A vehicle kill with a reported facility places the attacker there
//! - Logouts remove players from correlation state
//! - Facility control changes become base ownership records
//!
//! Decomposition is additive: an event matching several rules emits all
//! corresponding blips, direct blips first. Classification is deterministic --
//! the only inputs are the event itself and the correlation context, and the
//! only clock is the event's own timestamp.

mod context;

pub use context::{CorrelationContext, FutureEntry, LastKnownPosition, PositionSource};

use tracing::{debug, warn};

use crate::blips::{
    BaseControlBlip, Blip, Confidence, PlayerBlip, PlayerLogoutBlip, RelativePlayerBlip,
};
use crate::events::{
    CensusEvent, DeathEvent, FacilityControlEvent, GainExperienceEvent, PlayerFacilityEvent,
    PlayerLogoutEvent, VehicleDestroyEvent, PROXIMITY_EXPERIENCE_IDS,
};
use crate::types::CharacterId;

/// Tunables for the classifier's inference rules.
///
/// The exact weighting between "last confirmed" and "last seen" positions is
/// policy, not contract; see DESIGN.md for the choices made here.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    /// How long a recorded position stays usable for inference, in seconds.
    pub recency_window_secs: u64,

    /// Maximum age at which a directly-established position still counts as
    /// confirmed, in seconds. Older (or carried-over) positions are tagged
    /// inferred.
    pub confirmed_horizon_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            recency_window_secs: 300,
            confirmed_horizon_secs: 30,
        }
    }
}

/// Stateful per-pipeline classifier.
///
/// Owns the correlation context for its pipeline; never shared across
/// pipelines.
#[derive(Debug)]
pub struct Classifier {
    ctx: CorrelationContext,
}

impl Classifier {
    /// Creates a classifier with the given tunables.
    pub fn new(config: ClassifierConfig) -> Self {
        Classifier {
            ctx: CorrelationContext::new(
                config.recency_window_secs,
                config.confirmed_horizon_secs,
            ),
        }
    }

    /// Maps one event to its blips, in emission order.
    ///
    /// Never fails: inference problems (out-of-order context entries) only
    /// suppress the affected inference-dependent blips, and malformed
    /// combinations (placeholder IDs, self-kills) drop the event quietly.
    pub fn classify(&mut self, event: &CensusEvent) -> Vec<Blip> {
        match event {
            CensusEvent::Death(e) => self.classify_death(e),
            CensusEvent::GainExperience(e) => self.classify_experience(e),
            CensusEvent::PlayerFacility(e) => self.classify_player_facility(e),
            CensusEvent::VehicleDestroy(e) => self.classify_vehicle_destroy(e),
            CensusEvent::PlayerLogout(e) => self.classify_logout(e),
            CensusEvent::FacilityControl(e) => classify_facility_control(e),
        }
    }

    /// Number of characters currently held in correlation state.
    pub fn tracked_characters(&self) -> usize {
        self.ctx.len()
    }

    fn classify_player_facility(&mut self, e: &PlayerFacilityEvent) -> Vec<Blip> {
        if e.character.is_placeholder() {
            warn!(world = %e.world, "unexpected character ID 0 in facility interaction");
            return Vec::new();
        }
        self.ctx.record(
            e.character,
            e.facility,
            e.zone,
            e.timestamp,
            PositionSource::Direct,
        );
        vec![Blip::Player(PlayerBlip {
            timestamp: e.timestamp,
            world: e.world,
            zone: e.zone,
            character: e.character,
            facility: e.facility,
            confidence: Confidence::Confirmed,
        })]
    }

    fn classify_death(&mut self, e: &DeathEvent) -> Vec<Blip> {
        // Attacker 0 (pain fields, falls) and attacker == victim (suicides)
        // are regular ingame events; dropped without a log line.
        if e.attacker.is_placeholder() || e.victim.is_placeholder() || e.attacker == e.victim {
            return Vec::new();
        }

        let killer_pos = self.locate_or_skip(e.attacker, e);
        let victim_pos = self.locate_or_skip(e.victim, e);

        let mut out = Vec::new();
        if let Some((pos, confidence)) = killer_pos {
            out.push(Blip::Player(PlayerBlip {
                timestamp: e.timestamp,
                world: e.world,
                zone: pos.zone,
                character: e.attacker,
                facility: pos.facility,
                confidence,
            }));
            if victim_pos.is_some() {
                out.push(Blip::RelativePlayer(RelativePlayerBlip::new(
                    e.timestamp,
                    e.world,
                    e.zone,
                    e.attacker,
                    e.victim,
                )));
            }
            // The kill proves the victim was wherever the killer was; carry
            // the position over so the victim participates in later
            // inference. Not emitted as a blip of its own.
            self.ctx.record(
                e.victim,
                pos.facility,
                pos.zone,
                e.timestamp,
                PositionSource::CarryOver,
            );
        }
        out
    }

    fn classify_experience(&mut self, e: &GainExperienceEvent) -> Vec<Blip> {
        // The subscription is filtered, but the filter lives upstream;
        // defend against drift by re-checking here.
        if !PROXIMITY_EXPERIENCE_IDS.contains(&e.experience_id) {
            debug!(experience_id = e.experience_id, "unsolicited experience tick");
            return Vec::new();
        }
        if e.character.is_placeholder() || e.other.is_placeholder() || e.character == e.other {
            warn!(
                world = %e.world,
                experience_id = e.experience_id,
                "unexpected character ID 0 in experience tick"
            );
            return Vec::new();
        }
        vec![Blip::RelativePlayer(RelativePlayerBlip::new(
            e.timestamp,
            e.world,
            e.zone,
            e.character,
            e.other,
        ))]
    }

    fn classify_vehicle_destroy(&mut self, e: &VehicleDestroyEvent) -> Vec<Blip> {
        if e.attacker.is_placeholder() {
            return Vec::new();
        }
        let Some(facility) = e.facility else {
            // Open-field destruction; no position to extract.
            return Vec::new();
        };
        self.ctx.record(
            e.attacker,
            facility,
            e.zone,
            e.timestamp,
            PositionSource::Direct,
        );
        vec![Blip::Player(PlayerBlip {
            timestamp: e.timestamp,
            world: e.world,
            zone: e.zone,
            character: e.attacker,
            facility,
            confidence: Confidence::Confirmed,
        })]
    }

    fn classify_logout(&mut self, e: &PlayerLogoutEvent) -> Vec<Blip> {
        if e.character.is_placeholder() {
            warn!(world = %e.world, "unexpected character ID 0 in logout");
            return Vec::new();
        }
        self.ctx.purge(e.character);
        vec![Blip::Logout(PlayerLogoutBlip {
            timestamp: e.timestamp,
            world: e.world,
            character: e.character,
        })]
    }

    /// Looks up a position, downgrading context invariant violations to a
    /// skipped inference rather than a failed event.
    fn locate_or_skip(
        &self,
        character: CharacterId,
        e: &DeathEvent,
    ) -> Option<(LastKnownPosition, Confidence)> {
        match self.ctx.locate(character, e.timestamp) {
            Ok(located) => located,
            Err(err) => {
                warn!(
                    world = %e.world,
                    error = %err,
                    "skipping position inference for out-of-order context entry"
                );
                None
            }
        }
    }
}

fn classify_facility_control(e: &FacilityControlEvent) -> Vec<Blip> {
    vec![Blip::BaseControl(BaseControlBlip {
        timestamp: e.timestamp,
        world: e.world,
        zone: e.zone,
        facility: e.facility,
        old_faction: e.old_faction,
        new_faction: e.new_faction,
    })]
}
