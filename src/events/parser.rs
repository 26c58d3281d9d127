//! Census service-message parser.
//!
//! This module parses raw websocket frames into typed [`CensusEvent`] values.
//! The parser is designed to be robust against schema drift: unknown event
//! names and non-event frames are ignored rather than treated as errors, and
//! a malformed payload only ever fails the single frame that carried it.
//!
//! # Parsing Strategy
//!
//! 1. The frame is decoded as a JSON envelope
//! 2. Heartbeats and non-event frames (subscription echoes, help responses,
//!    connection-state notices) are classified without touching the payload
//! 3. The payload is parsed according to its `event_name` discriminator
//! 4. Unknown event names return `Parsed::Ignored` (dropped, not error)
//! 5. Missing or malformed required fields return `Err` naming the field
//!
//! # Census Quirks
//!
//! Every payload field arrives as a JSON string, including numbers, and
//! timestamps are unix-epoch-second strings. This module owns both
//! conversions so nothing downstream ever sees a raw payload.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{CharacterId, FacilityId, FactionId, WorldId, ZoneId};

use super::events::{
    CensusEvent, DeathEvent, FacilityAction, FacilityControlEvent, GainExperienceEvent,
    PlayerFacilityEvent, PlayerLogoutEvent, VehicleDestroyEvent,
};

/// Error type for payload validation failures.
///
/// These are always scoped to a single frame; the caller logs and drops the
/// frame, and the stream continues with the next message.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The frame was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field was absent from the payload.
    #[error("{event} payload is missing required field {field}")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    /// A field was present but could not be converted (e.g., a non-numeric
    /// ID string or an out-of-range timestamp).
    #[error("invalid value for field {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Classification of a single inbound websocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A service message carrying a known event.
    Event(CensusEvent),

    /// A stream heartbeat. Carries no event but proves the subscription is
    /// alive; the health monitor treats it as a liveness signal.
    Heartbeat,

    /// A valid frame the listener has no use for: subscription echoes,
    /// connection-state notices, or service messages with an unknown
    /// `event_name`. Counted, never an error.
    Ignored,
}

/// Parses one websocket text frame.
///
/// # Returns
///
/// * `Ok(Parsed::Event(_))` - a known event was decoded and validated
/// * `Ok(Parsed::Heartbeat)` - stream heartbeat
/// * `Ok(Parsed::Ignored)` - valid frame with nothing to process
/// * `Err(e)` - malformed JSON or a payload missing required fields
pub fn parse_message(text: &str) -> Result<Parsed, ParseError> {
    let envelope: RawEnvelope = serde_json::from_str(text)?;

    match envelope.message_type.as_deref() {
        Some("serviceMessage") => {}
        Some("heartbeat") => return Ok(Parsed::Heartbeat),
        // connectionStateChanged, serviceStateChanged, subscription echoes...
        _ => return Ok(Parsed::Ignored),
    }

    let Some(payload) = envelope.payload else {
        // A serviceMessage without a payload is malformed enough to flag.
        return Err(ParseError::MissingField {
            event: "serviceMessage",
            field: "payload",
        });
    };

    let Some(event_name) = payload.event_name.as_deref() else {
        return Err(ParseError::MissingField {
            event: "serviceMessage",
            field: "event_name",
        });
    };

    match event_name {
        "Death" => parse_death(&payload).map(|e| Parsed::Event(CensusEvent::Death(e))),
        "GainExperience" => {
            parse_gain_experience(&payload).map(|e| Parsed::Event(CensusEvent::GainExperience(e)))
        }
        "PlayerFacilityCapture" => parse_player_facility(&payload, FacilityAction::Capture)
            .map(|e| Parsed::Event(CensusEvent::PlayerFacility(e))),
        "PlayerFacilityDefend" => parse_player_facility(&payload, FacilityAction::Defend)
            .map(|e| Parsed::Event(CensusEvent::PlayerFacility(e))),
        "VehicleDestroy" => {
            parse_vehicle_destroy(&payload).map(|e| Parsed::Event(CensusEvent::VehicleDestroy(e)))
        }
        "FacilityControl" => {
            parse_facility_control(&payload).map(|e| Parsed::Event(CensusEvent::FacilityControl(e)))
        }
        "PlayerLogout" => {
            parse_player_logout(&payload).map(|e| Parsed::Event(CensusEvent::PlayerLogout(e)))
        }
        // Unknown event names are ignored (not an error)
        _ => Ok(Parsed::Ignored),
    }
}

// ============================================================================
// Raw payload structures for deserialization
//
// These match the census envelope shape. Every field is Option<String> --
// the API stringifies all values and omits fields freely -- and required
// fields are validated explicitly per event type below.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    message_type: Option<String>,
    payload: Option<RawPayload>,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    event_name: Option<String>,
    timestamp: Option<String>,
    world_id: Option<String>,
    zone_id: Option<String>,
    character_id: Option<String>,
    attacker_character_id: Option<String>,
    other_id: Option<String>,
    experience_id: Option<String>,
    facility_id: Option<String>,
    old_faction_id: Option<String>,
    new_faction_id: Option<String>,
}

fn parse_death(payload: &RawPayload) -> Result<DeathEvent, ParseError> {
    const EVENT: &str = "Death";
    Ok(DeathEvent {
        timestamp: timestamp_field(EVENT, payload)?,
        world: WorldId(u16_field(EVENT, "world_id", &payload.world_id)?),
        zone: ZoneId(u32_field(EVENT, "zone_id", &payload.zone_id)?),
        attacker: CharacterId(u64_field(
            EVENT,
            "attacker_character_id",
            &payload.attacker_character_id,
        )?),
        victim: CharacterId(u64_field(EVENT, "character_id", &payload.character_id)?),
    })
}

fn parse_gain_experience(payload: &RawPayload) -> Result<GainExperienceEvent, ParseError> {
    const EVENT: &str = "GainExperience";
    Ok(GainExperienceEvent {
        timestamp: timestamp_field(EVENT, payload)?,
        world: WorldId(u16_field(EVENT, "world_id", &payload.world_id)?),
        zone: ZoneId(u32_field(EVENT, "zone_id", &payload.zone_id)?),
        character: CharacterId(u64_field(EVENT, "character_id", &payload.character_id)?),
        other: CharacterId(u64_field(EVENT, "other_id", &payload.other_id)?),
        experience_id: u32_field(EVENT, "experience_id", &payload.experience_id)?,
    })
}

fn parse_player_facility(
    payload: &RawPayload,
    action: FacilityAction,
) -> Result<PlayerFacilityEvent, ParseError> {
    const EVENT: &str = "PlayerFacility";
    Ok(PlayerFacilityEvent {
        action,
        timestamp: timestamp_field(EVENT, payload)?,
        world: WorldId(u16_field(EVENT, "world_id", &payload.world_id)?),
        zone: ZoneId(u32_field(EVENT, "zone_id", &payload.zone_id)?),
        character: CharacterId(u64_field(EVENT, "character_id", &payload.character_id)?),
        facility: FacilityId(u64_field(EVENT, "facility_id", &payload.facility_id)?),
    })
}

fn parse_vehicle_destroy(payload: &RawPayload) -> Result<VehicleDestroyEvent, ParseError> {
    const EVENT: &str = "VehicleDestroy";
    // facility_id is "0" for open-field kills; only a real facility is kept.
    let facility = match &payload.facility_id {
        Some(raw) => {
            let id = parse_u64("facility_id", raw)?;
            (id != 0).then_some(FacilityId(id))
        }
        None => None,
    };
    Ok(VehicleDestroyEvent {
        timestamp: timestamp_field(EVENT, payload)?,
        world: WorldId(u16_field(EVENT, "world_id", &payload.world_id)?),
        zone: ZoneId(u32_field(EVENT, "zone_id", &payload.zone_id)?),
        attacker: CharacterId(u64_field(
            EVENT,
            "attacker_character_id",
            &payload.attacker_character_id,
        )?),
        facility,
    })
}

fn parse_facility_control(payload: &RawPayload) -> Result<FacilityControlEvent, ParseError> {
    const EVENT: &str = "FacilityControl";
    Ok(FacilityControlEvent {
        timestamp: timestamp_field(EVENT, payload)?,
        world: WorldId(u16_field(EVENT, "world_id", &payload.world_id)?),
        zone: ZoneId(u32_field(EVENT, "zone_id", &payload.zone_id)?),
        facility: FacilityId(u64_field(EVENT, "facility_id", &payload.facility_id)?),
        old_faction: FactionId(u16_field(EVENT, "old_faction_id", &payload.old_faction_id)?),
        new_faction: FactionId(u16_field(EVENT, "new_faction_id", &payload.new_faction_id)?),
    })
}

fn parse_player_logout(payload: &RawPayload) -> Result<PlayerLogoutEvent, ParseError> {
    const EVENT: &str = "PlayerLogout";
    Ok(PlayerLogoutEvent {
        timestamp: timestamp_field(EVENT, payload)?,
        world: WorldId(u16_field(EVENT, "world_id", &payload.world_id)?),
        character: CharacterId(u64_field(EVENT, "character_id", &payload.character_id)?),
    })
}

// ============================================================================
// Field extraction helpers
// ============================================================================

fn require<'a>(
    event: &'static str,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, ParseError> {
    value
        .as_deref()
        .ok_or(ParseError::MissingField { event, field })
}

fn parse_u64(field: &'static str, raw: &str) -> Result<u64, ParseError> {
    raw.parse().map_err(|_| ParseError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

fn u64_field(
    event: &'static str,
    field: &'static str,
    value: &Option<String>,
) -> Result<u64, ParseError> {
    parse_u64(field, require(event, field, value)?)
}

fn u32_field(
    event: &'static str,
    field: &'static str,
    value: &Option<String>,
) -> Result<u32, ParseError> {
    let raw = require(event, field, value)?;
    raw.parse().map_err(|_| ParseError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

fn u16_field(
    event: &'static str,
    field: &'static str,
    value: &Option<String>,
) -> Result<u16, ParseError> {
    let raw = require(event, field, value)?;
    raw.parse().map_err(|_| ParseError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

fn timestamp_field(event: &'static str, payload: &RawPayload) -> Result<DateTime<Utc>, ParseError> {
    let raw = require(event, "timestamp", &payload.timestamp)?;
    let secs: i64 = raw.parse().map_err(|_| ParseError::InvalidField {
        field: "timestamp",
        value: raw.to_string(),
    })?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ParseError::InvalidField {
            field: "timestamp",
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_message(payload: &str) -> String {
        format!(r#"{{"payload":{payload},"service":"event","type":"serviceMessage"}}"#)
    }

    #[test]
    fn parses_death_event() {
        let frame = service_message(
            r#"{"attacker_character_id":"5428010618020694593","attacker_loadout_id":"20",
                "character_id":"5428011263335537297","character_loadout_id":"15",
                "event_name":"Death","is_headshot":"1","timestamp":"1709836200",
                "world_id":"13","zone_id":"2"}"#,
        );
        let parsed = parse_message(&frame).unwrap();
        match parsed {
            Parsed::Event(CensusEvent::Death(e)) => {
                assert_eq!(e.attacker, CharacterId(5428010618020694593));
                assert_eq!(e.victim, CharacterId(5428011263335537297));
                assert_eq!(e.world, WorldId(13));
                assert_eq!(e.zone, ZoneId(2));
                assert_eq!(e.timestamp.timestamp(), 1709836200);
            }
            other => panic!("expected Death, got {other:?}"),
        }
    }

    #[test]
    fn parses_gain_experience_event() {
        let frame = service_message(
            r#"{"amount":"100","character_id":"11","event_name":"GainExperience",
                "experience_id":"4","loadout_id":"18","other_id":"22",
                "timestamp":"1709836201","world_id":"10","zone_id":"4"}"#,
        );
        match parse_message(&frame).unwrap() {
            Parsed::Event(CensusEvent::GainExperience(e)) => {
                assert_eq!(e.character, CharacterId(11));
                assert_eq!(e.other, CharacterId(22));
                assert_eq!(e.experience_id, 4);
            }
            other => panic!("expected GainExperience, got {other:?}"),
        }
    }

    #[test]
    fn parses_facility_capture_and_defend() {
        for (name, action) in [
            ("PlayerFacilityCapture", FacilityAction::Capture),
            ("PlayerFacilityDefend", FacilityAction::Defend),
        ] {
            let frame = service_message(&format!(
                r#"{{"character_id":"7","event_name":"{name}","facility_id":"222280",
                    "outfit_id":"0","timestamp":"1709836202","world_id":"17","zone_id":"6"}}"#
            ));
            match parse_message(&frame).unwrap() {
                Parsed::Event(CensusEvent::PlayerFacility(e)) => {
                    assert_eq!(e.action, action);
                    assert_eq!(e.facility, FacilityId(222280));
                }
                other => panic!("expected PlayerFacility, got {other:?}"),
            }
        }
    }

    #[test]
    fn parses_facility_control_event() {
        let frame = service_message(
            r#"{"duration_held":"3600","event_name":"FacilityControl","facility_id":"17",
                "new_faction_id":"2","old_faction_id":"1","outfit_id":"0",
                "timestamp":"1709836203","world_id":"1","zone_id":"2"}"#,
        );
        match parse_message(&frame).unwrap() {
            Parsed::Event(CensusEvent::FacilityControl(e)) => {
                assert_eq!(e.facility, FacilityId(17));
                assert_eq!(e.old_faction, FactionId(1));
                assert_eq!(e.new_faction, FactionId(2));
                assert_eq!(e.zone, ZoneId(2));
            }
            other => panic!("expected FacilityControl, got {other:?}"),
        }
    }

    #[test]
    fn parses_logout_without_zone() {
        // PlayerLogout payloads carry no zone_id.
        let frame = service_message(
            r#"{"character_id":"555","event_name":"PlayerLogout",
                "timestamp":"1709836204","world_id":"25"}"#,
        );
        match parse_message(&frame).unwrap() {
            Parsed::Event(CensusEvent::PlayerLogout(e)) => {
                assert_eq!(e.character, CharacterId(555));
                assert_eq!(e.world, WorldId(25));
            }
            other => panic!("expected PlayerLogout, got {other:?}"),
        }
    }

    #[test]
    fn vehicle_destroy_zero_facility_is_none() {
        let frame = service_message(
            r#"{"attacker_character_id":"9","character_id":"3","event_name":"VehicleDestroy",
                "facility_id":"0","faction_id":"1","timestamp":"1709836205",
                "vehicle_id":"2","world_id":"13","zone_id":"2"}"#,
        );
        match parse_message(&frame).unwrap() {
            Parsed::Event(CensusEvent::VehicleDestroy(e)) => assert_eq!(e.facility, None),
            other => panic!("expected VehicleDestroy, got {other:?}"),
        }

        let frame = service_message(
            r#"{"attacker_character_id":"9","character_id":"3","event_name":"VehicleDestroy",
                "facility_id":"222280","faction_id":"1","timestamp":"1709836205",
                "vehicle_id":"2","world_id":"13","zone_id":"2"}"#,
        );
        match parse_message(&frame).unwrap() {
            Parsed::Event(CensusEvent::VehicleDestroy(e)) => {
                assert_eq!(e.facility, Some(FacilityId(222280)));
            }
            other => panic!("expected VehicleDestroy, got {other:?}"),
        }
    }

    #[test]
    fn heartbeat_is_classified_not_dropped() {
        let frame = r#"{"online":{"EventServerEndpoint_Connery_1":"true"},
            "service":"event","type":"heartbeat"}"#;
        assert_eq!(parse_message(frame).unwrap(), Parsed::Heartbeat);
    }

    #[test]
    fn subscription_echo_is_ignored() {
        let frame = r#"{"subscription":{"characterCount":0,"eventNames":["Death"],
            "worlds":["13"]}}"#;
        assert_eq!(parse_message(frame).unwrap(), Parsed::Ignored);
    }

    #[test]
    fn unknown_event_name_is_ignored() {
        let frame = service_message(
            r#"{"event_name":"AchievementEarned","character_id":"1",
                "timestamp":"1709836206","world_id":"13","zone_id":"2"}"#,
        );
        assert_eq!(parse_message(&frame).unwrap(), Parsed::Ignored);
    }

    #[test]
    fn missing_required_field_names_the_field() {
        // Death without a victim character_id.
        let frame = service_message(
            r#"{"attacker_character_id":"5","event_name":"Death",
                "timestamp":"1709836207","world_id":"13","zone_id":"2"}"#,
        );
        match parse_message(&frame) {
            Err(ParseError::MissingField { field, .. }) => assert_eq!(field, "character_id"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_id_is_invalid_field() {
        let frame = service_message(
            r#"{"attacker_character_id":"abc","character_id":"2","event_name":"Death",
                "timestamp":"1709836208","world_id":"13","zone_id":"2"}"#,
        );
        match parse_message(&frame) {
            Err(ParseError::InvalidField { field, value }) => {
                assert_eq!(field, "attacker_character_id");
                assert_eq!(value, "abc");
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_a_json_error() {
        assert!(matches!(
            parse_message("not json at all"),
            Err(ParseError::Json(_))
        ));
    }
}
