//! Census event decoding and validation.
//!
//! This module provides:
//! - Typed representations of the subscribed census events
//! - The payload validator that turns raw frames into typed events without
//!   ever terminating the stream on bad input

pub mod events;
pub mod parser;

pub use events::{
    CensusEvent, DeathEvent, FacilityAction, FacilityControlEvent, GainExperienceEvent,
    PlayerFacilityEvent, PlayerLogoutEvent, VehicleDestroyEvent, PROXIMITY_EXPERIENCE_IDS,
};
pub use parser::{parse_message, Parsed, ParseError};
