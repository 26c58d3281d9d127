//! Core domain types shared across the listener.

mod ids;

pub use ids::{CharacterId, FacilityId, FactionId, WorldId, ZoneId};
