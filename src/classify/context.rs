//! Per-pipeline correlation state.
//!
//! The classifier needs a short memory of where each player was last seen to
//! turn kill events into positions. This module owns that memory: a bounded,
//! time-windowed map from character to last known facility, scoped to one
//! pipeline and never shared.
//!
//! All freshness decisions use the *event's* timestamp, never the wall clock,
//! so classification stays deterministic under replay.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::blips::Confidence;
use crate::types::{CharacterId, FacilityId, ZoneId};

/// How many records are applied between sweeps of expired entries.
///
/// Stale entries are already invisible to lookups; the sweep only bounds
/// memory, so it can run rarely.
const PRUNE_INTERVAL: u32 = 1024;

/// How a position entered the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    /// The player was placed at the facility by a direct event
    /// (capture/defend participation, vehicle kill at a base).
    Direct,

    /// The position was inherited from another player through a kill.
    CarryOver,
}

/// A player's last known position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastKnownPosition {
    pub facility: FacilityId,
    pub zone: ZoneId,
    pub at: DateTime<Utc>,
    pub source: PositionSource,
}

/// Context invariant violation: an entry claims to be newer than the event
/// being classified. Happens when the upstream delivers events out of order;
/// the affected inference is skipped, direct blips still flow.
#[derive(Debug, Error)]
#[error("correlation entry for character {character} is {skew_secs}s ahead of the event")]
pub struct FutureEntry {
    pub character: CharacterId,
    pub skew_secs: i64,
}

/// Bounded map of player positions within a recency window.
#[derive(Debug)]
pub struct CorrelationContext {
    window: Duration,
    confirmed_horizon: Duration,
    positions: HashMap<CharacterId, LastKnownPosition>,
    records_since_prune: u32,
}

impl CorrelationContext {
    /// Creates a context with the given recency window and confirmed horizon
    /// (both in seconds).
    pub fn new(window_secs: u64, confirmed_horizon_secs: u64) -> Self {
        CorrelationContext {
            window: Duration::seconds(window_secs as i64),
            confirmed_horizon: Duration::seconds(confirmed_horizon_secs as i64),
            positions: HashMap::new(),
            records_since_prune: 0,
        }
    }

    /// Records a position for a character.
    ///
    /// Older timestamps never overwrite newer ones, so late-arriving events
    /// cannot rewind the context.
    pub fn record(
        &mut self,
        character: CharacterId,
        facility: FacilityId,
        zone: ZoneId,
        at: DateTime<Utc>,
        source: PositionSource,
    ) {
        let entry = LastKnownPosition {
            facility,
            zone,
            at,
            source,
        };
        match self.positions.get(&character) {
            Some(existing) if existing.at > at => {}
            _ => {
                self.positions.insert(character, entry);
            }
        }
        self.records_since_prune += 1;
        if self.records_since_prune >= PRUNE_INTERVAL {
            self.prune(at);
        }
    }

    /// Looks up a character's position relative to the given event time.
    ///
    /// Returns `Ok(None)` when the character is unknown or the entry has aged
    /// past the recency window, and `Err` when the entry post-dates the event
    /// (out-of-order delivery).
    pub fn locate(
        &self,
        character: CharacterId,
        now: DateTime<Utc>,
    ) -> Result<Option<(LastKnownPosition, Confidence)>, FutureEntry> {
        let Some(entry) = self.positions.get(&character) else {
            return Ok(None);
        };
        let age = now - entry.at;
        if age < Duration::zero() {
            return Err(FutureEntry {
                character,
                skew_secs: (entry.at - now).num_seconds(),
            });
        }
        if age > self.window {
            return Ok(None);
        }
        let confidence = if entry.source == PositionSource::Direct && age <= self.confirmed_horizon
        {
            Confidence::Confirmed
        } else {
            Confidence::Inferred
        };
        Ok(Some((*entry, confidence)))
    }

    /// Removes a character entirely (logout).
    pub fn purge(&mut self, character: CharacterId) {
        self.positions.remove(&character);
    }

    /// Drops all entries older than the recency window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.positions.retain(|_, entry| now - entry.at <= window);
        self.records_since_prune = 0;
    }

    /// Number of tracked characters.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True if no characters are tracked.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 18, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    fn ctx() -> CorrelationContext {
        CorrelationContext::new(300, 30)
    }

    #[test]
    fn fresh_direct_entry_is_confirmed() {
        let mut ctx = ctx();
        ctx.record(
            CharacterId(1),
            FacilityId(12),
            ZoneId(2),
            ts(0),
            PositionSource::Direct,
        );
        let (pos, confidence) = ctx.locate(CharacterId(1), ts(3)).unwrap().unwrap();
        assert_eq!(pos.facility, FacilityId(12));
        assert_eq!(confidence, Confidence::Confirmed);
    }

    #[test]
    fn aged_direct_entry_degrades_to_inferred() {
        let mut ctx = ctx();
        ctx.record(
            CharacterId(1),
            FacilityId(12),
            ZoneId(2),
            ts(0),
            PositionSource::Direct,
        );
        let (_, confidence) = ctx.locate(CharacterId(1), ts(31)).unwrap().unwrap();
        assert_eq!(confidence, Confidence::Inferred);
    }

    #[test]
    fn carry_over_is_never_confirmed() {
        let mut ctx = ctx();
        ctx.record(
            CharacterId(1),
            FacilityId(12),
            ZoneId(2),
            ts(0),
            PositionSource::CarryOver,
        );
        let (_, confidence) = ctx.locate(CharacterId(1), ts(1)).unwrap().unwrap();
        assert_eq!(confidence, Confidence::Inferred);
    }

    #[test]
    fn entry_outside_window_is_absent() {
        let mut ctx = ctx();
        ctx.record(
            CharacterId(1),
            FacilityId(12),
            ZoneId(2),
            ts(0),
            PositionSource::Direct,
        );
        assert!(ctx.locate(CharacterId(1), ts(301)).unwrap().is_none());
    }

    #[test]
    fn future_entry_is_an_error() {
        let mut ctx = ctx();
        ctx.record(
            CharacterId(1),
            FacilityId(12),
            ZoneId(2),
            ts(10),
            PositionSource::Direct,
        );
        let err = ctx.locate(CharacterId(1), ts(0)).unwrap_err();
        assert_eq!(err.character, CharacterId(1));
        assert_eq!(err.skew_secs, 10);
    }

    #[test]
    fn older_record_does_not_rewind() {
        let mut ctx = ctx();
        ctx.record(
            CharacterId(1),
            FacilityId(12),
            ZoneId(2),
            ts(10),
            PositionSource::Direct,
        );
        ctx.record(
            CharacterId(1),
            FacilityId(99),
            ZoneId(2),
            ts(5),
            PositionSource::Direct,
        );
        let (pos, _) = ctx.locate(CharacterId(1), ts(11)).unwrap().unwrap();
        assert_eq!(pos.facility, FacilityId(12));
    }

    #[test]
    fn purge_removes_character() {
        let mut ctx = ctx();
        ctx.record(
            CharacterId(555),
            FacilityId(12),
            ZoneId(2),
            ts(0),
            PositionSource::Direct,
        );
        ctx.purge(CharacterId(555));
        assert!(ctx.locate(CharacterId(555), ts(1)).unwrap().is_none());
        assert!(ctx.is_empty());
    }

    #[test]
    fn prune_drops_expired_entries() {
        let mut ctx = ctx();
        ctx.record(
            CharacterId(1),
            FacilityId(12),
            ZoneId(2),
            ts(0),
            PositionSource::Direct,
        );
        ctx.record(
            CharacterId(2),
            FacilityId(13),
            ZoneId(2),
            ts(400),
            PositionSource::Direct,
        );
        ctx.prune(ts(400));
        assert_eq!(ctx.len(), 1);
        assert!(ctx.locate(CharacterId(2), ts(401)).unwrap().is_some());
    }
}
