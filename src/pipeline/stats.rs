//! Dispatch statistics.
//!
//! Each pipeline keeps a running count of what it dispatched and periodically
//! pushes a one-line summary to the log, giving operators a heartbeat view of
//! stream volume without a metrics stack.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::blips::BlipKind;
use crate::types::WorldId;

/// Windowed counters for one pipeline.
#[derive(Debug)]
pub struct DispatchStats {
    world: WorldId,
    interval: Duration,
    window_started: DateTime<Utc>,
    blips: [u64; 4],
    events: u64,
    ignored: u64,
    malformed: u64,
}

fn kind_index(kind: BlipKind) -> usize {
    match kind {
        BlipKind::Player => 0,
        BlipKind::RelativePlayer => 1,
        BlipKind::Logout => 2,
        BlipKind::BaseControl => 3,
    }
}

impl DispatchStats {
    /// Creates counters reporting every `interval_secs` seconds.
    pub fn new(world: WorldId, interval_secs: u64, now: DateTime<Utc>) -> Self {
        DispatchStats {
            world,
            interval: Duration::seconds(interval_secs as i64),
            window_started: now,
            blips: [0; 4],
            events: 0,
            ignored: 0,
            malformed: 0,
        }
    }

    /// Counts a committed blip.
    pub fn record_blip(&mut self, kind: BlipKind) {
        self.blips[kind_index(kind)] += 1;
    }

    /// Counts a classified event.
    pub fn record_event(&mut self) {
        self.events += 1;
    }

    /// Counts a valid frame with nothing to process.
    pub fn record_ignored(&mut self) {
        self.ignored += 1;
    }

    /// Counts a dropped malformed frame.
    pub fn record_malformed(&mut self) {
        self.malformed += 1;
    }

    /// Total blips counted in the current window.
    pub fn total_blips(&self) -> u64 {
        self.blips.iter().sum()
    }

    /// Events counted in the current window.
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Malformed frames counted in the current window.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Logs and resets the window when the reporting interval has elapsed.
    ///
    /// Quiet windows (no events and no malformed frames) are skipped to keep
    /// idle pipelines out of the log.
    pub fn maybe_report(&mut self, now: DateTime<Utc>) {
        if now - self.window_started < self.interval {
            return;
        }
        if self.events > 0 || self.malformed > 0 {
            info!(
                world = %self.world,
                events = self.events,
                player_blips = self.blips[kind_index(BlipKind::Player)],
                relative_player_blips = self.blips[kind_index(BlipKind::RelativePlayer)],
                player_logouts = self.blips[kind_index(BlipKind::Logout)],
                base_controls = self.blips[kind_index(BlipKind::BaseControl)],
                ignored = self.ignored,
                malformed = self.malformed,
                "dispatched {} blips in the last {}s",
                self.total_blips(),
                (now - self.window_started).num_seconds(),
            );
        }
        self.blips = [0; 4];
        self.events = 0;
        self.ignored = 0;
        self.malformed = 0;
        self.window_started = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    #[test]
    fn counters_accumulate_within_a_window() {
        let mut stats = DispatchStats::new(WorldId(13), 5, ts(0));
        stats.record_event();
        stats.record_blip(BlipKind::Player);
        stats.record_blip(BlipKind::RelativePlayer);
        stats.record_malformed();

        assert_eq!(stats.events(), 1);
        assert_eq!(stats.total_blips(), 2);
        assert_eq!(stats.malformed(), 1);
    }

    #[test]
    fn report_resets_after_the_interval() {
        let mut stats = DispatchStats::new(WorldId(13), 5, ts(0));
        stats.record_event();
        stats.record_blip(BlipKind::Logout);

        // Not due yet: counters survive.
        stats.maybe_report(ts(4));
        assert_eq!(stats.total_blips(), 1);

        // Due: window resets.
        stats.maybe_report(ts(5));
        assert_eq!(stats.total_blips(), 0);
        assert_eq!(stats.events(), 0);

        // The next window starts at the report time.
        stats.record_event();
        stats.maybe_report(ts(9));
        assert_eq!(stats.events(), 1);
    }
}
