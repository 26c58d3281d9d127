//! Subscription health monitoring.
//!
//! The census stream fails quietly: a subscription can stop delivering
//! without the socket closing. This module tracks per-subscription message
//! cadence and drives the recovery ladder:
//!
//! ```text
//! Active -> Stale -> Resubscribing -> Active      (happy path)
//!                    Resubscribing -> Dead        (retry budget exhausted)
//! Dead -> Resubscribing                            (after transport reconnect)
//! ```
//!
//! The state machine is pure: it observes timestamps and returns the action
//! the pipeline should take. Actual resubscribing and reconnecting happen in
//! the pipeline, which reports the outcome back. All transitions use caller-
//! supplied times, so the machine is testable without a clock.

use chrono::{DateTime, Duration, Utc};

/// Lifecycle of one upstream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionLifecycle {
    /// Messages are flowing (or the subscription is too young to judge).
    Active,

    /// Silence exceeded the threshold; a resubscribe is due.
    Stale,

    /// The subscription was recreated and is awaiting its first message.
    Resubscribing,

    /// The resubscribe budget is exhausted; only a full transport reconnect
    /// can recover this subscription.
    Dead,
}

/// Recovery step the pipeline should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAction {
    /// Drop and recreate the subscription.
    Resubscribe,

    /// Tear down the websocket session and reconnect from scratch.
    Reconnect,
}

/// Tunables for the health monitor.
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    /// Silence duration after which a chatty subscription counts as stale,
    /// in seconds.
    pub silence_threshold_secs: u64,

    /// How many consecutive resubscribe attempts are allowed before
    /// escalating to a transport reconnect.
    pub resubscribe_budget: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            silence_threshold_secs: 60,
            resubscribe_budget: 3,
        }
    }
}

/// Per-subscription health state.
///
/// Owned and mutated only by its pipeline's monitor loop; recreated state
/// (attempt counts, silence timers) resets whenever the subscription
/// recovers.
#[derive(Debug)]
pub struct SubscriptionHealth {
    silence_threshold: Duration,
    resubscribe_budget: u32,
    lifecycle: SubscriptionLifecycle,
    last_message_at: DateTime<Utc>,
    resubscribe_started_at: Option<DateTime<Utc>>,
    attempts: u32,
}

impl SubscriptionHealth {
    /// Creates the state for a freshly subscribed feed.
    ///
    /// Initial state is `Active`: the subscribe call succeeded and silence is
    /// measured from `now`.
    pub fn new(config: HealthConfig, now: DateTime<Utc>) -> Self {
        SubscriptionHealth {
            silence_threshold: Duration::seconds(config.silence_threshold_secs as i64),
            resubscribe_budget: config.resubscribe_budget,
            lifecycle: SubscriptionLifecycle::Active,
            last_message_at: now,
            resubscribe_started_at: None,
            attempts: 0,
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> SubscriptionLifecycle {
        self.lifecycle
    }

    /// Number of resubscribe attempts in the current recovery episode.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records an inbound message (event or heartbeat).
    ///
    /// A message on a stale or resubscribing feed proves recovery and resets
    /// the attempt counter. A dead subscription stays dead - it only returns
    /// through a transport reconnect.
    pub fn observe_message(&mut self, at: DateTime<Utc>) {
        self.last_message_at = at;
        match self.lifecycle {
            SubscriptionLifecycle::Stale | SubscriptionLifecycle::Resubscribing => {
                self.lifecycle = SubscriptionLifecycle::Active;
                self.attempts = 0;
                self.resubscribe_started_at = None;
            }
            SubscriptionLifecycle::Active | SubscriptionLifecycle::Dead => {}
        }
    }

    /// Periodic check, driven by the pipeline's monitor interval.
    ///
    /// Returns the recovery action that is due, if any. Entering `Stale`
    /// happens exactly once per silence episode: the transition returns
    /// `Resubscribe` and further ticks are quiet until the pipeline reports
    /// the resubscribe via [`SubscriptionHealth::resubscribe_started`].
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<HealthAction> {
        match self.lifecycle {
            SubscriptionLifecycle::Active => {
                if now - self.last_message_at > self.silence_threshold {
                    self.lifecycle = SubscriptionLifecycle::Stale;
                    Some(HealthAction::Resubscribe)
                } else {
                    None
                }
            }
            // The pipeline is about to act on the Resubscribe it was handed.
            SubscriptionLifecycle::Stale => None,
            SubscriptionLifecycle::Resubscribing => {
                let started = self.resubscribe_started_at.unwrap_or(self.last_message_at);
                if now - started > self.silence_threshold {
                    if self.attempts >= self.resubscribe_budget {
                        self.lifecycle = SubscriptionLifecycle::Dead;
                        Some(HealthAction::Reconnect)
                    } else {
                        Some(HealthAction::Resubscribe)
                    }
                } else {
                    None
                }
            }
            // The pipeline drives the reconnect; nothing to do per tick.
            SubscriptionLifecycle::Dead => None,
        }
    }

    /// Reports that the subscription was dropped and recreated.
    pub fn resubscribe_started(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.lifecycle = SubscriptionLifecycle::Resubscribing;
        self.resubscribe_started_at = Some(now);
    }

    /// Reports that a resubscribe attempt failed outright (the subscribe
    /// call errored).
    ///
    /// Returns the follow-up action: retry while budget remains, otherwise
    /// escalate to a reconnect.
    pub fn resubscribe_failed(&mut self) -> HealthAction {
        if self.attempts >= self.resubscribe_budget {
            self.lifecycle = SubscriptionLifecycle::Dead;
            HealthAction::Reconnect
        } else {
            HealthAction::Resubscribe
        }
    }

    /// Reports a successful transport-level reconnect.
    ///
    /// All subscriptions restart from `Resubscribing` with a fresh budget.
    pub fn transport_reconnected(&mut self, now: DateTime<Utc>) {
        self.lifecycle = SubscriptionLifecycle::Resubscribing;
        self.attempts = 0;
        self.last_message_at = now;
        self.resubscribe_started_at = Some(now);
    }
}
