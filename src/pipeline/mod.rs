//! Per-world event pipeline.
//!
//! A pipeline owns one transport session plus its validator counters,
//! classifier, writer handle and health state, and processes its stream
//! sequentially in arrival order - correlation rules depend on recent
//! history, so there is no intra-pipeline parallelism. Pipelines for
//! different worlds run as independent tasks and share nothing but the
//! storage pool.
//!
//! # Failure handling
//!
//! - Malformed frames are counted and dropped; the stream continues
//! - Commit failures after the retry budget are logged with the serialized
//!   blip set for manual reconciliation, then the stream continues
//! - Disconnects and stale subscriptions are recovered via the health
//!   monitor's resubscribe/reconnect ladder
//! - Only the very first connect is allowed to fail the pipeline: a daemon
//!   that never got a session should say so and exit
//!
//! On shutdown the in-flight event's commit completes before the session is
//! torn down; pending timers are simply dropped.

pub mod stats;

pub use stats::DispatchStats;

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::blips::Blip;
use crate::classify::{Classifier, ClassifierConfig};
use crate::events::{parse_message, Parsed};
use crate::health::{HealthAction, HealthConfig, SubscriptionHealth};
use crate::store::{BlipWriter, CommitOutcome, StoreError};
use crate::transport::{EventStream, StreamMessage, Subscription, TransportError};
use crate::types::WorldId;

/// How often the health monitor and statistics reporter are polled.
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Destination for classified blips.
///
/// The production implementation is [`BlipWriter`]; tests substitute
/// collecting sinks.
#[allow(async_fn_in_trait)]
pub trait BlipSink {
    /// Commits one event's blips atomically.
    async fn commit(&self, blips: &[Blip]) -> Result<CommitOutcome, StoreError>;
}

impl BlipSink for BlipWriter {
    async fn commit(&self, blips: &[Blip]) -> Result<CommitOutcome, StoreError> {
        BlipWriter::commit(self, blips).await
    }
}

/// Unrecoverable pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The initial session could not be established.
    #[error("no event session for world {world}: {source}")]
    Startup {
        world: WorldId,
        #[source]
        source: TransportError,
    },
}

/// Tunables for one pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// The world this pipeline is scoped to.
    pub world: WorldId,

    /// Classifier inference tunables.
    pub classifier: ClassifierConfig,

    /// Health monitor tunables.
    pub health: HealthConfig,

    /// Seconds between dispatch statistics reports.
    pub stats_interval_secs: u64,

    /// Seconds between transport reconnect attempts.
    pub reconnect_delay_secs: u64,
}

impl PipelineConfig {
    /// Default tunables for a world.
    pub fn for_world(world: WorldId) -> Self {
        PipelineConfig {
            world,
            classifier: ClassifierConfig::default(),
            health: HealthConfig::default(),
            stats_interval_secs: 5,
            reconnect_delay_secs: 5,
        }
    }
}

/// One world's stream-to-store pipeline.
pub struct Pipeline<S, W> {
    world: WorldId,
    stream: S,
    sink: W,
    classifier: Classifier,
    health: SubscriptionHealth,
    health_config: HealthConfig,
    stats: DispatchStats,
    subscription: Subscription,
    reconnect_delay: Duration,
    cancel: CancellationToken,
}

impl<S: EventStream, W: BlipSink> Pipeline<S, W> {
    /// Assembles a pipeline; nothing is connected until [`Pipeline::run`].
    pub fn new(config: PipelineConfig, stream: S, sink: W, cancel: CancellationToken) -> Self {
        let now = Utc::now();
        Pipeline {
            world: config.world,
            stream,
            sink,
            classifier: Classifier::new(config.classifier),
            health: SubscriptionHealth::new(config.health, now),
            health_config: config.health,
            stats: DispatchStats::new(config.world, config.stats_interval_secs, now),
            subscription: Subscription::blip_sources(&[config.world]),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            cancel,
        }
    }

    /// Runs the pipeline until cancelled.
    ///
    /// Returns `Err` only when the very first session cannot be established;
    /// every later failure is recovered internally.
    pub async fn run(mut self) -> Result<(), PipelineError> {
        self.stream
            .connect()
            .await
            .map_err(|source| PipelineError::Startup {
                world: self.world,
                source,
            })?;
        self.stream
            .subscribe(&self.subscription)
            .await
            .map_err(|source| PipelineError::Startup {
                world: self.world,
                source,
            })?;
        self.health = SubscriptionHealth::new(self.health_config, Utc::now());
        info!(world = %self.world, "pipeline started");

        let mut monitor = tokio::time::interval(MONITOR_INTERVAL);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = self.stream.next_message() => match message {
                    StreamMessage::Text(text) => self.handle_frame(&text).await,
                    StreamMessage::Disconnected { reason } => {
                        warn!(world = %self.world, reason = %reason, "event session dropped");
                        self.reconnect().await;
                    }
                },
                _ = monitor.tick() => self.monitor_tick().await,
            }
        }

        info!(world = %self.world, "pipeline shutting down");
        self.stream.close().await;
        Ok(())
    }

    /// Processes one raw frame end to end: validate, classify, commit.
    ///
    /// Never fails the stream; every error path is logged and dropped.
    async fn handle_frame(&mut self, text: &str) {
        let now = Utc::now();
        self.health.observe_message(now);

        match parse_message(text) {
            Ok(Parsed::Event(event)) => {
                self.stats.record_event();
                let blips = self.classifier.classify(&event);
                if blips.is_empty() {
                    return;
                }
                self.commit(&blips, event.name()).await;
            }
            Ok(Parsed::Heartbeat) => debug!(world = %self.world, "heartbeat"),
            Ok(Parsed::Ignored) => self.stats.record_ignored(),
            Err(err) => {
                self.stats.record_malformed();
                warn!(world = %self.world, error = %err, "dropping malformed frame");
            }
        }
        self.stats.maybe_report(now);
    }

    async fn commit(&mut self, blips: &[Blip], event_name: &str) {
        match self.sink.commit(blips).await {
            Ok(CommitOutcome::Committed) => {
                for blip in blips {
                    self.stats.record_blip(blip.kind());
                }
            }
            Ok(CommitOutcome::SkippedForeignKey) => {
                debug!(
                    world = %self.world,
                    event = event_name,
                    "dropped blip set referencing untracked static data"
                );
            }
            Err(err) => {
                // The blip set must not vanish silently: serialize it into
                // the log so it can be replayed during reconciliation.
                let payload = serde_json::to_string(blips)
                    .unwrap_or_else(|_| "<unserializable>".to_string());
                error!(
                    world = %self.world,
                    event = event_name,
                    error = %err,
                    blips = %payload,
                    "failed to persist blip set; manual reconciliation required"
                );
            }
        }
    }

    async fn monitor_tick(&mut self) {
        let now = Utc::now();
        self.stats.maybe_report(now);
        match self.health.tick(now) {
            Some(HealthAction::Resubscribe) => self.resubscribe().await,
            Some(HealthAction::Reconnect) => self.reconnect().await,
            None => {}
        }
    }

    async fn resubscribe(&mut self) {
        info!(
            world = %self.world,
            attempts = self.health.attempts(),
            "recreating stale subscription"
        );
        // Best effort: a wedged subscription often cannot be cleared either.
        let _ = self.stream.unsubscribe(&self.subscription).await;
        self.health.resubscribe_started(Utc::now());
        if let Err(err) = self.stream.subscribe(&self.subscription).await {
            warn!(world = %self.world, error = %err, "resubscribe failed");
            if self.health.resubscribe_failed() == HealthAction::Reconnect {
                self.reconnect().await;
            }
        }
    }

    /// Re-establishes the transport session, retrying until it succeeds or
    /// shutdown is requested.
    async fn reconnect(&mut self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            match self.stream.connect().await {
                Ok(()) => {
                    self.health.transport_reconnected(Utc::now());
                    match self.stream.subscribe(&self.subscription).await {
                        Ok(()) => {
                            info!(world = %self.world, "event session re-established");
                            return;
                        }
                        Err(err) => {
                            warn!(world = %self.world, error = %err, "subscribe after reconnect failed");
                        }
                    }
                }
                Err(err) => {
                    warn!(world = %self.world, error = %err, "reconnect attempt failed");
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }
}
