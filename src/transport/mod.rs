//! Upstream event stream transport.
//!
//! The wire protocol lives behind the [`EventStream`] capability trait:
//! subscribe, unsubscribe, read the next message, and reconnect. The health
//! monitor and pipeline drive recovery through this trait without knowing
//! anything about websockets, and tests substitute scripted implementations.

pub mod census;

pub use census::CensusStream;

use serde_json::json;
use thiserror::Error;

use crate::events::PROXIMITY_EXPERIENCE_IDS;
use crate::types::WorldId;

/// Error type for transport-level failures.
///
/// These are recovered by the health monitor via resubscribe/reconnect; they
/// are only fatal when no session can be established at startup.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing the websocket session failed.
    #[error("failed to connect to event stream: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    /// Sending a frame (subscribe action) failed.
    #[error("websocket send failed: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),

    /// An operation was attempted without an established session.
    #[error("not connected")]
    NotConnected,
}

/// One filtered upstream event feed.
///
/// Scoped to a set of worlds and event names; the census API treats the
/// combination as a single logical subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Worlds the subscription is scoped to.
    pub worlds: Vec<WorldId>,

    /// Census event names, including experience-filtered variants.
    pub event_names: Vec<String>,
}

impl Subscription {
    /// Builds the standard blip-source subscription for a set of worlds.
    ///
    /// GainExperience is subscribed per experience ID so the stream carries
    /// only the proximity-asserting ticks rather than the full experience
    /// firehose.
    pub fn blip_sources(worlds: &[WorldId]) -> Self {
        let mut event_names: Vec<String> = [
            "Death",
            "PlayerFacilityCapture",
            "PlayerFacilityDefend",
            "VehicleDestroy",
            "FacilityControl",
            "PlayerLogout",
        ]
        .iter()
        .map(|name| (*name).to_string())
        .collect();
        event_names.extend(
            PROXIMITY_EXPERIENCE_IDS
                .iter()
                .map(|id| format!("GainExperience_experience_id_{id}")),
        );
        Subscription {
            worlds: worlds.to_vec(),
            event_names,
        }
    }

    /// The census `subscribe` action frame for this subscription.
    ///
    /// `logicalAndCharactersWithWorlds` scopes character-centric events
    /// (deaths, logouts) to the subscribed worlds instead of unioning them
    /// with the character filter.
    pub fn subscribe_action(&self) -> String {
        json!({
            "service": "event",
            "action": "subscribe",
            "characters": ["all"],
            "worlds": self.world_strings(),
            "eventNames": self.event_names,
            "logicalAndCharactersWithWorlds": true,
        })
        .to_string()
    }

    /// The census `clearSubscribe` action frame for this subscription.
    pub fn clear_action(&self) -> String {
        json!({
            "service": "event",
            "action": "clearSubscribe",
            "characters": ["all"],
            "worlds": self.world_strings(),
            "eventNames": self.event_names,
        })
        .to_string()
    }

    fn world_strings(&self) -> Vec<String> {
        self.worlds.iter().map(|w| w.to_string()).collect()
    }
}

/// A message surfaced by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// A raw text frame, to be fed to the parser.
    Text(String),

    /// The session dropped. The pipeline decides whether and when to
    /// reconnect; the transport does not retry on its own.
    Disconnected {
        /// Human-readable cause, for logging.
        reason: String,
    },
}

/// Capability interface over the upstream real-time stream.
///
/// Implementations maintain at most one live session. Reconnect policy
/// deliberately lives with the caller: the health monitor owns the decision,
/// the transport only executes it.
#[allow(async_fn_in_trait)]
pub trait EventStream {
    /// Establishes (or re-establishes) the session.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Registers a subscription on the live session.
    async fn subscribe(&mut self, subscription: &Subscription) -> Result<(), TransportError>;

    /// Removes a subscription from the live session.
    async fn unsubscribe(&mut self, subscription: &Subscription) -> Result<(), TransportError>;

    /// Waits for the next message or disconnect signal.
    async fn next_message(&mut self) -> StreamMessage;

    /// Gracefully closes the session.
    async fn close(&mut self);
}
