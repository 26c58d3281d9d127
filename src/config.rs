//! Daemon configuration.
//!
//! Configuration is read once at startup from environment variables. Only the
//! census service ID and the database URL are required; every threshold has a
//! production default. There is no CLI surface - the listener is driven by
//! process signals.

use thiserror::Error;

use crate::classify::ClassifierConfig;
use crate::health::HealthConfig;
use crate::pipeline::PipelineConfig;
use crate::types::WorldId;

/// Worlds tracked when `APL_WORLDS` is not set: Connery, Miller, Cobalt,
/// Emerald, Briggs and SolTech.
pub const DEFAULT_WORLDS: [WorldId; 6] = [
    WorldId(1),
    WorldId(10),
    WorldId(13),
    WorldId(17),
    WorldId(25),
    WorldId(40),
];

/// Error type for configuration loading failures.
///
/// Any of these is fatal at startup: the daemon logs the error and exits
/// non-zero.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("required environment variable {name} is not set")]
    Missing { name: &'static str },

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration for the listener daemon.
#[derive(Debug, Clone)]
pub struct Config {
    /// Census service ID, including the `s:` prefix.
    pub service_id: String,

    /// Postgres connection URL for the buffer database.
    pub database_url: String,

    /// Worlds to run pipelines for.
    pub worlds: Vec<WorldId>,

    /// Subscription silence threshold, in seconds.
    pub silence_threshold_secs: u64,

    /// Correlation recency window, in seconds.
    pub recency_window_secs: u64,

    /// Confirmed-position horizon, in seconds.
    pub confirmed_horizon_secs: u64,

    /// Resubscribe attempts before escalating to a reconnect.
    pub resubscribe_budget: u32,

    /// Seconds between dispatch statistics reports.
    pub stats_interval_secs: u64,

    /// Seconds between transport reconnect attempts.
    pub reconnect_delay_secs: u64,
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let service_id = lookup("APL_SERVICE_ID").ok_or(ConfigError::Missing {
            name: "APL_SERVICE_ID",
        })?;
        let database_url = lookup("APL_DATABASE_URL").ok_or(ConfigError::Missing {
            name: "APL_DATABASE_URL",
        })?;

        let worlds = match lookup("APL_WORLDS") {
            Some(raw) => parse_worlds(&raw)?,
            None => DEFAULT_WORLDS.to_vec(),
        };

        Ok(Config {
            service_id,
            database_url,
            worlds,
            silence_threshold_secs: parse_or(&lookup, "APL_SILENCE_THRESHOLD_SECS", 60)?,
            recency_window_secs: parse_or(&lookup, "APL_RECENCY_WINDOW_SECS", 300)?,
            confirmed_horizon_secs: parse_or(&lookup, "APL_CONFIRMED_HORIZON_SECS", 30)?,
            resubscribe_budget: parse_or(&lookup, "APL_RESUBSCRIBE_BUDGET", 3)?,
            stats_interval_secs: parse_or(&lookup, "APL_STATS_INTERVAL_SECS", 5)?,
            reconnect_delay_secs: parse_or(&lookup, "APL_RECONNECT_DELAY_SECS", 5)?,
        })
    }

    /// Assembles the per-pipeline tunables for one world.
    pub fn pipeline_config(&self, world: WorldId) -> PipelineConfig {
        PipelineConfig {
            world,
            classifier: ClassifierConfig {
                recency_window_secs: self.recency_window_secs,
                confirmed_horizon_secs: self.confirmed_horizon_secs,
            },
            health: HealthConfig {
                silence_threshold_secs: self.silence_threshold_secs,
                resubscribe_budget: self.resubscribe_budget,
            },
            stats_interval_secs: self.stats_interval_secs,
            reconnect_delay_secs: self.reconnect_delay_secs,
        }
    }
}

fn parse_worlds(raw: &str) -> Result<Vec<WorldId>, ConfigError> {
    let mut worlds = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id: u16 = part.parse().map_err(|_| ConfigError::Invalid {
            name: "APL_WORLDS",
            value: raw.to_string(),
        })?;
        worlds.push(WorldId(id));
    }
    if worlds.is_empty() {
        return Err(ConfigError::Invalid {
            name: "APL_WORLDS",
            value: raw.to_string(),
        });
    }
    Ok(worlds)
}

fn parse_or<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
        None => Ok(default),
    }
}
