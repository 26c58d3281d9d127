//! Idempotent blip persistence.
//!
//! The writer commits the blips derived from one raw event inside a single
//! transaction: either the whole set becomes visible or none of it does.
//! Every insert carries `ON CONFLICT DO NOTHING` on the variant's natural
//! key, so reprocessing after a crash or a mid-commit retry never creates a
//! second row.

use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use tracing::debug;

use crate::blips::{Blip, BlipKind};

use super::error::StoreError;
use super::retry::{retry_with_backoff, RetryConfig, RetryResult};

const INSERT_PLAYER_BLIP: &str = "\
INSERT INTO blips.player_blip \
    (timestamp, world_id, zone_id, character_id, facility_id, confidence) \
VALUES ($1, $2, $3, $4, $5, $6) \
ON CONFLICT DO NOTHING";

const INSERT_RELATIVE_PLAYER_BLIP: &str = "\
INSERT INTO blips.relative_player_blip \
    (timestamp, world_id, zone_id, character_a_id, character_b_id) \
VALUES ($1, $2, $3, $4, $5) \
ON CONFLICT DO NOTHING";

const INSERT_PLAYER_LOGOUT: &str = "\
INSERT INTO blips.player_logout \
    (timestamp, world_id, character_id) \
VALUES ($1, $2, $3) \
ON CONFLICT DO NOTHING";

const INSERT_BASE_CONTROL: &str = "\
INSERT INTO blips.base_control \
    (timestamp, world_id, zone_id, facility_id, old_faction_id, new_faction_id) \
VALUES ($1, $2, $3, $4, $5, $6) \
ON CONFLICT DO NOTHING";

/// Returns the insert statement for a blip variant.
pub fn insert_statement(kind: BlipKind) -> &'static str {
    match kind {
        BlipKind::Player => INSERT_PLAYER_BLIP,
        BlipKind::RelativePlayer => INSERT_RELATIVE_PLAYER_BLIP,
        BlipKind::Logout => INSERT_PLAYER_LOGOUT,
        BlipKind::BaseControl => INSERT_BASE_CONTROL,
    }
}

/// What happened to a committed blip set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The transaction committed (rows may have been conflict-skipped).
    Committed,

    /// The set referenced static data the database does not know (foreign-key
    /// violation); the whole set was rolled back and dropped.
    SkippedForeignKey,
}

/// Commits blip sets into the shared buffer schema.
///
/// Cloneable; each commit borrows one pool connection for the duration of its
/// transaction and releases it on completion.
#[derive(Debug, Clone)]
pub struct BlipWriter {
    pool: PgPool,
    retry: RetryConfig,
}

impl BlipWriter {
    /// Creates a writer with the default retry policy.
    pub fn new(pool: PgPool) -> Self {
        Self::with_retry(pool, RetryConfig::DEFAULT)
    }

    /// Creates a writer with a custom retry policy.
    pub fn with_retry(pool: PgPool, retry: RetryConfig) -> Self {
        BlipWriter { pool, retry }
    }

    /// Commits one event's blips atomically.
    ///
    /// Transient failures are retried with backoff; re-running the whole
    /// transaction is safe because the inserts are idempotent. A foreign-key
    /// violation skips the set (the referenced base is not tracked). An
    /// exhausted retry budget or permanent error surfaces as `Err` - the
    /// caller must not drop it silently.
    pub async fn commit(&self, blips: &[Blip]) -> Result<CommitOutcome, StoreError> {
        if blips.is_empty() {
            return Ok(CommitOutcome::Committed);
        }

        match retry_with_backoff(self.retry, || self.try_commit(blips)).await {
            RetryResult::Success(()) => Ok(CommitOutcome::Committed),
            RetryResult::ForeignKeyViolation(e) => {
                debug!(error = %e, "ignored foreign key violation");
                Ok(CommitOutcome::SkippedForeignKey)
            }
            RetryResult::ExhaustedRetries {
                last_error,
                attempts,
            } => Err(StoreError::exhausted(last_error, attempts)),
            RetryResult::PermanentError(e) => Err(e),
        }
    }

    async fn try_commit(&self, blips: &[Blip]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        for blip in blips {
            insert_blip(&mut tx, blip).await?;
        }
        tx.commit().await.map_err(StoreError::from_sqlx)
    }
}

async fn insert_blip(
    tx: &mut Transaction<'_, Postgres>,
    blip: &Blip,
) -> Result<(), StoreError> {
    let result = match blip {
        Blip::Player(b) => {
            sqlx::query(INSERT_PLAYER_BLIP)
                .bind(b.timestamp)
                .bind(i32::from(b.world.0))
                .bind(i64::from(b.zone.0))
                .bind(b.character.0 as i64)
                .bind(b.facility.0 as i64)
                .bind(b.confidence.as_str())
                .execute(&mut **tx)
                .await
        }
        Blip::RelativePlayer(b) => {
            sqlx::query(INSERT_RELATIVE_PLAYER_BLIP)
                .bind(b.timestamp)
                .bind(i32::from(b.world.0))
                .bind(i64::from(b.zone.0))
                .bind(b.character_a.0 as i64)
                .bind(b.character_b.0 as i64)
                .execute(&mut **tx)
                .await
        }
        Blip::Logout(b) => {
            sqlx::query(INSERT_PLAYER_LOGOUT)
                .bind(b.timestamp)
                .bind(i32::from(b.world.0))
                .bind(b.character.0 as i64)
                .execute(&mut **tx)
                .await
        }
        Blip::BaseControl(b) => {
            sqlx::query(INSERT_BASE_CONTROL)
                .bind(b.timestamp)
                .bind(i32::from(b.world.0))
                .bind(i64::from(b.zone.0))
                .bind(b.facility.0 as i64)
                .bind(i32::from(b.old_faction.0))
                .bind(i32::from(b.new_faction.0))
                .execute(&mut **tx)
                .await
        }
    };
    result.map_err(StoreError::from_sqlx)?;
    Ok(())
}
