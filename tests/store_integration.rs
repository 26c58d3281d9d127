//! Integration tests against a live buffer database.
//!
//! These tests need a reachable Postgres instance and are ignored by default:
//!
//! ```text
//! APL_TEST_DATABASE_URL=postgres://apl@localhost/apl_test \
//!     cargo test --test store_integration -- --ignored
//! ```
//!
//! The schema is applied on connect, and each test cleans up the rows it
//! touches, keyed by its own character/facility IDs so tests can run
//! concurrently against one database.

use chrono::{TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use apl_listener::blips::{
    BaseControlBlip, Blip, Confidence, PlayerBlip, RelativePlayerBlip,
};
use apl_listener::store::{BlipWriter, CommitOutcome};
use apl_listener::types::{CharacterId, FacilityId, FactionId, WorldId, ZoneId};

async fn test_pool() -> PgPool {
    let url = std::env::var("APL_TEST_DATABASE_URL")
        .expect("APL_TEST_DATABASE_URL must be set for integration tests");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("failed to connect to the test database");
    sqlx::raw_sql(include_str!("../sql/schema.sql"))
        .execute(&pool)
        .await
        .expect("failed to apply the buffer schema");
    pool
}

fn player_blip(character: u64) -> Blip {
    Blip::Player(PlayerBlip {
        timestamp: Utc.with_ymd_and_hms(2024, 3, 7, 18, 30, 0).unwrap(),
        world: WorldId(13),
        zone: ZoneId(2),
        character: CharacterId(character),
        facility: FacilityId(222280),
        confidence: Confidence::Confirmed,
    })
}

#[tokio::test]
#[ignore]
async fn duplicate_commit_creates_one_row_set() {
    let pool = test_pool().await;
    let writer = BlipWriter::new(pool.clone());
    let character = 900_000_001_u64;

    sqlx::query("DELETE FROM blips.player_blip WHERE character_id = $1")
        .bind(character as i64)
        .execute(&pool)
        .await
        .unwrap();

    let blips = vec![player_blip(character)];
    assert_eq!(writer.commit(&blips).await.unwrap(), CommitOutcome::Committed);
    assert_eq!(writer.commit(&blips).await.unwrap(), CommitOutcome::Committed);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM blips.player_blip WHERE character_id = $1")
            .bind(character as i64)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1, "reprocessing must not create a second row");
}

#[tokio::test]
#[ignore]
async fn one_event_blip_set_commits_together() {
    let pool = test_pool().await;
    let writer = BlipWriter::new(pool.clone());
    let (killer, victim) = (900_000_002_u64, 900_000_003_u64);
    let timestamp = Utc.with_ymd_and_hms(2024, 3, 7, 18, 31, 0).unwrap();

    for table in ["player_blip", "relative_player_blip"] {
        sqlx::query(&format!(
            "DELETE FROM blips.{table} WHERE \"timestamp\" = $1"
        ))
        .bind(timestamp)
        .execute(&pool)
        .await
        .unwrap();
    }

    // A kill event's decomposition: position plus relation, one transaction.
    let blips = vec![
        Blip::Player(PlayerBlip {
            timestamp,
            world: WorldId(13),
            zone: ZoneId(2),
            character: CharacterId(killer),
            facility: FacilityId(222280),
            confidence: Confidence::Confirmed,
        }),
        Blip::RelativePlayer(RelativePlayerBlip::new(
            timestamp,
            WorldId(13),
            ZoneId(2),
            CharacterId(killer),
            CharacterId(victim),
        )),
    ];
    assert_eq!(writer.commit(&blips).await.unwrap(), CommitOutcome::Committed);

    let (positions,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM blips.player_blip WHERE \"timestamp\" = $1")
            .bind(timestamp)
            .fetch_one(&pool)
            .await
            .unwrap();
    let (relations,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM blips.relative_player_blip WHERE \"timestamp\" = $1",
    )
    .bind(timestamp)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!((positions, relations), (1, 1));
}

#[tokio::test]
#[ignore]
async fn base_control_roundtrip() {
    let pool = test_pool().await;
    let writer = BlipWriter::new(pool.clone());
    let timestamp = Utc.with_ymd_and_hms(2024, 3, 7, 18, 32, 0).unwrap();

    sqlx::query("DELETE FROM blips.base_control WHERE \"timestamp\" = $1")
        .bind(timestamp)
        .execute(&pool)
        .await
        .unwrap();

    let blips = vec![Blip::BaseControl(BaseControlBlip {
        timestamp,
        world: WorldId(13),
        zone: ZoneId(2),
        facility: FacilityId(17),
        old_faction: FactionId(1),
        new_faction: FactionId(2),
    })];
    assert_eq!(writer.commit(&blips).await.unwrap(), CommitOutcome::Committed);

    let (old_faction, new_faction): (i32, i32) = sqlx::query_as(
        "SELECT old_faction_id, new_faction_id FROM blips.base_control WHERE \"timestamp\" = $1",
    )
    .bind(timestamp)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!((old_faction, new_faction), (1, 2));
}
