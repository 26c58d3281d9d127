//! APL listener daemon entry point.
//!
//! Reads configuration from the environment, connects to the buffer database
//! and runs one pipeline task per tracked world. The process exits non-zero
//! when startup fails outright (bad configuration, unreachable database, or
//! no world ever establishing an event session); once running, individual
//! pipeline failures are recovered without crashing the process.

use std::process::ExitCode;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apl_listener::config::Config;
use apl_listener::pipeline::Pipeline;
use apl_listener::store::BlipWriter;
use apl_listener::transport::CensusStream;

#[derive(Debug, Error)]
enum DaemonError {
    #[error("failed to connect to the buffer database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("no pipeline could establish an event session")]
    NoSessions,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apl_listener=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "configuration error");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "daemon failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), DaemonError> {
    info!(
        worlds = ?config.worlds,
        "connecting to buffer database"
    );
    let pool = PgPoolOptions::new()
        // One connection per concurrent commit plus headroom for recovery.
        .max_connections(config.worlds.len() as u32 + 2)
        .connect(&config.database_url)
        .await?;
    info!("database connection established");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        signal_cancel.cancel();
    });

    let mut pipelines = JoinSet::new();
    for world in &config.worlds {
        let pipeline = Pipeline::new(
            config.pipeline_config(*world),
            CensusStream::new(&config.service_id),
            BlipWriter::new(pool.clone()),
            cancel.child_token(),
        );
        let world = *world;
        pipelines.spawn(async move { (world, pipeline.run().await) });
    }

    let total = config.worlds.len();
    let mut startup_failures = 0;
    while let Some(joined) = pipelines.join_next().await {
        match joined {
            Ok((world, Ok(()))) => info!(%world, "pipeline finished"),
            Ok((world, Err(err))) => {
                error!(%world, error = %err, "pipeline failed to start");
                startup_failures += 1;
            }
            Err(err) => error!(error = %err, "pipeline task panicked"),
        }
    }

    pool.close().await;

    if total > 0 && startup_failures == total {
        return Err(DaemonError::NoSessions);
    }
    info!("listener stopped");
    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM.
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("received interrupt"),
                _ = terminate.recv() => info!("received terminate"),
            }
        }
        Err(err) => {
            warn!(error = %err, "could not install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            info!("received interrupt");
        }
    }
}
