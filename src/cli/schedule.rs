use anyhow::Result;

use super::init_tracing;
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::jobs::{ProcessReservations, spawn_periodic_job};

pub async fn run() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let db = async_db(&config.db_path).await?;

    tracing::info!(
        "Processing reservations every {} seconds",
        config.poll_interval_secs
    );
    let job = ProcessReservations::new(&config);
    let handle = spawn_periodic_job(config, db, job);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    handle.abort();

    Ok(())
}
