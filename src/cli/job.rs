use anyhow::Result;
use tokio_rusqlite::Connection;

use super::init_tracing;
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::jobs::process_reservations::process_reservations;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum JobId {
    ProcessReservations,
}

/// Run a job once. Unlike the scheduled run, an aborted run is returned
/// as an error so the process exits non-zero.
pub async fn run_once(id: JobId, config: &AppConfig, db: &Connection) -> Result<()> {
    tracing::info!("Running job: {:?}", id);

    match id {
        JobId::ProcessReservations => {
            let summary = process_reservations(config, db).await?;
            tracing::info!(
                "Job completed: {} events created, {} pending retry",
                summary.completed,
                summary.retry_pending
            );
        }
    }

    Ok(())
}

pub async fn run(id: JobId) -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let db = async_db(&config.db_path).await?;

    run_once(id, &config, &db).await
}
