use std::time::Duration;

use async_trait::async_trait;
use tokio_rusqlite::Connection;

use crate::core::AppConfig;

pub mod process_reservations;

pub use process_reservations::ProcessReservations;

/// A unit of work run on a fixed interval by `spawn_periodic_job`
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn interval(&self) -> Duration;

    async fn run_job(&self, config: &AppConfig, db: &Connection);
}

/// Run `job` now and then every `job.interval()` in a background task
pub fn spawn_periodic_job<J: PeriodicJob + 'static>(
    config: AppConfig,
    db: Connection,
    job: J,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(job.interval());
        // A slow run delays the next one instead of stacking up
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            job.run_job(&config, &db).await;
        }
    })
}
