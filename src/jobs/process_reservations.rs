use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;
use tokio_rusqlite::Connection;

use super::PeriodicJob;
use crate::{
    core::AppConfig,
    google::{
        gcal::GoogleCalendar,
        gmail::GmailClient,
        oauth::{find_all_gmail_auth_emails, find_refresh_token, refresh_access_token},
    },
    reservation::{ReservationProcessor, RunSummary},
};

#[derive(Debug)]
pub struct ProcessReservations {
    interval: Duration,
}

impl ProcessReservations {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
        }
    }
}

/// Pick the configured account or fall back to the first one stored
async fn resolve_account(config: &AppConfig, db: &Connection) -> Result<String> {
    if let Some(email) = &config.account_email {
        return Ok(email.clone());
    }
    find_all_gmail_auth_emails(db)
        .await?
        .into_iter()
        .next()
        .ok_or(anyhow!("No gmail account stored, run `rescal auth` first"))
}

/// Run the reservation pipeline once against the stored Google account
pub async fn process_reservations(config: &AppConfig, db: &Connection) -> Result<RunSummary> {
    let AppConfig {
        gmail_api_client_id,
        gmail_api_client_secret,
        calendar_id,
        reservation,
        ..
    } = config;

    let email = resolve_account(config, db).await?;
    let refresh_token = find_refresh_token(db, &email).await?;
    let oauth = refresh_access_token(gmail_api_client_id, gmail_api_client_secret, &refresh_token)
        .await
        .with_context(|| format!("Failed to refresh access token for {}", email))?;

    let gmail = GmailClient::new(&oauth.access_token);
    let calendar = GoogleCalendar::new(&oauth.access_token, calendar_id);
    let processor = ReservationProcessor::new(gmail, calendar, reservation.clone());

    processor.run().await
}

#[async_trait]
impl PeriodicJob for ProcessReservations {
    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run_job(&self, config: &AppConfig, db: &Connection) {
        tracing::info!("Starting reservation processing job");

        match process_reservations(config, db).await {
            Ok(summary) => tracing::info!(
                "Completed reservation processing job: {} events created",
                summary.completed
            ),
            Err(e) => tracing::error!("Reservation processing job aborted: {:#}", e),
        }
    }
}
