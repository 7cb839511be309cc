use std::env;

use anyhow::{Context, Result, anyhow};

use crate::reservation::extract::{DEFAULT_VENUE_MARKER, DEFAULT_VISIT_MARKER, FieldExtractor};
use crate::reservation::models::MessageQuery;

pub const DEFAULT_REMINDER_MINUTES: [u32; 2] = [120, 30];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub gmail_api_client_id: String,
    pub gmail_api_client_secret: String,
    pub account_email: Option<String>,
    pub calendar_id: String,
    pub poll_interval_secs: u64,
    pub reservation: ReservationConfig,
}

/// Settings for processing reservation emails, fixed for the duration
/// of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationConfig {
    pub sender: String,
    pub subject: String,
    pub venue_marker: String,
    pub visit_marker: String,
    pub reminder_minutes_before: Vec<u32>,
    /// Gmail label added to messages that are skipped as malformed
    pub review_label_id: Option<String>,
}

impl ReservationConfig {
    pub fn new(sender: &str, subject: &str) -> Self {
        Self {
            sender: sender.to_string(),
            subject: subject.to_string(),
            venue_marker: DEFAULT_VENUE_MARKER.to_string(),
            visit_marker: DEFAULT_VISIT_MARKER.to_string(),
            reminder_minutes_before: DEFAULT_REMINDER_MINUTES.to_vec(),
            review_label_id: None,
        }
    }

    pub fn query(&self) -> MessageQuery {
        MessageQuery::new(&self.sender, &self.subject)
    }

    pub fn extractor(&self) -> FieldExtractor {
        FieldExtractor::new(&self.venue_marker, &self.visit_marker)
    }
}

/// Parse a comma separated list of reminder offsets such as `120,30`
pub fn parse_reminder_minutes(value: &str) -> Result<Vec<u32>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|e| anyhow!("Invalid reminder minutes \"{}\": {}", s, e))
        })
        .collect()
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("Missing env var {}", name))
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let storage_path = env::var("RESCAL_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/db", storage_path);
        let gmail_api_client_id = required("RESCAL_GMAIL_CLIENT_ID")?;
        let gmail_api_client_secret = required("RESCAL_GMAIL_CLIENT_SECRET")?;
        let account_email = env::var("RESCAL_ACCOUNT_EMAIL").ok();
        let calendar_id = env::var("RESCAL_CALENDAR_ID").unwrap_or_else(|_| "primary".to_string());
        let poll_interval_secs = match env::var("RESCAL_POLL_INTERVAL_SECS") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("Invalid RESCAL_POLL_INTERVAL_SECS \"{}\"", v))?,
            Err(_) => 60 * 30,
        };

        let mut reservation = ReservationConfig::new(
            &required("RESCAL_SENDER")?,
            &required("RESCAL_SUBJECT")?,
        );
        if let Ok(marker) = env::var("RESCAL_VENUE_MARKER") {
            reservation.venue_marker = marker;
        }
        if let Ok(marker) = env::var("RESCAL_VISIT_MARKER") {
            reservation.visit_marker = marker;
        }
        if let Ok(minutes) = env::var("RESCAL_REMINDER_MINUTES") {
            reservation.reminder_minutes_before = parse_reminder_minutes(&minutes)?;
        }
        reservation.review_label_id = env::var("RESCAL_REVIEW_LABEL_ID").ok();

        Ok(Self {
            storage_path,
            db_path,
            gmail_api_client_id,
            gmail_api_client_secret,
            account_email,
            calendar_id,
            poll_interval_secs,
            reservation,
        })
    }
}
