//! Field extraction from the plain-text body of a reservation
//! confirmation email.
//!
//! Both fields must be found for a [`ReservationRecord`] to exist.
use chrono::{DateTime, Local};
use regex::Regex;
use thiserror::Error;

use super::date::{parse_visit_token, resolve_local};
use super::models::ReservationRecord;

pub const DEFAULT_VENUE_MARKER: &str = "店舗名：";
pub const DEFAULT_VISIT_MARKER: &str = "来店日時：";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("venue marker `{marker}` not found")]
    MissingVenue { marker: String },
    #[error("venue name after `{marker}` is empty")]
    EmptyVenue { marker: String },
    #[error("visit date marker `{marker}` not found")]
    MissingVisitDate { marker: String },
    #[error("visit date is not in the expected format: `{found}`")]
    MalformedVisitDate { found: String },
    #[error("visit date `{normalized}` is invalid: {reason}")]
    InvalidVisitDate { normalized: String, reason: String },
}

/// Locates labelled fields in a message body
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    venue_marker: String,
    visit_marker: String,
    venue_re: Regex,
    visit_re: Regex,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_VENUE_MARKER, DEFAULT_VISIT_MARKER)
    }
}

impl FieldExtractor {
    pub fn new(venue_marker: &str, visit_marker: &str) -> Self {
        // Markers are escaped so both patterns are always valid
        let venue_re = Regex::new(&format!(
            r"{}[\s\u{{3000}}]*([^\r\n]*)",
            regex::escape(venue_marker)
        ))
        .unwrap();
        let visit_re = Regex::new(&format!(
            r"{}[\s\u{{3000}}]*",
            regex::escape(visit_marker)
        ))
        .unwrap();

        Self {
            venue_marker: venue_marker.to_string(),
            visit_marker: visit_marker.to_string(),
            venue_re,
            visit_re,
        }
    }

    /// Extract the venue name: the rest of the line following the
    /// venue marker, trimmed.
    pub fn venue_name(&self, body: &str) -> Result<String, ExtractError> {
        let caps = self
            .venue_re
            .captures(body)
            .ok_or_else(|| ExtractError::MissingVenue {
                marker: self.venue_marker.clone(),
            })?;
        let venue = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if venue.is_empty() {
            return Err(ExtractError::EmptyVenue {
                marker: self.venue_marker.clone(),
            });
        }

        Ok(venue.to_string())
    }

    /// Extract the visit start time. Each occurrence of the marker is
    /// tried in order and the first well-formed token wins.
    pub fn visit_start(&self, body: &str) -> Result<DateTime<Local>, ExtractError> {
        let mut first_err = None;

        for m in self.visit_re.find_iter(body) {
            match parse_visit_token(&body[m.end()..]) {
                Ok(parts) => {
                    tracing::debug!("Visit date normalized to {}", parts.normalized());
                    return resolve_local(&parts);
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        Err(first_err.unwrap_or_else(|| ExtractError::MissingVisitDate {
            marker: self.visit_marker.clone(),
        }))
    }

    /// Extract a complete reservation or report the first field that
    /// could not be extracted.
    pub fn extract(&self, body: &str) -> Result<ReservationRecord, ExtractError> {
        let venue_name = self.venue_name(body)?;
        let visit_start = self.visit_start(body)?;
        Ok(ReservationRecord::new(venue_name, visit_start))
    }
}

/// Extract a reservation using the default markers
pub fn extract_reservation(body: &str) -> Result<ReservationRecord, ExtractError> {
    FieldExtractor::default().extract(body)
}
