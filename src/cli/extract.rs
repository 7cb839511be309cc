use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::core::{DEFAULT_REMINDER_MINUTES, parse_reminder_minutes};
use crate::reservation::extract::{DEFAULT_VENUE_MARKER, DEFAULT_VISIT_MARKER};
use crate::reservation::{CalendarEvent, FieldExtractor};

/// Dry run the extractor against a saved email body. Marker and
/// reminder settings come from the environment when present.
pub fn run(file: &Path) -> Result<()> {
    let body = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let venue_marker =
        std::env::var("RESCAL_VENUE_MARKER").unwrap_or(DEFAULT_VENUE_MARKER.to_string());
    let visit_marker =
        std::env::var("RESCAL_VISIT_MARKER").unwrap_or(DEFAULT_VISIT_MARKER.to_string());
    let extractor = FieldExtractor::new(&venue_marker, &visit_marker);
    let reminders = match std::env::var("RESCAL_REMINDER_MINUTES") {
        Ok(value) => parse_reminder_minutes(&value)?,
        Err(_) => DEFAULT_REMINDER_MINUTES.to_vec(),
    };

    match extractor.extract(&body) {
        Ok(record) => {
            let event = CalendarEvent::from_reservation(&record, &reminders);
            println!("Title:     {}", event.title);
            println!("Location:  {}", event.location);
            println!("Start:     {}", event.start.to_rfc3339());
            println!("End:       {}", event.end.to_rfc3339());
            println!("Reminders: {:?} minutes before", event.reminder_minutes);
        }
        Err(e) => {
            println!("Not a complete reservation, this message would be skipped: {}", e);
        }
    }

    Ok(())
}
