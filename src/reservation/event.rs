use anyhow::Result;

use super::models::{CalendarEvent, ReservationRecord};
use super::ports::EventSink;

/// Create the calendar event for a reservation and attach one popup
/// reminder per configured offset. Errors from the calendar are
/// returned as-is with no retry.
pub async fn create_reservation_event<E: EventSink + ?Sized>(
    sink: &E,
    record: &ReservationRecord,
    reminder_minutes: &[u32],
) -> Result<String> {
    let event = CalendarEvent::from_reservation(record, reminder_minutes);
    let event_id = sink.create_event(&event).await?;

    for minutes in &event.reminder_minutes {
        sink.add_popup_reminder(&event_id, *minutes).await?;
    }

    tracing::info!(
        "Created event {} for {} at {}",
        event_id,
        event.title,
        event.start.to_rfc3339()
    );

    Ok(event_id)
}
