use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

/// Fixed length of every reservation event
pub const EVENT_DURATION_MINUTES: i64 = 60;

pub const EVENT_DESCRIPTION: &str = "Created automatically from a reservation confirmation email.";

/// An inbox message that matched the selection query at the time it
/// was listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMessage {
    pub id: String,
    pub thread_id: String,
    pub unread: bool,
    pub subject: String,
    pub body: String,
}

/// Sender and subject a candidate message must match. Only unread
/// messages are ever selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub sender: String,
    pub subject: String,
}

impl MessageQuery {
    pub fn new(sender: &str, subject: &str) -> Self {
        Self {
            sender: sender.to_string(),
            subject: subject.to_string(),
        }
    }

    /// Render as a Gmail search string. Gmail matches `from:` and
    /// `subject:` loosely so results still go through `matches`.
    pub fn to_gmail_query(&self) -> String {
        format!(
            "from:{} subject:\"{}\" is:unread",
            self.sender,
            self.subject.replace('"', "")
        )
    }

    /// Exact match against a `From` header and a subject
    pub fn matches(&self, from: &str, subject: &str) -> bool {
        sender_address(from).eq_ignore_ascii_case(self.sender.trim())
            && subject.trim() == self.subject.trim()
    }
}

/// The bare address of a `From` header such as `Name <addr@example.jp>`
pub fn sender_address(from: &str) -> &str {
    match (from.rfind('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => from[start + 1..end].trim(),
        _ => from.trim(),
    }
}

/// A fully extracted reservation. Only the extractor constructs these
/// so a partially filled record can't exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRecord {
    venue_name: String,
    visit_start: DateTime<Local>,
}

impl ReservationRecord {
    pub(crate) fn new(venue_name: String, visit_start: DateTime<Local>) -> Self {
        debug_assert!(!venue_name.is_empty());
        Self {
            venue_name,
            visit_start,
        }
    }

    pub fn venue_name(&self) -> &str {
        &self.venue_name
    }

    pub fn visit_start(&self) -> DateTime<Local> {
        self.visit_start
    }
}

/// Event to be written to the calendar for a reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub title: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub location: String,
    pub description: String,
    pub reminder_minutes: Vec<u32>,
}

impl CalendarEvent {
    pub fn from_reservation(record: &ReservationRecord, reminder_minutes: &[u32]) -> Self {
        let start = record.visit_start();
        Self {
            title: record.venue_name().to_string(),
            start,
            end: start + Duration::minutes(EVENT_DURATION_MINUTES),
            location: record.venue_name().to_string(),
            description: EVENT_DESCRIPTION.to_string(),
            reminder_minutes: reminder_minutes.to_vec(),
        }
    }
}

/// What happened to a single candidate message during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Event created and message marked read
    Completed,
    /// Fields could not be extracted, message marked read without an event
    SkippedMalformed,
    /// Something failed, message left unread for the next run
    RetryPending,
    /// Message was already read when re-checked
    AlreadyRead,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub skipped: usize,
    pub retry_pending: usize,
    pub already_read: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::SkippedMalformed => self.skipped += 1,
            Outcome::RetryPending => self.retry_pending += 1,
            Outcome::AlreadyRead => self.already_read += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.retry_pending + self.already_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_matches_exact_sender_and_subject() {
        let query = MessageQuery::new("noreply@reserve.example.jp", "ご予約確定のお知らせ");

        assert!(query.matches("noreply@reserve.example.jp", "ご予約確定のお知らせ"));
        assert!(query.matches(
            "\"予約サービス\" <NoReply@reserve.example.jp>",
            " ご予約確定のお知らせ "
        ));
        assert!(!query.matches("noreply@reserve.example.jp", "Re: ご予約確定のお知らせ"));
        assert!(!query.matches(
            "noreply@reserve.example.jp",
            "【変更】ご予約確定のお知らせ"
        ));
        assert!(!query.matches("me@example.com", "ご予約確定のお知らせ"));
        assert!(!query.matches(
            "Someone <noreply@reserve.example.jp.evil.example>",
            "ご予約確定のお知らせ"
        ));
    }

    #[test]
    fn test_sender_address() {
        assert_eq!(sender_address("Shop <shop@example.jp>"), "shop@example.jp");
        assert_eq!(sender_address("  shop@example.jp "), "shop@example.jp");
        assert_eq!(sender_address(""), "");
    }
}
