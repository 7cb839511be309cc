//! Capabilities the reservation pipeline needs from the outside
//! world. Gmail and Google Calendar implement these in
//! `crate::google`, tests substitute in-memory versions.
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::models::{CalendarEvent, CandidateMessage, MessageQuery};

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Lazily list unread messages matching `query`, one entry per
    /// message of every matching thread. An `Err` item means the
    /// selection itself failed and the stream should not be polled
    /// further.
    fn candidates(&self, query: &MessageQuery) -> BoxStream<'static, Result<CandidateMessage>>;

    /// Fresh read of the unread flag
    async fn is_unread(&self, message_id: &str) -> Result<bool>;

    /// Idempotent, one-way
    async fn mark_read(&self, message_id: &str) -> Result<()>;

    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<()>;
}

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Persist the event without reminders and return its id
    async fn create_event(&self, event: &CalendarEvent) -> Result<String>;

    /// Attach a popup reminder firing `minutes_before` the event start
    async fn add_popup_reminder(&self, event_id: &str, minutes_before: u32) -> Result<()>;
}
