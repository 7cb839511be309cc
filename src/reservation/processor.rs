//! Drives each candidate message through extraction, event creation
//! and the unread -> read transition.
//!
//! The read flag is the only thing marking a message as handled.
//! A message is marked read after its event was created, or when its
//! body can't be parsed. Any failure leaves it unread so the next run
//! picks it up again.
use anyhow::{Context, Result};
use futures::StreamExt;

use super::event::create_reservation_event;
use super::extract::FieldExtractor;
use super::models::{CandidateMessage, Outcome, RunSummary};
use super::ports::{EventSink, MessageSource};
use crate::core::ReservationConfig;

pub struct ReservationProcessor<M, E> {
    source: M,
    sink: E,
    config: ReservationConfig,
    extractor: FieldExtractor,
}

impl<M: MessageSource, E: EventSink> ReservationProcessor<M, E> {
    pub fn new(source: M, sink: E, config: ReservationConfig) -> Self {
        let extractor = config.extractor();
        Self {
            source,
            sink,
            config,
            extractor,
        }
    }

    pub fn source(&self) -> &M {
        &self.source
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    /// Process every candidate message once. Returns an error only if
    /// selecting messages fails, failures for a single message are
    /// logged and counted in the summary instead.
    pub async fn run(&self) -> Result<RunSummary> {
        let query = self.config.query();
        tracing::info!("Selecting messages with query: {}", query.to_gmail_query());

        let mut summary = RunSummary::default();
        let mut candidates = self.source.candidates(&query);

        while let Some(candidate) = candidates.next().await {
            let message = candidate.context("Failed to select reservation messages")?;
            let outcome = self.process_message(&message).await;
            tracing::debug!("Message {} finished as {:?}", message.id, outcome);
            summary.record(outcome);
        }

        tracing::info!(
            "Processed {} messages: {} completed, {} skipped, {} pending retry, {} already read",
            summary.total(),
            summary.completed,
            summary.skipped,
            summary.retry_pending,
            summary.already_read
        );

        Ok(summary)
    }

    /// Evaluate a single message. Never fails, the outcome says what
    /// happened to the read flag.
    pub async fn process_message(&self, message: &CandidateMessage) -> Outcome {
        // Read messages of a matching thread come through the selection too
        if !message.unread {
            return Outcome::AlreadyRead;
        }

        // The flag may have changed since the message was listed
        match self.source.is_unread(&message.id).await {
            Ok(true) => {}
            Ok(false) => return Outcome::AlreadyRead,
            Err(e) => {
                tracing::error!(
                    "Failed to check unread status of \"{}\" ({}): {:#}",
                    message.subject,
                    message.id,
                    e
                );
                return Outcome::RetryPending;
            }
        }

        let record = match self.extractor.extract(&message.body) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    "Skipping \"{}\" ({}): {}",
                    message.subject,
                    message.id,
                    e
                );
                return self.skip(message).await;
            }
        };

        let event_id = match create_reservation_event(
            &self.sink,
            &record,
            &self.config.reminder_minutes_before,
        )
        .await
        {
            Ok(event_id) => event_id,
            Err(e) => {
                tracing::error!(
                    "Failed to create event for \"{}\" ({}), will retry next run: {:#}",
                    message.subject,
                    message.id,
                    e
                );
                return Outcome::RetryPending;
            }
        };

        match self.source.mark_read(&message.id).await {
            Ok(()) => Outcome::Completed,
            Err(e) => {
                tracing::error!(
                    "Created event {} for \"{}\" but failed to mark {} read: {:#}",
                    event_id,
                    message.subject,
                    message.id,
                    e
                );
                Outcome::RetryPending
            }
        }
    }

    async fn skip(&self, message: &CandidateMessage) -> Outcome {
        if let Some(label_id) = &self.config.review_label_id
            && let Err(e) = self.source.add_label(&message.id, label_id).await
        {
            tracing::error!(
                "Failed to label {} with {}, leaving unread: {:#}",
                message.id,
                label_id,
                e
            );
            return Outcome::RetryPending;
        }

        match self.source.mark_read(&message.id).await {
            Ok(()) => Outcome::SkippedMalformed,
            Err(e) => {
                tracing::error!("Failed to mark skipped message {} read: {:#}", message.id, e);
                Outcome::RetryPending
            }
        }
    }
}
