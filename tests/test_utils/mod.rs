//! In-memory mail and calendar services for integration tests
#![allow(dead_code)]
use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use rescal::core::ReservationConfig;
use rescal::reservation::{CalendarEvent, CandidateMessage, EventSink, MessageQuery, MessageSource};

pub const SENDER: &str = "noreply@reserve.example.jp";
pub const SUBJECT: &str = "ご予約確定のお知らせ";

pub fn test_config() -> ReservationConfig {
    ReservationConfig::new(SENDER, SUBJECT)
}

/// A reservation body with both fields present
pub fn reservation_body(venue: &str, visit: &str) -> String {
    format!(
        "山田 太郎 様\n\nこの度はご予約いただき誠にありがとうございます。\n\n店舗名：{}\n来店日時：{}\n人数：2名\n\n※キャンセルの際はお早めにご連絡ください。\n",
        venue, visit
    )
}

#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub id: String,
    pub thread_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub unread: bool,
    pub labels: Vec<String>,
}

impl FakeMessage {
    /// An unread message from the configured sender and subject
    pub fn reservation(id: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            thread_id: format!("thr_{}", id),
            sender: SENDER.to_string(),
            subject: SUBJECT.to_string(),
            body: body.to_string(),
            unread: true,
            labels: vec![],
        }
    }

    pub fn in_thread(mut self, thread_id: &str) -> Self {
        self.thread_id = thread_id.to_string();
        self
    }

    pub fn read(mut self) -> Self {
        self.unread = false;
        self
    }

    fn matches(&self, query: &MessageQuery) -> bool {
        self.unread && self.sender == query.sender && self.subject == query.subject
    }
}

#[derive(Default)]
pub struct InMemoryMailbox {
    pub messages: Mutex<Vec<FakeMessage>>,
    /// Selection fails after yielding this many messages
    pub fail_selection_after: Option<usize>,
    /// Messages another process marks read right after selection
    pub read_elsewhere: HashSet<String>,
    pub fail_mark_read: bool,
    pub fail_add_label: bool,
}

impl InMemoryMailbox {
    pub fn new(messages: Vec<FakeMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Default::default()
        }
    }

    pub fn message(&self, id: &str) -> FakeMessage {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .expect("No such message")
    }

    pub fn is_message_unread(&self, id: &str) -> bool {
        self.message(id).unread
    }
}

#[async_trait]
impl MessageSource for InMemoryMailbox {
    fn candidates(&self, query: &MessageQuery) -> BoxStream<'static, Result<CandidateMessage>> {
        let mut messages = self.messages.lock().unwrap();

        // Whole threads match when any of their messages match
        let matching_threads: Vec<String> = messages
            .iter()
            .filter(|m| m.matches(query))
            .map(|m| m.thread_id.clone())
            .fold(vec![], |mut acc, id| {
                if !acc.contains(&id) {
                    acc.push(id);
                }
                acc
            });

        let mut selected: Vec<Result<CandidateMessage>> = vec![];
        for thread_id in &matching_threads {
            for m in messages.iter().filter(|m| &m.thread_id == thread_id) {
                selected.push(Ok(CandidateMessage {
                    id: m.id.clone(),
                    thread_id: m.thread_id.clone(),
                    unread: m.unread,
                    subject: m.subject.clone(),
                    body: m.body.clone(),
                }));
            }
        }

        for m in messages.iter_mut() {
            if self.read_elsewhere.contains(&m.id) {
                m.unread = false;
            }
        }

        if let Some(n) = self.fail_selection_after {
            selected.truncate(n);
            selected.push(Err(anyhow!("Mail service unavailable")));
        }

        stream::iter(selected).boxed()
    }

    async fn is_unread(&self, message_id: &str) -> Result<bool> {
        let messages = self.messages.lock().unwrap();
        messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.unread)
            .ok_or(anyhow!("No such message {}", message_id))
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        if self.fail_mark_read {
            return Err(anyhow!("Mark read failed"));
        }
        let mut messages = self.messages.lock().unwrap();
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(anyhow!("No such message {}", message_id))?;
        message.unread = false;
        Ok(())
    }

    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<()> {
        if self.fail_add_label {
            return Err(anyhow!("Label failed"));
        }
        let mut messages = self.messages.lock().unwrap();
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(anyhow!("No such message {}", message_id))?;
        message.labels.push(label_id.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: String,
    pub event: CalendarEvent,
    pub reminders: Vec<u32>,
}

#[derive(Default)]
pub struct InMemoryCalendar {
    pub events: Mutex<Vec<StoredEvent>>,
    pub fail_create: Mutex<bool>,
    pub fail_reminder: bool,
}

impl InMemoryCalendar {
    pub fn failing() -> Self {
        Self {
            fail_create: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    pub fn events(&self) -> Vec<StoredEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for InMemoryCalendar {
    async fn create_event(&self, event: &CalendarEvent) -> Result<String> {
        if *self.fail_create.lock().unwrap() {
            return Err(anyhow!("Calendar service rejected the event"));
        }
        let mut events = self.events.lock().unwrap();
        let id = format!("evt_{}", events.len() + 1);
        events.push(StoredEvent {
            id: id.clone(),
            event: event.clone(),
            reminders: vec![],
        });
        Ok(id)
    }

    async fn add_popup_reminder(&self, event_id: &str, minutes_before: u32) -> Result<()> {
        if self.fail_reminder {
            return Err(anyhow!("Reminder rejected"));
        }
        let mut events = self.events.lock().unwrap();
        let stored = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(anyhow!("No such event {}", event_id))?;
        stored.reminders.push(minutes_before);
        Ok(())
    }
}
