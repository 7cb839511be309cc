//! Google Calendar API client for writing reservation events
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::reservation::models::CalendarEvent;
use crate::reservation::ports::EventSink;

pub const CALENDAR_API_URL: &str = "https://www.googleapis.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderOverride {
    pub method: String,
    pub minutes: u32,
}

impl ReminderOverride {
    pub fn popup(minutes: u32) -> Self {
        Self {
            method: "popup".to_string(),
            minutes,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    #[serde(default)]
    pub overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
}

#[derive(Debug, Serialize)]
pub struct InsertEventRequest {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub reminders: Reminders,
}

impl From<&CalendarEvent> for InsertEventRequest {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            summary: event.title.clone(),
            location: event.location.clone(),
            description: event.description.clone(),
            start: EventDateTime {
                date_time: event.start.to_rfc3339(),
            },
            end: EventDateTime {
                date_time: event.end.to_rfc3339(),
            },
            // Reminders are added one at a time afterwards
            reminders: Reminders::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventResponse {
    pub id: String,
    pub reminders: Option<Reminders>,
}

#[derive(Clone, Debug)]
pub struct GoogleCalendar {
    client: Client,
    access_token: String,
    calendar_id: String,
    base_url: String,
}

impl GoogleCalendar {
    pub fn new(access_token: &str, calendar_id: &str) -> Self {
        Self {
            client: Client::new(),
            access_token: access_token.to_string(),
            calendar_id: calendar_id.to_string(),
            base_url: CALENDAR_API_URL.to_string(),
        }
    }

    /// Point the client at a different host, used for tests
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendar/v3/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    async fn send_json(&self, req: reqwest::RequestBuilder, what: &str) -> Result<EventResponse> {
        let res = req.bearer_auth(&self.access_token).send().await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("{} failed: {} ({})", what, status, text);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn insert_event(&self, event: &InsertEventRequest) -> Result<EventResponse> {
        let req = self.client.post(self.events_url()).json(event);
        self.send_json(req, "Event insert").await
    }

    pub async fn get_event(&self, event_id: &str) -> Result<EventResponse> {
        let url = format!("{}/{}", self.events_url(), event_id);
        self.send_json(self.client.get(url), "Event fetch").await
    }

    pub async fn patch_reminders(
        &self,
        event_id: &str,
        reminders: &Reminders,
    ) -> Result<EventResponse> {
        let url = format!("{}/{}", self.events_url(), event_id);
        let req = self
            .client
            .patch(url)
            .json(&serde_json::json!({ "reminders": reminders }));
        self.send_json(req, "Event patch").await
    }
}

#[async_trait]
impl EventSink for GoogleCalendar {
    async fn create_event(&self, event: &CalendarEvent) -> Result<String> {
        let created = self.insert_event(&InsertEventRequest::from(event)).await?;
        Ok(created.id)
    }

    async fn add_popup_reminder(&self, event_id: &str, minutes_before: u32) -> Result<()> {
        let current = self.get_event(event_id).await?;
        let mut reminders = current.reminders.unwrap_or_default();
        reminders.use_default = false;
        reminders
            .overrides
            .push(ReminderOverride::popup(minutes_before));
        self.patch_reminders(event_id, &reminders).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::extract_reservation;
    use serde_json::json;

    fn event() -> CalendarEvent {
        let record =
            extract_reservation("店舗名：鮨 すずき\n来店日時：2025年07月11日（金）14:00").unwrap();
        CalendarEvent::from_reservation(&record, &[120, 30])
    }

    #[test]
    fn test_insert_event_request() {
        let event = event();
        let req = InsertEventRequest::from(&event);
        let body = serde_json::to_value(&req).unwrap();

        assert_eq!(body["summary"], "鮨 すずき");
        assert_eq!(body["location"], "鮨 すずき");
        assert_eq!(body["reminders"], json!({"useDefault": false, "overrides": []}));
        assert_eq!(body["start"]["dateTime"], event.start.to_rfc3339());
        assert_eq!(body["end"]["dateTime"], event.end.to_rfc3339());
    }

    #[tokio::test]
    async fn test_create_event() {
        let mut server = mockito::Server::new_async().await;
        let insert = server
            .mock("POST", "/calendar/v3/calendars/primary/events")
            .match_header("authorization", "Bearer test_token")
            .match_body(mockito::Matcher::PartialJson(json!({
                "summary": "鮨 すずき",
                "location": "鮨 すずき",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "evt_001"}"#)
            .create_async()
            .await;

        let calendar = GoogleCalendar::new("test_token", "primary").with_base_url(&server.url());
        let id = calendar.create_event(&event()).await.unwrap();

        assert_eq!(id, "evt_001");
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn test_add_popup_reminder_appends_override() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/calendar/v3/calendars/primary/events/evt_001")
            .with_status(200)
            .with_body(
                r#"{"id": "evt_001", "reminders": {"useDefault": false, "overrides": [{"method": "popup", "minutes": 120}]}}"#,
            )
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/calendar/v3/calendars/primary/events/evt_001")
            .match_body(mockito::Matcher::Json(json!({
                "reminders": {
                    "useDefault": false,
                    "overrides": [
                        {"method": "popup", "minutes": 120},
                        {"method": "popup", "minutes": 30}
                    ]
                }
            })))
            .with_status(200)
            .with_body(r#"{"id": "evt_001"}"#)
            .create_async()
            .await;

        let calendar = GoogleCalendar::new("test_token", "primary").with_base_url(&server.url());
        calendar.add_popup_reminder("evt_001", 30).await.unwrap();
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_event_error() {
        let mut server = mockito::Server::new_async().await;
        let _insert = server
            .mock("POST", "/calendar/v3/calendars/primary/events")
            .with_status(403)
            .with_body(r#"{"error": {"message": "Forbidden"}}"#)
            .create_async()
            .await;

        let calendar = GoogleCalendar::new("test_token", "primary").with_base_url(&server.url());
        let err = calendar.create_event(&event()).await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
