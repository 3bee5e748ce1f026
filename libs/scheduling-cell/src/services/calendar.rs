use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{BusyWindow, SchedulingError};

/// Google Calendar v3 REST client for the single business calendar.
pub struct CalendarClient {
    client: Client,
    base_url: String,
    calendar_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct EventResource {
    id: String,
    #[serde(default)]
    start: Option<EventTime>,
    #[serde(default)]
    end: Option<EventTime>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<EventResource>,
}

impl CalendarClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build http client");

        Self {
            client,
            base_url: config.calendar_api_url.clone(),
            calendar_id: config.calendar_id.clone(),
            access_token: config.calendar_access_token.clone(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// Create an event and return its id.
    pub async fn create_event(
        &self,
        summary: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, SchedulingError> {
        let body = json!({
            "summary": summary,
            "start": { "dateTime": start.to_rfc3339() },
            "end": { "dateTime": end.to_rfc3339() },
        });

        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SchedulingError::Calendar(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("Calendar event creation failed ({}): {}", status, text);
            return Err(SchedulingError::Calendar(format!(
                "event creation failed ({}): {}",
                status, text
            )));
        }

        let event: EventResource = response
            .json()
            .await
            .map_err(|e| SchedulingError::Calendar(e.to_string()))?;

        debug!("Created calendar event {}", event.id);
        Ok(event.id)
    }

    /// Delete an event. A 404 or 410 means it is already gone, which callers
    /// treat as success.
    pub async fn delete_event(&self, event_id: &str) -> Result<(), SchedulingError> {
        let url = format!("{}/{}", self.events_url(), event_id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SchedulingError::Calendar(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 || status.as_u16() == 410 {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(SchedulingError::Calendar(format!(
            "event deletion failed ({}): {}",
            status, text
        )))
    }

    /// List busy windows overlapping `[time_min, time_max)`. Cancelled events
    /// do not occupy their slot.
    pub async fn busy_windows(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyWindow>, SchedulingError> {
        let url = format!(
            "{}?timeMin={}&timeMax={}&singleEvents=true&orderBy=startTime",
            self.events_url(),
            urlencoding::encode(&time_min.to_rfc3339()),
            urlencoding::encode(&time_max.to_rfc3339()),
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SchedulingError::Calendar(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SchedulingError::Calendar(format!(
                "event listing failed ({}): {}",
                status, text
            )));
        }

        let list: EventList = response
            .json()
            .await
            .map_err(|e| SchedulingError::Calendar(e.to_string()))?;

        let windows = list
            .items
            .into_iter()
            .filter(|e| e.status.as_deref() != Some("cancelled"))
            .filter_map(|e| {
                let start = e.start.and_then(|t| t.date_time)?;
                let end = e.end.and_then(|t| t.date_time)?;
                Some(BusyWindow { start, end })
            })
            .collect();

        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared_utils::test_utils::TestConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn busy_windows_skips_cancelled_and_all_day_events() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {
                        "id": "evt-1",
                        "start": { "dateTime": "2026-01-19T11:00:00Z" },
                        "end": { "dateTime": "2026-01-19T11:50:00Z" }
                    },
                    {
                        "id": "evt-2",
                        "status": "cancelled",
                        "start": { "dateTime": "2026-01-19T12:00:00Z" },
                        "end": { "dateTime": "2026-01-19T12:50:00Z" }
                    },
                    {
                        "id": "evt-3",
                        "start": { "date": "2026-01-19" },
                        "end": { "date": "2026-01-20" }
                    }
                ]
            })))
            .mount(&mock_server)
            .await;

        let config = TestConfig::all_on(&mock_server.uri()).to_app_config();
        let client = CalendarClient::new(&config);

        let min = Utc.with_ymd_and_hms(2026, 1, 19, 0, 0, 0).unwrap();
        let max = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
        let windows = client.busy_windows(min, max).await.unwrap();

        assert_eq!(windows.len(), 1);
        assert_eq!(
            windows[0].start,
            Utc.with_ymd_and_hms(2026, 1, 19, 11, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn delete_treats_missing_event_as_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/evt-gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let config = TestConfig::all_on(&mock_server.uri()).to_app_config();
        let client = CalendarClient::new(&config);

        client.delete_event("evt-gone").await.unwrap();
    }
}
