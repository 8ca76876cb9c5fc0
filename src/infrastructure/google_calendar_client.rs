use crate::infrastructure::batch::{decode_batch, encode_batch, BatchRequestPart};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::GoogleCalendarEvent;
use crate::infrastructure::pagination::Page;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

const CALENDAR_LIST_ENDPOINT: &str = "https://www.googleapis.com/calendar/v3/users/me/calendarList";
const CALENDAR_CREATE_ENDPOINT: &str = "https://www.googleapis.com/calendar/v3/calendars";
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const BATCH_ENDPOINT: &str = "https://www.googleapis.com/batch/calendar/v3";
const MAX_BATCH_SIZE: usize = 1000;

static NEXT_BOUNDARY: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCalendarSummary {
    pub id: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEventsRequest {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

/// Result of one deletion inside a batch; `failure` holds the reason when the
/// service refused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub event_id: String,
    pub failure: Option<String>,
}

#[async_trait]
pub trait GoogleCalendarClient: Send + Sync {
    async fn list_calendars(
        &self,
        access_token: &str,
        page_token: Option<&str>,
    ) -> Result<Page<GoogleCalendarSummary>, InfraError>;

    async fn create_calendar(
        &self,
        access_token: &str,
        summary: &str,
        time_zone: Option<&str>,
    ) -> Result<GoogleCalendarSummary, InfraError>;

    /// One page of single-occurrence events starting in `[time_min, time_max)`,
    /// ordered by start time.
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &ListEventsRequest,
        page_token: Option<&str>,
    ) -> Result<Page<GoogleCalendarEvent>, InfraError>;

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<GoogleCalendarEvent, InfraError>;

    async fn batch_delete(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_ids: &[String],
    ) -> Result<Vec<DeleteOutcome>, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!("google calendar api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Connection(message)
    }

    fn events_endpoint(calendar_id: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(CALENDAR_API_BASE).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid calendar api base url: {error}"))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("calendar api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("calendars");
            segments.push(calendar_id);
            segments.push("events");
        }
        Ok(url)
    }

    fn event_endpoint(calendar_id: &str, event_id: &str) -> Result<Url, InfraError> {
        let mut url = Self::events_endpoint(calendar_id)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("calendar events URL cannot be a base".to_string())
            })?;
            segments.push(event_id);
        }
        Ok(url)
    }

    fn next_boundary() -> String {
        let sequence = NEXT_BOUNDARY.fetch_add(1, Ordering::Relaxed);
        format!("batch_workout_planner_{}_{sequence}", Utc::now().timestamp_micros())
    }

    async fn read_body(
        response: reqwest::Response,
        action: &str,
    ) -> Result<String, InfraError> {
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Connection(format!("failed reading {action} response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(body)
    }

    async fn delete_chunk(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_ids: &[String],
    ) -> Result<Vec<DeleteOutcome>, InfraError> {
        let parts = event_ids
            .iter()
            .map(|event_id| -> Result<BatchRequestPart, InfraError> {
                Ok(BatchRequestPart {
                    method: "DELETE",
                    path: Self::event_endpoint(calendar_id, event_id)?.path().to_string(),
                })
            })
            .collect::<Result<Vec<_>, InfraError>>()?;
        let boundary = Self::next_boundary();

        let response = self
            .client
            .post(BATCH_ENDPOINT)
            .bearer_auth(access_token)
            .header(CONTENT_TYPE, format!("multipart/mixed; boundary={boundary}"))
            .body(encode_batch(&boundary, &parts))
            .send()
            .await
            .map_err(|error| InfraError::Connection(format!("network error while deleting events: {error}")))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = Self::read_body(response, "batch delete").await?;

        let mut outcomes: Vec<DeleteOutcome> = event_ids
            .iter()
            .map(|event_id| DeleteOutcome {
                event_id: event_id.clone(),
                failure: Some("no response for this item in batch".to_string()),
            })
            .collect();
        for part in decode_batch(&content_type, &body)? {
            let Some(outcome) = outcomes.get_mut(part.index) else {
                tracing::debug!(index = part.index, "ignoring batch response part with unknown index");
                continue;
            };
            outcome.failure = if part.is_success() {
                None
            } else if part.body.is_empty() {
                Some(format!("http {}", part.status))
            } else {
                Some(format!("http {}; body={}", part.status, part.body))
            };
        }
        Ok(outcomes)
    }
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListResponse {
    items: Option<Vec<CalendarListItem>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListItem {
    id: String,
    summary: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct CreateCalendarRequest<'a> {
    summary: &'a str,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    time_zone: Option<&'a str>,
}

#[derive(Debug, serde::Deserialize)]
struct CalendarResourceResponse {
    id: Option<String>,
    summary: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<GoogleCalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl GoogleCalendarClient for ReqwestGoogleCalendarClient {
    async fn list_calendars(
        &self,
        access_token: &str,
        page_token: Option<&str>,
    ) -> Result<Page<GoogleCalendarSummary>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let mut request = self
            .client
            .get(CALENDAR_LIST_ENDPOINT)
            .query(&[("maxResults", "250")])
            .bearer_auth(access_token);
        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Connection(format!("network error while listing calendars: {error}")))?;
        let body = Self::read_body(response, "calendar list").await?;

        let parsed: CalendarListResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Connection(format!("invalid calendar list payload: {error}; body={body}"))
        })?;

        let items = parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let id = item.id.trim();
                if id.is_empty() {
                    return None;
                }
                Some(GoogleCalendarSummary {
                    id: id.to_string(),
                    summary: item.summary.unwrap_or_default(),
                })
            })
            .collect();
        Ok(Page {
            items,
            next_page_token: parsed.next_page_token,
        })
    }

    async fn create_calendar(
        &self,
        access_token: &str,
        summary: &str,
        time_zone: Option<&str>,
    ) -> Result<GoogleCalendarSummary, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(summary, "calendar summary")?;

        let request = CreateCalendarRequest {
            summary,
            time_zone: time_zone.map(str::trim).filter(|value| !value.is_empty()),
        };

        let response = self
            .client
            .post(CALENDAR_CREATE_ENDPOINT)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|error| InfraError::Connection(format!("network error while creating calendar: {error}")))?;
        let body = Self::read_body(response, "calendar create").await?;

        let parsed: CalendarResourceResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Connection(format!("invalid calendar create payload: {error}; body={body}"))
        })?;

        let id = parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| InfraError::Connection("calendar create response did not include id".to_string()))?;

        Ok(GoogleCalendarSummary {
            id,
            summary: parsed.summary.unwrap_or_else(|| summary.to_string()),
        })
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &ListEventsRequest,
        page_token: Option<&str>,
    ) -> Result<Page<GoogleCalendarEvent>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = Self::events_endpoint(calendar_id)?;
        let mut req = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .query(&[
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", "2500"),
            ])
            .query(&[
                ("timeMin", request.time_min.to_rfc3339()),
                ("timeMax", request.time_max.to_rfc3339()),
            ]);
        if let Some(page_token) = page_token {
            req = req.query(&[("pageToken", page_token)]);
        }

        let response = req.send().await.map_err(|error| {
            InfraError::Connection(format!("network error while listing calendar events: {error}"))
        })?;
        let body = Self::read_body(response, "events list").await?;

        let parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Connection(format!("invalid events list payload: {error}; body={body}"))
        })?;
        Ok(Page {
            items: parsed.items.unwrap_or_default(),
            next_page_token: parsed.next_page_token,
        })
    }

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<GoogleCalendarEvent, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = Self::events_endpoint(calendar_id)?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| InfraError::Connection(format!("network error while creating event: {error}")))?;
        let body = Self::read_body(response, "event create").await?;

        serde_json::from_str(&body).map_err(|error| {
            InfraError::Connection(format!("invalid event create payload: {error}; body={body}"))
        })
    }

    async fn batch_delete(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_ids: &[String],
    ) -> Result<Vec<DeleteOutcome>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        delete_in_chunks(event_ids, |chunk| {
            self.delete_chunk(access_token, calendar_id, chunk)
        })
        .await
    }
}

/// Sends `event_ids` in batches of at most `MAX_BATCH_SIZE`, one after
/// another. Outcomes keep the input order; a failed batch request aborts.
async fn delete_in_chunks<'a, F, Fut>(
    event_ids: &'a [String],
    mut delete_chunk: F,
) -> Result<Vec<DeleteOutcome>, InfraError>
where
    F: FnMut(&'a [String]) -> Fut,
    Fut: Future<Output = Result<Vec<DeleteOutcome>, InfraError>>,
{
    let mut outcomes = Vec::with_capacity(event_ids.len());
    for chunk in event_ids.chunks(MAX_BATCH_SIZE) {
        outcomes.extend(delete_chunk(chunk).await?);
    }
    Ok(outcomes)
}
