//! In-memory service doubles shared by the application tests.

use crate::application::oauth::{AuthorizationCodeSource, AuthorizationGrant, AuthorizationRequest};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::GoogleCalendarEvent;
use crate::infrastructure::google_calendar_client::{
    DeleteOutcome, GoogleCalendarClient, GoogleCalendarSummary, ListEventsRequest,
};
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest, OAuthTokenResponse,
};
use crate::infrastructure::pagination::Page;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct FakeGoogleCalendarClient {
    pub calendar_pages: Mutex<Vec<Vec<GoogleCalendarSummary>>>,
    pub create_failure: Mutex<Option<String>>,
    pub created_calendars: Mutex<Vec<(String, Option<String>)>>,
    pub list_calendar_calls: AtomicUsize,

    pub event_pages: Mutex<Vec<Vec<GoogleCalendarEvent>>>,
    pub list_events_failure: Mutex<Option<String>>,
    pub list_event_requests: Mutex<Vec<ListEventsRequest>>,

    pub failing_insert_dates: Mutex<Vec<String>>,
    pub inserted: Mutex<Vec<GoogleCalendarEvent>>,

    pub failing_deletes: Mutex<Vec<String>>,
    pub delete_batches: Mutex<Vec<Vec<String>>>,
}

impl FakeGoogleCalendarClient {
    pub fn with_calendar_pages(pages: Vec<Vec<GoogleCalendarSummary>>) -> Self {
        Self {
            calendar_pages: Mutex::new(pages),
            ..Self::default()
        }
    }

    pub fn with_event_pages(pages: Vec<Vec<GoogleCalendarEvent>>) -> Self {
        Self {
            event_pages: Mutex::new(pages),
            ..Self::default()
        }
    }

    pub fn inserted(&self) -> Vec<GoogleCalendarEvent> {
        self.inserted.lock().expect("inserted mutex poisoned").clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.delete_batches
            .lock()
            .expect("delete mutex poisoned")
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_batches.lock().expect("delete mutex poisoned").len()
    }
}

pub(crate) fn calendar(id: &str, summary: &str) -> GoogleCalendarSummary {
    GoogleCalendarSummary {
        id: id.to_string(),
        summary: summary.to_string(),
    }
}

pub(crate) fn event(id: &str, description: Option<&str>) -> GoogleCalendarEvent {
    GoogleCalendarEvent {
        id: Some(id.to_string()),
        summary: Some(format!("event {id}")),
        description: description.map(ToOwned::to_owned),
        status: Some("confirmed".to_string()),
        start: Default::default(),
        end: Default::default(),
    }
}

fn page_at<T: Clone>(pages: &[Vec<T>], page_token: Option<&str>) -> Result<Page<T>, InfraError> {
    let index = match page_token {
        None => 0,
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| InfraError::Connection(format!("unknown page token {token}")))?,
    };
    let items = pages.get(index).cloned().unwrap_or_default();
    let next_page_token = (index + 1 < pages.len()).then(|| (index + 1).to_string());
    Ok(Page {
        items,
        next_page_token,
    })
}

#[async_trait]
impl GoogleCalendarClient for FakeGoogleCalendarClient {
    async fn list_calendars(
        &self,
        _access_token: &str,
        page_token: Option<&str>,
    ) -> Result<Page<GoogleCalendarSummary>, InfraError> {
        self.list_calendar_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.calendar_pages.lock().expect("calendar mutex poisoned");
        page_at(&pages, page_token)
    }

    async fn create_calendar(
        &self,
        _access_token: &str,
        summary: &str,
        time_zone: Option<&str>,
    ) -> Result<GoogleCalendarSummary, InfraError> {
        if let Some(message) = self.create_failure.lock().expect("failure mutex poisoned").clone() {
            return Err(InfraError::Connection(message));
        }

        let mut created = self.created_calendars.lock().expect("created mutex poisoned");
        created.push((summary.to_string(), time_zone.map(ToOwned::to_owned)));
        let calendar = calendar(&format!("created-{}", created.len()), summary);

        let mut pages = self.calendar_pages.lock().expect("calendar mutex poisoned");
        match pages.last_mut() {
            Some(last) => last.push(calendar.clone()),
            None => pages.push(vec![calendar.clone()]),
        }
        Ok(calendar)
    }

    async fn list_events(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        request: &ListEventsRequest,
        page_token: Option<&str>,
    ) -> Result<Page<GoogleCalendarEvent>, InfraError> {
        if let Some(message) = self.list_events_failure.lock().expect("failure mutex poisoned").clone() {
            return Err(InfraError::Connection(message));
        }
        self.list_event_requests
            .lock()
            .expect("request mutex poisoned")
            .push(request.clone());
        let pages = self.event_pages.lock().expect("event mutex poisoned");
        page_at(&pages, page_token)
    }

    async fn insert_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<GoogleCalendarEvent, InfraError> {
        let date = event.start.date.clone().unwrap_or_default();
        if self
            .failing_insert_dates
            .lock()
            .expect("failure mutex poisoned")
            .contains(&date)
        {
            return Err(InfraError::Connection(format!("insert rejected for {date}")));
        }

        let mut inserted = self.inserted.lock().expect("inserted mutex poisoned");
        let mut created = event.clone();
        created.id = Some(format!("evt-{}", inserted.len()));
        inserted.push(created.clone());
        Ok(created)
    }

    async fn batch_delete(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        event_ids: &[String],
    ) -> Result<Vec<DeleteOutcome>, InfraError> {
        self.delete_batches
            .lock()
            .expect("delete mutex poisoned")
            .push(event_ids.to_vec());
        let failing = self.failing_deletes.lock().expect("failure mutex poisoned");
        Ok(event_ids
            .iter()
            .map(|event_id| DeleteOutcome {
                event_id: event_id.clone(),
                failure: failing
                    .contains(event_id)
                    .then(|| "404 Not Found".to_string()),
            })
            .collect())
    }
}

/// Token endpoint that refuses every grant; used where a cached token must suffice.
#[derive(Debug, Default)]
pub(crate) struct RejectingOAuthClient;

#[async_trait]
impl OAuthHttpClient for RejectingOAuthClient {
    async fn exchange_authorization_code(
        &self,
        _request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        Err(InfraError::OAuth("exchange not expected".to_string()))
    }

    async fn refresh_access_token(
        &self,
        _request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        Err(InfraError::OAuth("refresh not expected".to_string()))
    }
}

#[derive(Debug, Default)]
pub(crate) struct RejectingAuthorizer;

#[async_trait]
impl AuthorizationCodeSource for RejectingAuthorizer {
    async fn obtain_code(
        &self,
        _request: &AuthorizationRequest,
    ) -> Result<AuthorizationGrant, InfraError> {
        Err(InfraError::OAuth("interactive authorization not expected".to_string()))
    }
}
