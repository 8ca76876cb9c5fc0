use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, GoogleCalendarSummary};
use crate::infrastructure::pagination::pages;
use futures::TryStreamExt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureCalendarResult {
    Found(String),
    Created(String),
}

impl EnsureCalendarResult {
    pub fn calendar_id(&self) -> &str {
        match self {
            Self::Found(id) | Self::Created(id) => id,
        }
    }
}

pub struct CalendarInitializer<C>
where
    C: GoogleCalendarClient,
{
    calendar_client: Arc<C>,
    time_zone: String,
}

impl<C> CalendarInitializer<C>
where
    C: GoogleCalendarClient,
{
    pub fn new(calendar_client: Arc<C>, time_zone: impl Into<String>) -> Self {
        Self {
            calendar_client,
            time_zone: time_zone.into(),
        }
    }

    /// Returns the id of the calendar whose display name is exactly `name`,
    /// creating it when no such calendar exists.
    pub async fn ensure_calendar(
        &self,
        access_token: &str,
        name: &str,
    ) -> Result<EnsureCalendarResult, InfraError> {
        println!("Checking for a calendar named '{name}'...");

        if let Some(existing) = self.find_calendar(access_token, name).await? {
            println!("Found existing '{name}' calendar. (ID: {})", existing.id);
            return Ok(EnsureCalendarResult::Found(existing.id));
        }

        println!("'{name}' calendar not found. Creating it now...");
        let created = self
            .calendar_client
            .create_calendar(access_token, name, Some(&self.time_zone))
            .await
            .map_err(|error| InfraError::Connection(format!("could not create calendar: {error}")))?;

        tracing::info!(calendar_id = %created.id, "created calendar");
        println!("Successfully created '{name}' calendar. (ID: {})", created.id);
        Ok(EnsureCalendarResult::Created(created.id))
    }

    async fn find_calendar(
        &self,
        access_token: &str,
        name: &str,
    ) -> Result<Option<GoogleCalendarSummary>, InfraError> {
        let client = &self.calendar_client;
        let mut listing = std::pin::pin!(pages(move |page_token| async move {
            client.list_calendars(access_token, page_token.as_deref()).await
        }));

        while let Some(page) = listing.try_next().await? {
            if let Some(found) = page.into_iter().find(|calendar| calendar.summary == name) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
