use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{is_tagged, GoogleCalendarEvent};
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, ListEventsRequest};
use crate::infrastructure::pagination::pages;
use chrono::{Days, NaiveDate, NaiveTime};
use futures::TryStreamExt;
use inquire::error::InquireError;
use inquire::Text;
use std::io::{BufRead, Write};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    /// Only events carrying the planner tag.
    Tagged,
    /// Every event in the window.
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClearReport {
    pub found: usize,
    pub deleted: usize,
    pub failed: usize,
}

pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> Result<bool, InfraError>;
}

/// Reads the answer from the terminal. Interrupting the prompt counts as "no".
/// Without a terminal (piped stdin) the answer is read as a plain line.
#[derive(Debug, Default)]
pub struct TerminalConfirmation;

impl Confirmation for TerminalConfirmation {
    fn confirm(&self, prompt: &str) -> Result<bool, InfraError> {
        match Text::new(prompt).prompt() {
            Ok(answer) => Ok(is_confirmed(&answer)),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
            Err(InquireError::NotTTY) => confirm_from_reader(prompt, &mut std::io::stdin().lock()),
            Err(InquireError::IO(error)) => Err(InfraError::Io(error)),
            Err(error) => Err(InfraError::Io(std::io::Error::other(error.to_string()))),
        }
    }
}

pub fn is_confirmed(answer: &str) -> bool {
    answer.eq_ignore_ascii_case("yes")
}

/// Prints `prompt` and reads one answer line from `reader`. End of input is "no".
pub fn confirm_from_reader<R>(prompt: &str, reader: &mut R) -> Result<bool, InfraError>
where
    R: BufRead + ?Sized,
{
    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    reader.read_line(&mut answer)?;
    Ok(is_confirmed(answer.trim_end_matches(['\r', '\n'])))
}

pub fn confirm_force_clear<F>(confirmation: &F, calendar_name: &str) -> Result<bool, InfraError>
where
    F: Confirmation + ?Sized,
{
    confirmation.confirm(&format!(
        "Are you sure you want to delete ALL events from the '{calendar_name}' calendar? \
         This cannot be undone. (yes/no): "
    ))
}

/// Window from midnight UTC of `start` spanning the plan plus `margin_weeks`,
/// so events scheduled from a later start date are still covered.
pub fn clear_window(
    start: NaiveDate,
    total_weeks: u32,
    margin_weeks: u32,
) -> Result<ListEventsRequest, InfraError> {
    let span_days = (u64::from(total_weeks) + u64::from(margin_weeks)) * 7;
    let end = start
        .checked_add_days(Days::new(span_days))
        .ok_or_else(|| InfraError::InvalidDate(format!("{start} plus {span_days} days")))?;
    Ok(ListEventsRequest {
        time_min: start.and_time(NaiveTime::MIN).and_utc(),
        time_max: end.and_time(NaiveTime::MIN).and_utc(),
    })
}

pub struct EventClearer<C>
where
    C: GoogleCalendarClient,
{
    calendar_client: Arc<C>,
    event_tag: String,
}

impl<C> EventClearer<C>
where
    C: GoogleCalendarClient,
{
    pub fn new(calendar_client: Arc<C>, event_tag: impl Into<String>) -> Self {
        Self {
            calendar_client,
            event_tag: event_tag.into(),
        }
    }

    pub async fn clear(
        &self,
        access_token: &str,
        calendar_id: &str,
        calendar_name: &str,
        window: &ListEventsRequest,
        mode: ClearMode,
    ) -> Result<ClearReport, InfraError> {
        match mode {
            ClearMode::Force => {
                println!("\n--- FORCE CLEARING ALL events from '{calendar_name}' calendar ---")
            }
            ClearMode::Tagged => {
                println!("\n--- Clearing tagged workout events from '{calendar_name}' calendar ---")
            }
        }

        let event_ids = self
            .matching_event_ids(access_token, calendar_id, window, mode)
            .await?;
        let mut report = ClearReport {
            found: event_ids.len(),
            ..ClearReport::default()
        };

        if event_ids.is_empty() {
            println!("No matching events found to clear in the specified range.");
            return Ok(report);
        }

        println!("Found {} events to delete. Deleting now...", event_ids.len());
        let outcomes = self
            .calendar_client
            .batch_delete(access_token, calendar_id, &event_ids)
            .await?;

        for outcome in outcomes {
            match outcome.failure {
                None => report.deleted += 1,
                Some(reason) => {
                    report.failed += 1;
                    tracing::warn!(%calendar_id, event_id = %outcome.event_id, %reason, "failed to delete event");
                    println!("  - Failed to delete event {}: {reason}", outcome.event_id);
                }
            }
        }

        println!("Cleanup complete.");
        Ok(report)
    }

    async fn matching_event_ids(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &ListEventsRequest,
        mode: ClearMode,
    ) -> Result<Vec<String>, InfraError> {
        let client = &self.calendar_client;
        let listing = pages(move |page_token| async move {
            client
                .list_events(access_token, calendar_id, window, page_token.as_deref())
                .await
        });

        let listed: Vec<Vec<GoogleCalendarEvent>> = listing.try_collect().await?;

        Ok(listed
            .into_iter()
            .flatten()
            .filter(|event| mode == ClearMode::Force || is_tagged(event, &self.event_tag))
            .filter_map(|event| event.id)
            .collect())
    }
}
