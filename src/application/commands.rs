use crate::application::calendar_setup::CalendarInitializer;
use crate::application::clearer::{
    clear_window, confirm_force_clear, ClearMode, ClearReport, Confirmation, EventClearer,
    TerminalConfirmation,
};
use crate::application::oauth::{authenticate, AuthorizationCodeSource, LoopbackAuthorizer};
use crate::application::plan_loader::load_plan;
use crate::application::scheduler::{ScheduleReport, WorkoutScheduler};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::credential_store::{CredentialStore, FileCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::{
    GoogleCalendarClient, ReqwestGoogleCalendarClient,
};
use crate::infrastructure::oauth_client::{OAuthHttpClient, ReqwestOAuthClient};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    Cancelled,
    Cleared(ClearReport),
}

/// Everything a command needs to reach the calendar service.
pub struct AppState<C, S, O>
where
    C: GoogleCalendarClient,
    S: CredentialStore,
    O: OAuthHttpClient,
{
    config: AppConfig,
    calendar_client: Arc<C>,
    credential_store: Arc<S>,
    oauth_client: Arc<O>,
    authorizer: Box<dyn AuthorizationCodeSource>,
    confirmation: Box<dyn Confirmation>,
}

impl AppState<ReqwestGoogleCalendarClient, FileCredentialStore, ReqwestOAuthClient> {
    pub fn new(config: AppConfig) -> Self {
        let credential_store = Arc::new(FileCredentialStore::new(&config.token_file));
        Self::with_parts(
            config,
            Arc::new(ReqwestGoogleCalendarClient::new()),
            credential_store,
            Arc::new(ReqwestOAuthClient::new()),
            Box::new(LoopbackAuthorizer),
            Box::new(TerminalConfirmation),
        )
    }
}

impl<C, S, O> AppState<C, S, O>
where
    C: GoogleCalendarClient,
    S: CredentialStore,
    O: OAuthHttpClient,
{
    pub fn with_parts(
        config: AppConfig,
        calendar_client: Arc<C>,
        credential_store: Arc<S>,
        oauth_client: Arc<O>,
        authorizer: Box<dyn AuthorizationCodeSource>,
        confirmation: Box<dyn Confirmation>,
    ) -> Self {
        Self {
            config,
            calendar_client,
            credential_store,
            oauth_client,
            authorizer,
            confirmation,
        }
    }

    /// Authenticates and resolves the planner calendar; returns the access
    /// token and the calendar id.
    async fn connect(&self) -> Result<(String, String), InfraError> {
        let token = authenticate(
            &self.config,
            Arc::clone(&self.credential_store),
            Arc::clone(&self.oauth_client),
            self.authorizer.as_ref(),
        )
        .await?;

        let calendar = CalendarInitializer::new(
            Arc::clone(&self.calendar_client),
            self.config.time_zone.clone(),
        )
        .ensure_calendar(&token.access_token, &self.config.calendar_name)
        .await?;

        let calendar_id = calendar.calendar_id().to_string();
        tracing::debug!(%calendar_id, "resolved planner calendar");
        Ok((token.access_token, calendar_id))
    }
}

pub fn parse_start_date(value: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| InfraError::InvalidDate(value.to_string()))
}

pub async fn schedule_impl<C, S, O>(
    state: &AppState<C, S, O>,
    plan_path: &Path,
    start_date: &str,
    days: &[String],
) -> Result<ScheduleReport, InfraError>
where
    C: GoogleCalendarClient,
    S: CredentialStore,
    O: OAuthHttpClient,
{
    let start = parse_start_date(start_date)?;
    let (access_token, calendar_id) = state.connect().await?;
    let plan = load_plan(plan_path)?;

    let report = WorkoutScheduler::new(
        Arc::clone(&state.calendar_client),
        state.config.event_tag.clone(),
    )
    .schedule(&access_token, &calendar_id, &plan, start, days)
    .await?;

    tracing::info!(
        created = report.created,
        failed = report.failed,
        weeks = report.weeks_scheduled,
        "schedule finished"
    );
    Ok(report)
}

pub async fn clear_impl<C, S, O>(
    state: &AppState<C, S, O>,
    plan_path: &Path,
    start_date: &str,
    force: bool,
) -> Result<ClearOutcome, InfraError>
where
    C: GoogleCalendarClient,
    S: CredentialStore,
    O: OAuthHttpClient,
{
    let start = parse_start_date(start_date)?;
    let (access_token, calendar_id) = state.connect().await?;

    let mode = if force {
        if !confirm_force_clear(state.confirmation.as_ref(), &state.config.calendar_name)? {
            println!("Operation cancelled.");
            return Ok(ClearOutcome::Cancelled);
        }
        ClearMode::Force
    } else {
        ClearMode::Tagged
    };

    let plan = load_plan(plan_path)?;
    let window = clear_window(start, plan.total_weeks(), state.config.clear_margin_weeks)?;

    let report = EventClearer::new(
        Arc::clone(&state.calendar_client),
        state.config.event_tag.clone(),
    )
    .clear(
        &access_token,
        &calendar_id,
        &state.config.calendar_name,
        &window,
        mode,
    )
    .await?;

    tracing::info!(
        found = report.found,
        deleted = report.deleted,
        failed = report.failed,
        ?mode,
        "clear finished"
    );
    Ok(ClearOutcome::Cleared(report))
}
