use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CALENDAR_NAME: &str = "Fitness";
const DEFAULT_EVENT_TAG: &str = "#WorkoutPlanner";
const DEFAULT_TIME_ZONE: &str = "Etc/UTC";
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
const DEFAULT_TOKEN_FILE: &str = "token.json";
const DEFAULT_CLEAR_MARGIN_WEEKS: u32 = 52;
pub(crate) const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub(crate) const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

const ENV_CALENDAR_NAME: &str = "WORKOUT_PLANNER_CALENDAR_NAME";
const ENV_CREDENTIALS_FILE: &str = "WORKOUT_PLANNER_CREDENTIALS_FILE";
const ENV_TOKEN_FILE: &str = "WORKOUT_PLANNER_TOKEN_FILE";

/// Settings shared by every component; built once in `main` and passed down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub calendar_name: String,
    pub event_tag: String,
    pub time_zone: String,
    pub scopes: Vec<String>,
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    pub clear_margin_weeks: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            event_tag: DEFAULT_EVENT_TAG.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            clear_margin_weeks: DEFAULT_CLEAR_MARGIN_WEEKS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    schema: u8,
    calendar_name: Option<String>,
    event_tag: Option<String>,
    time_zone: Option<String>,
    scopes: Option<Vec<String>>,
    credentials_file: Option<PathBuf>,
    token_file: Option<PathBuf>,
    clear_margin_weeks: Option<u32>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        validate_non_empty(&self.calendar_name, "calendarName")?;
        validate_non_empty(&self.event_tag, "eventTag")?;
        self.time_zone.parse::<Tz>().map_err(|_| {
            InfraError::InvalidConfig(format!("unknown timeZone '{}'", self.time_zone))
        })?;
        if self.scopes.iter().all(|scope| scope.trim().is_empty()) {
            return Err(InfraError::InvalidConfig(
                "at least one scope is required".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(value) = non_empty(file.calendar_name) {
            self.calendar_name = value;
        }
        if let Some(value) = non_empty(file.event_tag) {
            self.event_tag = value;
        }
        if let Some(value) = non_empty(file.time_zone) {
            self.time_zone = value;
        }
        if let Some(scopes) = file.scopes.filter(|scopes| !scopes.is_empty()) {
            self.scopes = scopes;
        }
        if let Some(path) = file.credentials_file {
            self.credentials_file = path;
        }
        if let Some(path) = file.token_file {
            self.token_file = path;
        }
        if let Some(weeks) = file.clear_margin_weeks {
            self.clear_margin_weeks = weeks;
        }
        self
    }

    fn apply_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = non_empty(lookup(ENV_CALENDAR_NAME)) {
            self.calendar_name = value;
        }
        if let Some(value) = non_empty(lookup(ENV_CREDENTIALS_FILE)) {
            self.credentials_file = PathBuf::from(value);
        }
        if let Some(value) = non_empty(lookup(ENV_TOKEN_FILE)) {
            self.token_file = PathBuf::from(value);
        }
        self
    }
}

pub fn load_app_config(path: &Path) -> Result<AppConfig, InfraError> {
    load_app_config_with_lookup(path, |key| std::env::var(key).ok())
}

pub(crate) fn load_app_config_with_lookup<F>(path: &Path, lookup: F) -> Result<AppConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = AppConfig::default();
    if path.exists() {
        let raw = fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid {}: {error}", path.display()))
        })?;
        if file.schema != 1 {
            return Err(InfraError::InvalidConfig(format!(
                "unsupported schema {} in {}",
                file.schema,
                path.display()
            )));
        }
        config = config.apply_file(file);
    }
    let config = config.apply_lookup(lookup);
    config.validate()?;
    Ok(config)
}

/// OAuth client registration read from the downloaded client-secret file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsEntry>,
    web: Option<ClientSecretsEntry>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsEntry {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

pub fn load_client_secrets(path: &Path) -> Result<ClientSecrets, InfraError> {
    if !path.exists() {
        return Err(InfraError::CredentialsMissing(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path)?;
    let parsed: ClientSecretsFile = serde_json::from_str(&raw).map_err(|error| {
        InfraError::InvalidConfig(format!("invalid client secrets {}: {error}", path.display()))
    })?;
    let entry = parsed.installed.or(parsed.web).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "{} has neither an 'installed' nor a 'web' section",
            path.display()
        ))
    })?;

    validate_non_empty(&entry.client_id, "client_id")?;
    validate_non_empty(&entry.client_secret, "client_secret")?;
    Ok(ClientSecrets {
        client_id: entry.client_id.trim().to_string(),
        client_secret: entry.client_secret.trim().to_string(),
        authorization_endpoint: non_empty(entry.auth_uri)
            .unwrap_or_else(|| DEFAULT_AUTHORIZATION_ENDPOINT.to_string()),
        token_endpoint: non_empty(entry.token_uri)
            .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string()),
    })
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), InfraError> {
    if value.trim().is_empty() {
        return Err(InfraError::InvalidConfig(format!(
            "{field_name} must not be empty"
        )));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
