use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    #[serde(rename = "plan_name")]
    pub name: String,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Plan {
    pub fn total_weeks(&self) -> u32 {
        self.phases.iter().map(|phase| phase.duration_weeks).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    #[serde(rename = "phase_name", default)]
    pub name: String,
    #[serde(default)]
    pub duration_weeks: u32,
    #[serde(default)]
    pub workouts: Vec<Workout>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workout {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exercise {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sets: Option<Quantity>,
    #[serde(default)]
    pub reps: Option<Quantity>,
}

/// Set or rep count as written in the plan: any JSON number (`3`, `1.5`)
/// or free text such as `"8-12"` or `"30s"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Quantity {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
    /// Client registration the token was issued to, kept so a refresh does
    /// not need the client-secret file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }

    fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Where a cached credential stands at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid(OAuthToken),
    ExpiredRefreshable(OAuthToken),
    ExpiredUnrefreshable(OAuthToken),
}

impl TokenState {
    pub fn classify(token: Option<OAuthToken>, now: DateTime<Utc>, leeway_seconds: i64) -> Self {
        match token {
            None => Self::Absent,
            Some(token) if token.is_valid_at(now, leeway_seconds) => Self::Valid(token),
            Some(token) if token.refresh_token().is_some() => Self::ExpiredRefreshable(token),
            Some(token) => Self::ExpiredUnrefreshable(token),
        }
    }
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
