use crate::domain::models::{Quantity, Workout};
use chrono::NaiveDate;
use std::fmt::Write;

const MISSING_VALUE: &str = "N/A";
const BULLET: &str = "\u{2022}";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl CalendarEventDateTime {
    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format("%Y-%m-%d").to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct GoogleCalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub start: CalendarEventDateTime,
    #[serde(default)]
    pub end: CalendarEventDateTime,
}

/// Renders the event body: focus line, one bullet per exercise, then the tag
/// that later identifies generated events.
pub fn format_event_description(workout: &Workout, tag: &str) -> String {
    let focus = workout.focus.as_deref().unwrap_or(MISSING_VALUE);

    let mut description = format!("<b>Focus: {focus}</b>\n\n<b>Exercises:</b>\n");
    for exercise in &workout.exercises {
        let _ = writeln!(
            description,
            "{BULLET} {}: {} sets of {} reps",
            exercise.name,
            quantity_text(exercise.sets.as_ref()),
            quantity_text(exercise.reps.as_ref()),
        );
    }
    let _ = write!(description, "\n\n<i>{tag}</i>");
    description
}

/// Builds the all-day event for `workout` on `date`.
pub fn encode_workout_event(workout: &Workout, date: NaiveDate, tag: &str) -> GoogleCalendarEvent {
    GoogleCalendarEvent {
        id: None,
        summary: Some(workout.name.clone()),
        description: Some(format_event_description(workout, tag)),
        status: None,
        start: CalendarEventDateTime::all_day(date),
        end: CalendarEventDateTime::all_day(date),
    }
}

pub fn is_tagged(event: &GoogleCalendarEvent, tag: &str) -> bool {
    event
        .description
        .as_deref()
        .is_some_and(|description| description.contains(tag))
}

fn quantity_text(value: Option<&Quantity>) -> String {
    value.map_or_else(|| MISSING_VALUE.to_string(), ToString::to_string)
}
