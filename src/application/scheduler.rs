use crate::domain::models::{parse_weekday, Plan, Workout};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::encode_workout_event;
use crate::infrastructure::google_calendar_client::GoogleCalendarClient;
use chrono::{Datelike, Days, NaiveDate};
use std::sync::Arc;

/// One workout placed on a date. `week_number` counts weeks across the whole
/// plan, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledWorkout<'a> {
    pub week_number: u32,
    pub date: NaiveDate,
    pub workout: &'a Workout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSchedule<'a> {
    pub name: &'a str,
    pub duration_weeks: u32,
    pub entries: Vec<ScheduledWorkout<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScheduleReport {
    pub created: usize,
    pub failed: usize,
    pub weeks_scheduled: u32,
}

/// Maps weekday names to indices, Monday = 0, sorted and deduplicated.
pub fn training_day_indices(names: &[String]) -> Result<Vec<u32>, InfraError> {
    let mut indices = names
        .iter()
        .map(|name| {
            parse_weekday(name)
                .map(|weekday| weekday.num_days_from_monday())
                .ok_or_else(|| InfraError::InvalidDay(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

/// Assigns every workout occurrence of `plan` to a date on or after `start`.
///
/// A single cursor walks forward through the calendar for the whole plan: for
/// each week of each phase it visits the selected weekdays in ascending order,
/// stopping on the next matching day and stepping one day past it afterwards.
/// Workouts rotate round-robin within a phase. Phases without workouts are
/// skipped and do not count towards the week total.
pub fn plan_schedule<'a>(
    plan: &'a Plan,
    start: NaiveDate,
    day_indices: &[u32],
) -> Result<Vec<PhaseSchedule<'a>>, InfraError> {
    let mut cursor = start;
    let mut weeks_scheduled = 0u32;
    let mut phases = Vec::new();

    for phase in plan.phases.iter().filter(|phase| !phase.workouts.is_empty()) {
        let mut entries = Vec::new();
        let mut assigned = 0usize;

        for _ in 0..phase.duration_weeks {
            weeks_scheduled += 1;
            for &day_index in day_indices {
                while cursor.weekday().num_days_from_monday() != day_index {
                    cursor = next_day(cursor)?;
                }
                entries.push(ScheduledWorkout {
                    week_number: weeks_scheduled,
                    date: cursor,
                    workout: &phase.workouts[assigned % phase.workouts.len()],
                });
                assigned += 1;
                cursor = next_day(cursor)?;
            }
        }

        phases.push(PhaseSchedule {
            name: &phase.name,
            duration_weeks: phase.duration_weeks,
            entries,
        });
    }

    Ok(phases)
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, InfraError> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| InfraError::InvalidDate(format!("{date} is at the end of the calendar")))
}

fn title_case(words: &[String]) -> String {
    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(", ")
}

pub struct WorkoutScheduler<C>
where
    C: GoogleCalendarClient,
{
    calendar_client: Arc<C>,
    event_tag: String,
}

impl<C> WorkoutScheduler<C>
where
    C: GoogleCalendarClient,
{
    pub fn new(calendar_client: Arc<C>, event_tag: impl Into<String>) -> Self {
        Self {
            calendar_client,
            event_tag: event_tag.into(),
        }
    }

    /// Inserts one all-day event per scheduled workout. A rejected insert is
    /// logged and counted; the remaining events are still attempted.
    pub async fn schedule(
        &self,
        access_token: &str,
        calendar_id: &str,
        plan: &Plan,
        start: NaiveDate,
        days: &[String],
    ) -> Result<ScheduleReport, InfraError> {
        let day_indices = training_day_indices(days)?;
        let phases = plan_schedule(plan, start, &day_indices)?;

        println!("\nScheduling '{}' on {}...", plan.name, title_case(days));

        let mut report = ScheduleReport::default();
        for phase in &phases {
            println!(
                "\n--- Scheduling {} for {} weeks ---",
                phase.name, phase.duration_weeks
            );
            report.weeks_scheduled += phase.duration_weeks;

            for entry in &phase.entries {
                let event = encode_workout_event(entry.workout, entry.date, &self.event_tag);
                match self
                    .calendar_client
                    .insert_event(access_token, calendar_id, &event)
                    .await
                {
                    Ok(created) => {
                        report.created += 1;
                        let title = created.summary.as_deref().unwrap_or(&entry.workout.name);
                        println!(
                            "  Week {}: Created '{title}' on {}",
                            entry.week_number,
                            entry.date.format("%Y-%m-%d")
                        );
                    }
                    Err(error) => {
                        report.failed += 1;
                        tracing::warn!(
                            %calendar_id,
                            date = %entry.date,
                            workout = %entry.workout.name,
                            %error,
                            "failed to create event"
                        );
                    }
                }
            }
        }

        println!(
            "\nWorkout scheduling complete! Scheduled a total of {} weeks.",
            report.weeks_scheduled
        );
        Ok(report)
    }
}
