use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Schedule or clear a workout plan on a dedicated 'Fitness' calendar.
#[derive(Debug, Parser)]
#[command(name = "workout-planner", version, about)]
#[command(group(ArgGroup::new("action").required(true).args(["schedule", "clear"])))]
pub struct Cli {
    /// Schedule workouts on the given days (e.g. --schedule monday wednesday)
    #[arg(long, num_args = 1.., value_name = "DAY")]
    pub schedule: Option<Vec<String>>,

    /// Clear workout events from the calendar
    #[arg(long)]
    pub clear: bool,

    /// Path to the workout plan JSON file
    #[arg(long, default_value = "plan.json")]
    pub plan: PathBuf,

    /// First day to schedule or clear from, YYYY-MM-DD (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start_date: Option<String>,

    /// With --clear, delete ALL events in range, not just tagged ones
    #[arg(long)]
    pub force: bool,

    /// Optional planner settings file
    #[arg(long, default_value = "planner.json")]
    pub config: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Schedule(Vec<String>),
    Clear { force: bool },
}

impl Cli {
    pub fn action(&self) -> Action {
        match &self.schedule {
            Some(days) => Action::Schedule(days.clone()),
            None => Action::Clear { force: self.force },
        }
    }
}
