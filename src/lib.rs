pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

use application::commands::{clear_impl, schedule_impl, AppState};
use chrono::Local;
use cli::{Action, Cli};
use infrastructure::config::load_app_config;
use infrastructure::error::InfraError;

pub async fn run(cli: Cli) -> Result<(), InfraError> {
    let config = load_app_config(&cli.config)?;
    tracing::debug!(?config, "loaded configuration");

    let state = AppState::new(config);
    let start_date = cli
        .start_date
        .clone()
        .unwrap_or_else(|| Local::now().date_naive().format("%Y-%m-%d").to_string());

    match cli.action() {
        Action::Schedule(days) => {
            schedule_impl(&state, &cli.plan, &start_date, &days).await?;
        }
        Action::Clear { force } => {
            clear_impl(&state, &cli.plan, &start_date, force).await?;
        }
    }
    Ok(())
}
