use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use workout_planner::cli::Cli;

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("workout_planner=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Failures are reported on stdout and the process still exits cleanly.
    if let Err(error) = workout_planner::run(cli).await {
        tracing::debug!(?error, "operation failed");
        println!("Operation failed: {error}");
    }
}
