//! This file defines the diet-insights binary entry point.

use diet_insights::app;
use diet_insights::app_state::AppState;
use diet_insights::cli;
use diet_insights::metrics;
use diet_insights::server;
use diet_insights::tracing;

use std::process::ExitCode;
use std::sync::Arc;

/// Application entry point
#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(error) = tracing::init_tracing(&args) {
        eprintln!("failed to initialise tracing: {error}");
        return ExitCode::FAILURE;
    }
    if let Err(error) = metrics::register_metrics() {
        ::tracing::error!("failed to register metrics: {}", error);
        return ExitCode::FAILURE;
    }
    let state = match AppState::new(&args) {
        Ok(state) => Arc::new(state),
        Err(error) => {
            ::tracing::error!("failed to initialise record source: {}", error);
            return ExitCode::FAILURE;
        }
    };
    let service = app::service(state);
    let result = server::serve(&args, service).await;
    tracing::shutdown_tracing();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            ::tracing::error!("{}", error);
            ExitCode::FAILURE
        }
    }
}
