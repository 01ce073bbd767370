//! taskdeck application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the SQLite record store
//! 4. Start the counter sweeper
//! 5. Serve the API until Ctrl-C, then drop all rate limit counters

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskdeck_api::rate_limit::spawn_sweeper;
use taskdeck_api::{start_server, AppState};
use taskdeck_core::config::TaskdeckConfig;
use taskdeck_core::TaskdeckError;
use taskdeck_storage::Database;

use crate::cli::CliArgs;

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
    }
}

/// Persist the resolved configuration for `--write-config`.
///
/// A file that failed to load is left as it is, so the caller sees the
/// load error instead of a silent rewrite with defaults.
fn write_config(
    config: &TaskdeckConfig,
    path: &Path,
    load_error: Option<TaskdeckError>,
) -> Result<(), TaskdeckError> {
    if let Some(e) = load_error {
        return Err(TaskdeckError::Config(format!(
            "refusing to overwrite {}: {}",
            path.display(),
            e
        )));
    }
    config.save(path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing exists; its outcome is logged below.
    let config_file = args.resolve_config_path();
    let (mut config, config_error) = match TaskdeckConfig::load_if_exists(&config_file) {
        Ok(Some(config)) => (config, None),
        Ok(None) => (TaskdeckConfig::default(), None),
        Err(e) => (TaskdeckConfig::default(), Some(e)),
    };

    // Tracing. RUST_LOG > --log-level > config.
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    tracing::info!("Starting taskdeck v{}", env!("CARGO_PKG_VERSION"));
    match &config_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Invalid configuration, using defaults"
        ),
        None => tracing::info!(path = %config_file.display(), "Configuration resolved"),
    }

    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    config.server.port = args.resolve_port(config.server.port);
    let db_path = args.resolve_database(&config.storage.database_path);
    config.storage.database_path = db_path.to_string_lossy().into_owned();

    if args.write_config {
        write_config(&config, &config_file, config_error)?;
        return Ok(());
    }

    // Storage.
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let sweep_every = Duration::from_secs(config.rate_limit.sweep_interval_secs);
    let port = config.server.port;
    let state = AppState::with_database(config, db);
    let admission = Arc::clone(&state.admission);

    // === Background tasks ===

    let sweeper = spawn_sweeper(Arc::clone(&admission), sweep_every);

    // === API server ===

    if let Err(e) = start_server(state, shutdown_signal()).await {
        tracing::error!(error = %e, "API server failed - is another instance running?");
        tracing::error!("Try: TASKDECK_PORT={} cargo run -p taskdeck-app", port.saturating_add(1));
        sweeper.abort();
        return Err(e.into());
    }

    sweeper.abort();
    let dropped = admission.len();
    admission.clear();
    tracing::info!(counters = dropped, "Rate limit counters cleared");

    Ok(())
}
