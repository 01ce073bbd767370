//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use taskdeck_core::config::TaskdeckConfig;
use taskdeck_core::store::TodoStore;
use taskdeck_storage::{Database, SqliteTodoStore};

use crate::rate_limit::AdmissionController;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed after startup.
    pub config: Arc<TaskdeckConfig>,
    /// Record store backing every `/api/todos` endpoint.
    pub store: Arc<dyn TodoStore>,
    /// Per-client request counters for both route classes.
    pub admission: Arc<AdmissionController>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: TaskdeckConfig, store: Arc<dyn TodoStore>) -> Self {
        let admission = Arc::new(AdmissionController::from_config(&config.rate_limit));
        Self {
            config: Arc::new(config),
            store,
            admission,
            start_time: Instant::now(),
        }
    }

    /// State backed by a SQLite database.
    pub fn with_database(config: TaskdeckConfig, database: Database) -> Self {
        let store = SqliteTodoStore::new(Arc::new(database));
        Self::new(config, Arc::new(store))
    }
}
