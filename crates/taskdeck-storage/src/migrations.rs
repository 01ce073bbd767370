//! Database schema migrations.
//!
//! Versions are recorded in `schema_migrations`; each migration runs once.

use rusqlite::Connection;
use tracing::info;

use taskdeck_core::error::TaskdeckError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), TaskdeckError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| TaskdeckError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| TaskdeckError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: todos table plus indexes for every sortable column.
///
/// Timestamps are epoch milliseconds.
fn apply_v1(conn: &Connection) -> Result<(), TaskdeckError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS todos (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            text        TEXT NOT NULL CHECK (length(trim(text)) > 0),
            completed   INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1)),
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_todos_created_at ON todos (created_at, id);
        CREATE INDEX IF NOT EXISTS idx_todos_updated_at ON todos (updated_at, id);
        CREATE INDEX IF NOT EXISTS idx_todos_completed  ON todos (completed, id);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| TaskdeckError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
