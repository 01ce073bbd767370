//! SQLite connection shared by the record store.
//!
//! One rusqlite Connection sits behind a Mutex. Each `TodoStore` call holds
//! it for exactly one statement, so an insert, update or delete can never
//! interleave with another writer, while listing reads only block for the
//! duration of each count or page query.
//!
//! Every connection gets the `unicode_lower(text)` scalar function, which
//! the search filter uses because built-in `LIKE` only folds ASCII.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use tracing::info;

use taskdeck_core::error::TaskdeckError;

use crate::migrations;

/// The taskdeck database: schema-migrated, WAL-mode, one guarded connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Configures WAL mode and synchronous=NORMAL, then runs all pending
    /// migrations.
    pub fn new(path: &Path) -> Result<Self, TaskdeckError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| TaskdeckError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| TaskdeckError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());

        Self::with_migrations(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, TaskdeckError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TaskdeckError::Storage(format!("Failed to open in-memory db: {}", e)))?;

        Self::with_migrations(conn)
    }

    fn with_migrations(conn: Connection) -> Result<Self, TaskdeckError> {
        register_functions(&conn)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TaskdeckError>
    where
        F: FnOnce(&Connection) -> Result<T, TaskdeckError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TaskdeckError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

/// Install the SQL functions the store's queries rely on.
fn register_functions(conn: &Connection) -> Result<(), TaskdeckError> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
    .map_err(|e| TaskdeckError::Storage(format!("Failed to register unicode_lower: {}", e)))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
