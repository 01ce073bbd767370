//! SQLite-backed record store.
//!
//! Every mutation is a single statement with `RETURNING`, executed while the
//! connection mutex is held, so there is no separate read step that another
//! writer could slip in front of.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, OptionalExtension, Row};
use tracing::debug;

use taskdeck_core::error::TaskdeckError;
use taskdeck_core::store::TodoStore;
use taskdeck_core::types::{
    NewTodo, SortField, SortOrder, SortSpec, Todo, TodoChanges, TodoFilter,
};

use crate::db::Database;

const TODO_COLUMNS: &str = "id, text, completed, created_at, updated_at";

/// Record store over the `todos` table.
#[derive(Debug, Clone)]
pub struct SqliteTodoStore {
    db: Arc<Database>,
}

impl SqliteTodoStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl TodoStore for SqliteTodoStore {
    fn count(&self, filter: &TodoFilter) -> Result<u64, TaskdeckError> {
        let (where_sql, params) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM todos{}", where_sql);

        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(&sql, params_from_iter(params), |row| row.get(0))
                .map_err(|e| TaskdeckError::Storage(format!("Count query failed: {}", e)))?;
            Ok(count as u64)
        })
    }

    fn find_page(
        &self,
        filter: &TodoFilter,
        sort: SortSpec,
        skip: u64,
        take: u64,
    ) -> Result<Vec<Todo>, TaskdeckError> {
        let (where_sql, mut params) = where_clause(filter);
        let sql = format!(
            "SELECT {} FROM todos{} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            TODO_COLUMNS,
            where_sql,
            sort_column(sort.field),
            sort_direction(sort.order),
        );
        params.push(Value::Integer(clamp_i64(take)));
        params.push(Value::Integer(clamp_i64(skip)));

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| TaskdeckError::Storage(format!("Page query prepare: {}", e)))?;

            let rows = stmt
                .query_map(params_from_iter(params), map_todo)
                .map_err(|e| TaskdeckError::Storage(format!("Page query: {}", e)))?;

            let mut todos = Vec::new();
            for row in rows {
                todos.push(row.map_err(|e| TaskdeckError::Storage(e.to_string()))?);
            }
            Ok(todos)
        })
    }

    fn find_by_id(&self, id: i64) -> Result<Option<Todo>, TaskdeckError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM todos WHERE id = ?1", TODO_COLUMNS),
                rusqlite::params![id],
                map_todo,
            )
            .optional()
            .map_err(|e| TaskdeckError::Storage(e.to_string()))
        })
    }

    fn insert(&self, new: NewTodo) -> Result<Todo, TaskdeckError> {
        let now = Utc::now().timestamp_millis();
        let todo = self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO todos (text, completed, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)
                     RETURNING {}",
                    TODO_COLUMNS
                ),
                rusqlite::params![new.text, new.completed, now],
                map_todo,
            )
            .map_err(|e| TaskdeckError::Storage(format!("Failed to insert todo: {}", e)))
        })?;
        debug!(id = todo.id, "Todo inserted");
        Ok(todo)
    }

    fn update(&self, id: i64, changes: TodoChanges) -> Result<Option<Todo>, TaskdeckError> {
        let now = Utc::now().timestamp_millis();
        let text = changes.text.into_option();
        let completed = changes.completed.into_option();

        let todo = self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE todos
                     SET text = COALESCE(?1, text),
                         completed = COALESCE(?2, completed),
                         updated_at = MAX(?3, updated_at)
                     WHERE id = ?4
                     RETURNING {}",
                    TODO_COLUMNS
                ),
                rusqlite::params![text, completed, now, id],
                map_todo,
            )
            .optional()
            .map_err(|e| TaskdeckError::Storage(format!("Failed to update todo: {}", e)))
        })?;
        debug!(id, found = todo.is_some(), "Todo update applied");
        Ok(todo)
    }

    fn delete(&self, id: i64) -> Result<Option<Todo>, TaskdeckError> {
        let todo = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("DELETE FROM todos WHERE id = ?1 RETURNING {}", TODO_COLUMNS),
                rusqlite::params![id],
                map_todo,
            )
            .optional()
            .map_err(|e| TaskdeckError::Storage(format!("Failed to delete todo: {}", e)))
        })?;
        debug!(id, found = todo.is_some(), "Todo delete applied");
        Ok(todo)
    }
}

/// Build the WHERE clause (with leading space) and its positional params.
fn where_clause(filter: &TodoFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(search) = &filter.search {
        conditions.push("unicode_lower(text) LIKE ? ESCAPE '\\'");
        params.push(Value::Text(format!("%{}%", escape_like(&search.to_lowercase()))));
    }
    if let Some(completed) = filter.completed {
        conditions.push("completed = ?");
        params.push(Value::Integer(completed as i64));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

/// Escape LIKE wildcards so the search term matches literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::Id => "id",
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
        SortField::Text => "text",
        SortField::Completed => "completed",
    }
}

fn sort_direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn millis_to_datetime(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn map_todo(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        text: row.get(1)?,
        completed: row.get(2)?,
        created_at: millis_to_datetime(3, row.get(3)?)?,
        updated_at: millis_to_datetime(4, row.get(4)?)?,
    })
}
