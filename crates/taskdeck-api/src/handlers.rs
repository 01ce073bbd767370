//! Route handler functions for all API endpoints.
//!
//! Extractor rejections are taken as `Result` so malformed ids, bodies and
//! query strings surface as the JSON 400 body instead of axum's plain text.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use taskdeck_core::listing::{self, ListParams, ListQuery, ListingPage};
use taskdeck_core::store::TodoStore;
use taskdeck_core::types::{FieldUpdate, NewTodo, Todo, TodoChanges, TodoFilter};
use taskdeck_core::TaskdeckError;

use crate::error::ApiError;
use crate::state::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// =============================================================================
// Request bodies
// =============================================================================

/// Body of `POST /api/todos`.
#[derive(Debug, Deserialize)]
pub struct CreateTodoBody {
    pub text: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Body of `PUT` and `PATCH /api/todos/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoBody {
    #[serde(default)]
    pub text: FieldUpdate<String>,
    #[serde(default)]
    pub completed: FieldUpdate<bool>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse<T> {
    pub message: String,
    pub data: T,
    pub timestamp: String,
}

impl<T> MessageResponse<T> {
    fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
            timestamp: now_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub total_todos: u64,
    pub rate_limit_entries: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub timestamp: String,
}

// =============================================================================
// System endpoints
// =============================================================================

/// GET /health - liveness plus record and counter totals.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let total_todos = state.store.count(&TodoFilter::default())?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        timestamp: now_rfc3339(),
        total_todos,
        rate_limit_entries: state.admission.len() as u64,
    }))
}

/// GET /welcome
pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the taskdeck API".to_string(),
        version: VERSION.to_string(),
        status: "success".to_string(),
        timestamp: now_rfc3339(),
    })
}

// =============================================================================
// Record endpoints
// =============================================================================

/// GET /api/todos - paginated, sorted, searchable listing.
pub async fn list_todos(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListingPage>, ApiError> {
    let Query(params) = params?;
    let query = ListQuery::parse(&params, &state.config.listing)?;
    let page = listing::list(&*state.store, &query)?;
    Ok(Json(page))
}

/// GET /api/todos/{id}
pub async fn get_todo(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<DataResponse<Todo>>, ApiError> {
    let Path(id) = id?;
    let todo = state
        .store
        .find_by_id(id)?
        .ok_or(TaskdeckError::NotFound(id))?;

    Ok(Json(DataResponse {
        data: todo,
        timestamp: now_rfc3339(),
    }))
}

/// POST /api/todos
pub async fn create_todo(
    State(state): State<AppState>,
    body: Result<Json<CreateTodoBody>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse<Todo>>), ApiError> {
    let Json(body) = body?;
    let text = body
        .text
        .ok_or_else(|| TaskdeckError::validation("text", "is required"))?;
    let todo = state.store.insert(NewTodo::new(&text, body.completed)?)?;

    info!(id = todo.id, "Todo created");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Todo created", todo)),
    ))
}

/// PUT /api/todos/{id} - full replacement, both attributes required.
pub async fn replace_todo(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateTodoBody>, JsonRejection>,
) -> Result<Json<MessageResponse<Todo>>, ApiError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let changes = TodoChanges::replace(body.text, body.completed)?;
    apply_changes(&state, id, changes)
}

/// PATCH /api/todos/{id} - only supplied attributes change.
pub async fn patch_todo(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateTodoBody>, JsonRejection>,
) -> Result<Json<MessageResponse<Todo>>, ApiError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let changes = TodoChanges::patch(body.text, body.completed)?;
    apply_changes(&state, id, changes)
}

fn apply_changes(
    state: &AppState,
    id: i64,
    changes: TodoChanges,
) -> Result<Json<MessageResponse<Todo>>, ApiError> {
    // An empty change set leaves the record, including updatedAt, untouched.
    let updated = if changes.is_empty() {
        state.store.find_by_id(id)?
    } else {
        state.store.update(id, changes)?
    };
    let todo = updated.ok_or(TaskdeckError::NotFound(id))?;

    info!(id, "Todo updated");
    Ok(Json(MessageResponse::new("Todo updated", todo)))
}

/// DELETE /api/todos/{id} - responds with the removed record.
pub async fn delete_todo(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse<Todo>>, ApiError> {
    let Path(id) = id?;
    let todo = state
        .store
        .delete(id)?
        .ok_or(TaskdeckError::NotFound(id))?;

    info!(id, "Todo deleted");
    Ok(Json(MessageResponse::new("Todo deleted", todo)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_body_missing_fields_are_unchanged() {
        let body: UpdateTodoBody = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert_eq!(body.text, FieldUpdate::Unchanged);
        assert_eq!(body.completed, FieldUpdate::Set(true));
    }

    #[test]
    fn test_update_body_rejects_null() {
        let result = serde_json::from_str::<UpdateTodoBody>(r#"{"text": null}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_body_defaults_completed() {
        let body: CreateTodoBody = serde_json::from_str(r#"{"text": "x"}"#).unwrap();
        assert!(!body.completed);
        assert_eq!(body.text.as_deref(), Some("x"));
    }

    #[test]
    fn test_create_body_rejects_wrong_type() {
        assert!(serde_json::from_str::<CreateTodoBody>(r#"{"text": 5}"#).is_err());
    }

    #[test]
    fn test_health_response_uses_camel_case() {
        let json = serde_json::to_value(HealthResponse {
            status: "healthy".to_string(),
            version: VERSION.to_string(),
            uptime_secs: 3,
            timestamp: now_rfc3339(),
            total_todos: 2,
            rate_limit_entries: 1,
        })
        .unwrap();
        assert_eq!(json["uptimeSecs"], 3);
        assert_eq!(json["totalTodos"], 2);
        assert_eq!(json["rateLimitEntries"], 1);
    }
}
