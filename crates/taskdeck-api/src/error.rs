//! API error types and JSON error response formatting.
//!
//! Every failure leaves the server as `{ error, code, timestamp }`, plus the
//! allowed values when a sort parameter was rejected. Internal failures are
//! logged in full and reported with a generic message.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use taskdeck_core::error::TaskdeckError;
use taskdeck_core::types::{SortField, SortOrder};

/// JSON error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code (e.g. "bad_request", "not_found").
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_fields: Option<&'static [&'static str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_orders: Option<&'static [&'static str]>,
    pub timestamp: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - malformed id, body or query parameter.
    BadRequest(String),
    /// 400 - `sortBy` outside the allowed set.
    InvalidSortField(String),
    /// 400 - `sortOrder` outside the allowed set.
    InvalidSortOrder(String),
    /// 404 - record does not exist.
    NotFound(String),
    /// 500 - unexpected failure; the detail is logged, never returned.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::InvalidSortField(_)
            | ApiError::InvalidSortOrder(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorBody {
            error: String::new(),
            code: "bad_request",
            valid_fields: None,
            valid_orders: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        match self {
            ApiError::BadRequest(msg) => body.error = msg,
            ApiError::InvalidSortField(msg) => {
                body.error = msg;
                body.code = "invalid_sort_field";
                body.valid_fields = Some(&SortField::ALLOWED);
            }
            ApiError::InvalidSortOrder(msg) => {
                body.error = msg;
                body.code = "invalid_sort_order";
                body.valid_orders = Some(&SortOrder::ALLOWED);
            }
            ApiError::NotFound(msg) => {
                body.error = msg;
                body.code = "not_found";
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed with internal error");
                body.error = "Internal server error".to_string();
                body.code = "internal_error";
            }
        }

        (status, Json(body)).into_response()
    }
}

impl From<TaskdeckError> for ApiError {
    fn from(err: TaskdeckError) -> Self {
        match &err {
            TaskdeckError::Validation { .. } => ApiError::BadRequest(err.to_string()),
            TaskdeckError::InvalidSortField { .. } => ApiError::InvalidSortField(err.to_string()),
            TaskdeckError::InvalidSortOrder { .. } => ApiError::InvalidSortOrder(err.to_string()),
            TaskdeckError::NotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::BadRequest("Invalid ID format: id must be an integer".to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let (status, json) = body_json(TaskdeckError::NotFound(7).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
        assert_eq!(json["error"], "Todo 7 not found");
        assert!(json["timestamp"].is_string());
        assert!(json.get("validFields").is_none());
    }

    #[tokio::test]
    async fn test_invalid_sort_field_lists_allowed() {
        let err = TaskdeckError::InvalidSortField {
            value: "priority".to_string(),
        };
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_sort_field");
        assert_eq!(json["validFields"].as_array().unwrap().len(), 5);
        assert!(json["error"].as_str().unwrap().contains("createdAt"));
    }

    #[tokio::test]
    async fn test_invalid_sort_order_lists_allowed() {
        let err = TaskdeckError::InvalidSortOrder {
            value: "sideways".to_string(),
        };
        let (_, json) = body_json(err.into()).await;
        assert_eq!(json["validOrders"], serde_json::json!(["asc", "desc"]));
    }

    #[tokio::test]
    async fn test_internal_error_is_sanitized() {
        let err = TaskdeckError::Storage("disk I/O error at /secret/path".to_string());
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
        assert!(!json.to_string().contains("/secret/path"));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err: ApiError = TaskdeckError::validation("text", "must not be empty").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
