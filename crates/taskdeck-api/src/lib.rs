//! Taskdeck API crate - axum HTTP server, route handlers, admission control.
//!
//! Exposes the `/api/todos` record endpoints and the `/health` and
//! `/welcome` system endpoints, each route class behind its own
//! fixed-window request limiter.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use rate_limit::{AdmissionController, AdmissionDecision, RouteClass};
pub use routes::{create_router, start_server};
pub use state::AppState;
