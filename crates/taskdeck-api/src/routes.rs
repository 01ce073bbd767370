//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, request ids, tracing, compression,
//! panic recovery and one admission limiter per route class.

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use taskdeck_core::error::TaskdeckError;

use crate::error::ApiError;
use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RouteClass, RouteLimiter};
use crate::state::AppState;

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        match origin.parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(e) => {
                warn!(origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    ApiError::Internal(format!("Handler panicked: {}", detail)).into_response()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let trust_forwarded_for = state.config.server.trust_forwarded_for;
    let limiter = |class| RouteLimiter::new(state.admission.clone(), class, trust_forwarded_for);

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/welcome", get(handlers::welcome))
        .route_layer(middleware::from_fn_with_state(
            limiter(RouteClass::Public),
            rate_limit_middleware,
        ));

    let api_routes = Router::new()
        .route(
            "/api/todos",
            get(handlers::list_todos).post(handlers::create_todo),
        )
        .route(
            "/api/todos/{id}",
            get(handlers::get_todo)
                .put(handlers::replace_todo)
                .patch(handlers::patch_todo)
                .delete(handlers::delete_todo),
        )
        .route_layer(middleware::from_fn_with_state(
            limiter(RouteClass::Api),
            rate_limit_middleware,
        ));

    let cors = cors_layer(&state.config.server.cors_origin);

    public_routes
        .merge(api_routes)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Serve the router on the configured address until `shutdown` resolves.
///
/// Peer addresses are attached to each request for per-client admission.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), TaskdeckError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting API server on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("API server stopped");
    Ok(())
}
