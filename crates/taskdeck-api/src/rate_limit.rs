//! Fixed-window admission control per client and route class.
//!
//! Each `(route class, client key)` pair owns a counter that resets once its
//! window has elapsed. The lookup, reset, increment and comparison happen
//! under one lock with no suspension point, so two concurrent requests can
//! never both observe the same pre-increment count.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, warn};

use taskdeck_core::config::{RateLimitConfig, WindowConfig};

/// Key used when the client address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");

/// A named group of endpoints sharing one window configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Health and welcome endpoints.
    Public,
    /// Record endpoints.
    Api,
}

impl RouteClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Public => "public",
            RouteClass::Api => "api",
        }
    }
}

/// Limits applied to one route class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowPolicy {
    pub window: Duration,
    pub max_requests: u64,
    pub message: String,
}

impl WindowPolicy {
    pub fn new(window: Duration, max_requests: u64, message: impl Into<String>) -> Self {
        Self {
            window,
            max_requests,
            message: message.into(),
        }
    }

    fn window_secs(&self) -> u64 {
        ceil_secs(self.window)
    }
}

impl From<&WindowConfig> for WindowPolicy {
    fn from(config: &WindowConfig) -> Self {
        Self::new(
            Duration::from_millis(config.window_ms),
            config.max_requests,
            config.message.clone(),
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct WindowCounter {
    window_start: Instant,
    count: u64,
}

/// Outcome of a single admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub admitted: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: Instant,
    /// Time left until `reset_at`, measured from the admission instant.
    pub reset_after: Duration,
}

impl AdmissionDecision {
    /// Whole seconds until the window resets, never below 1.
    pub fn retry_after_secs(&self) -> u64 {
        ceil_secs(self.reset_after).max(1)
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Process-wide counter map plus the policy of each route class.
#[derive(Debug)]
pub struct AdmissionController {
    public: WindowPolicy,
    api: WindowPolicy,
    counters: Mutex<HashMap<(RouteClass, String), WindowCounter>>,
}

impl AdmissionController {
    pub fn new(public: WindowPolicy, api: WindowPolicy) -> Self {
        Self {
            public,
            api,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new((&config.public).into(), (&config.api).into())
    }

    pub fn policy(&self, class: RouteClass) -> &WindowPolicy {
        match class {
            RouteClass::Public => &self.public,
            RouteClass::Api => &self.api,
        }
    }

    // Counters stay consistent even if a holder panicked, so poisoning is ignored.
    fn counters(&self) -> MutexGuard<'_, HashMap<(RouteClass, String), WindowCounter>> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count one request from `client_key` against `class` at `now`.
    ///
    /// A `now` earlier than the stored window start is treated as "no time
    /// elapsed", so a window never moves backwards.
    pub fn admit(&self, client_key: &str, class: RouteClass, now: Instant) -> AdmissionDecision {
        let policy = self.policy(class);
        let mut counters = self.counters();

        let counter = counters
            .entry((class, client_key.to_string()))
            .or_insert(WindowCounter {
                window_start: now,
                count: 0,
            });

        if now.saturating_duration_since(counter.window_start) >= policy.window {
            counter.window_start = now;
            counter.count = 0;
        }
        counter.count = counter.count.saturating_add(1);

        let reset_at = counter.window_start + policy.window;
        AdmissionDecision {
            admitted: counter.count <= policy.max_requests,
            limit: policy.max_requests,
            remaining: policy.max_requests.saturating_sub(counter.count),
            reset_at,
            reset_after: reset_at.saturating_duration_since(now),
        }
    }

    /// Evict counters whose window has elapsed. Returns the number removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut counters = self.counters();
        let before = counters.len();
        counters.retain(|(class, _), counter| {
            now.saturating_duration_since(counter.window_start) < self.policy(*class).window
        });
        before - counters.len()
    }

    /// Drop every counter.
    pub fn clear(&self) {
        self.counters().clear();
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        self.counters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically evict expired counters until the runtime shuts down.
pub fn spawn_sweeper(
    controller: Arc<AdmissionController>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = controller.sweep(Instant::now());
            if evicted > 0 {
                debug!(evicted, remaining = controller.len(), "Rate limit counters swept");
            }
        }
    })
}

// =============================================================================
// Middleware
// =============================================================================

/// Middleware state binding a controller to one route class.
#[derive(Clone, Debug)]
pub struct RouteLimiter {
    pub controller: Arc<AdmissionController>,
    pub class: RouteClass,
    pub trust_forwarded_for: bool,
}

impl RouteLimiter {
    pub fn new(
        controller: Arc<AdmissionController>,
        class: RouteClass,
        trust_forwarded_for: bool,
    ) -> Self {
        Self {
            controller,
            class,
            trust_forwarded_for,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectionBody<'a> {
    error: &'static str,
    message: &'a str,
    retry_after: u64,
    timestamp: String,
}

/// Derive the counter key for a request.
///
/// Uses the peer IP from `ConnectInfo`, or the first `X-Forwarded-For` hop
/// when `trust_forwarded_for` is set.
pub fn client_key(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Axum middleware enforcing the limiter's route class.
///
/// Rejected requests get a 429 without reaching the handler. Every response
/// carries the quota headers.
pub async fn rate_limit_middleware(
    State(limiter): State<RouteLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req, limiter.trust_forwarded_for);
    let decision = limiter.controller.admit(&key, limiter.class, Instant::now());
    let policy = limiter.controller.policy(limiter.class);

    let mut response = if decision.admitted {
        next.run(req).await
    } else {
        warn!(
            client = %key,
            route_class = limiter.class.as_str(),
            retry_after = decision.retry_after_secs(),
            "Rate limit exceeded"
        );
        rejection_response(policy, &decision)
    };

    apply_quota_headers(response.headers_mut(), policy, &decision);
    response
}

fn rejection_response(policy: &WindowPolicy, decision: &AdmissionDecision) -> Response {
    let retry_after = decision.retry_after_secs();
    let body = RejectionBody {
        error: "too_many_requests",
        message: &policy.message,
        retry_after,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (
        StatusCode::TOO_MANY_REQUESTS,
        [(RETRY_AFTER, HeaderValue::from(retry_after))],
        Json(body),
    )
        .into_response()
}

fn apply_quota_headers(headers: &mut HeaderMap, policy: &WindowPolicy, decision: &AdmissionDecision) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(decision.reset_after)));
    if let Ok(value) = HeaderValue::from_str(&format!("{};w={}", policy.max_requests, policy.window_secs())) {
        headers.insert(RATELIMIT_POLICY, value);
    }
}
