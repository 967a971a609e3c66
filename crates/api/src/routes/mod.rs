//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (store ping, channel state)
//!
//! # Auth (Firebase ID token as bearer credential)
//! POST   /api/auth/login                  - Find or create the caller's user
//! GET    /api/auth/me                     - Current user profile
//!
//! # Users
//! GET    /api/users                       - Users with work order counts
//! GET    /api/users/{id}                  - User with assigned work orders
//!
//! # Work orders
//! GET    /api/work-orders                 - List (?status&assigned_user_id&page&limit)
//! POST   /api/work-orders                 - Create (admin only)
//! GET    /api/work-orders/{id}            - Detail with full audit trail
//! PATCH  /api/work-orders/{id}            - Partial update
//! GET    /api/work-orders/{id}/logs       - Audit trail, oldest first
//! GET    /api/work-orders/{id}/payments   - Payments for a work order
//!
//! # Payments and notifications
//! POST   /api/payments                    - Record a payment
//! POST   /api/notifications               - Send an SMS verbatim
//!
//! # Realtime
//! GET    /ws?token=...                    - WebSocket subscription
//! ```

pub mod auth;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod realtime;
pub mod users;
pub mod work_orders;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use workorder_core::WorkOrderId;

use crate::error::AppError;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::index))
        .route("/{id}", get(users::show))
}

/// Create the work order routes router.
pub fn work_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(work_orders::index).post(work_orders::create))
        .route("/{id}", get(work_orders::show).patch(work_orders::update))
        .route("/{id}/logs", get(work_orders::logs))
        .route("/{id}/payments", get(payments::for_work_order))
}

/// Create all routes, with state, request ids and request tracing.
///
/// CORS and the Sentry layers are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/users", user_routes())
        .nest("/api/work-orders", work_order_routes())
        .route("/api/payments", post(payments::create))
        .route("/api/notifications", post(notifications::send))
        .route("/ws", get(realtime::connect))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Parse a work order id from a path segment. Malformed ids cannot name a
/// work order, so they are reported as not found.
fn work_order_id(raw: &str) -> Result<WorkOrderId, AppError> {
    WorkOrderId::parse(raw).map_err(|_| AppError::NotFound("Work order not found".to_string()))
}
