//! Health checks.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::services::ChannelStatus;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Body of the readiness check.
#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub channels: Channels,
    pub realtime_connections: usize,
}

#[derive(Debug, Serialize)]
pub struct Channels {
    pub sms: ChannelStatus,
    pub order_sync: ChannelStatus,
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable. Degraded
/// outbound channels are reported in the body but keep the status at 200.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let (code, status) = match state.work_orders().ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    let body = Readiness {
        status,
        channels: Channels {
            sms: state.dispatcher().status(),
            order_sync: state.work_order_service().sync_status(),
        },
        realtime_connections: state.broadcaster().connection_count().await,
    };
    (code, Json(body))
}
