//! Manual notification route.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use workorder_core::{LogAction, WorkOrderId};

use crate::error::{AppError, JsonBody};
use crate::middleware::RequireAuth;
use crate::services::audit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub work_order_id: WorkOrderId,
    pub message: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    pub success: bool,
    pub message_sid: String,
    pub phone_number: String,
}

/// Send `message` verbatim and record it on the work order's trail.
///
/// Delivery is the point of this request, so a channel failure is a 502.
pub async fn send(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    JsonBody(body): JsonBody<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>, AppError> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message is required".to_string()));
    }

    let work_order = state
        .work_orders()
        .get(body.work_order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Work order not found".to_string()))?;

    let destination = body
        .phone_number
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map_or_else(
            || {
                state
                    .work_order_service()
                    .settings()
                    .default_destination
                    .clone()
            },
            str::to_string,
        );

    let delivery = state.dispatcher().send_raw(&destination, message).await?;

    state
        .audit()
        .append(
            work_order.id,
            LogAction::NotificationSent,
            &audit::notification_details(&destination, message),
        )
        .await?;

    info!(work_order_id = %work_order.id, message_sid = %delivery.message_id, "Manual notification sent");
    Ok(Json(SendNotificationResponse {
        success: true,
        message_sid: delivery.message_id,
        phone_number: destination,
    }))
}
