//! Payment routes.
//!
//! Payments are recorded against a work order with status `pending`; no
//! processor is called from here.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use workorder_core::{PaymentAmount, WorkOrderId};

use super::work_order_id;
use crate::db::RepositoryError;
use crate::error::{AppError, JsonBody};
use crate::middleware::RequireAuth;
use crate::models::{NewPayment, Payment};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub work_order_id: WorkOrderId,
    pub amount: Decimal,
    pub payment_reference: Option<String>,
}

/// Record a payment.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    JsonBody(body): JsonBody<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let amount =
        PaymentAmount::new(body.amount).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let new = NewPayment {
        work_order_id: body.work_order_id,
        amount,
        payment_reference: body
            .payment_reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    };

    let payment = state.payments().create(&new).await.map_err(|e| match e {
        RepositoryError::NotFound => AppError::NotFound("Work order not found".to_string()),
        other => other.into(),
    })?;

    info!(payment_id = %payment.id, work_order_id = %payment.work_order_id, "Payment recorded");
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Payments for one work order, oldest first.
pub async fn for_work_order(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let id = work_order_id(&id)?;
    if state.work_orders().get(id).await?.is_none() {
        return Err(AppError::NotFound("Work order not found".to_string()));
    }
    Ok(Json(state.payments().list_for_work_order(id).await?))
}
