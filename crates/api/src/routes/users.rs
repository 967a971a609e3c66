//! User routes.

use axum::{
    Json,
    extract::{Path, State},
};

use workorder_core::UserId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{AssignedWorkOrder, UserDetail, UserWithCount};
use crate::state::AppState;

/// All users, newest first, with how many work orders each is assigned.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> Result<Json<Vec<UserWithCount>>, AppError> {
    Ok(Json(state.users().list_with_counts().await?))
}

/// One user and their assigned work orders, newest first.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<UserDetail>, AppError> {
    let not_found = || AppError::NotFound("User not found".to_string());
    let id = UserId::parse(&id).map_err(|_| not_found())?;

    let user = state.users().get(id).await?.ok_or_else(not_found)?;
    let work_orders = state
        .users()
        .assigned_work_orders(id)
        .await?
        .into_iter()
        .map(|w| AssignedWorkOrder {
            id: w.id,
            title: w.title,
            status: w.status,
            created_at: w.created_at,
        })
        .collect();

    Ok(Json(UserDetail { user, work_orders }))
}
