//! Login and profile routes.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use workorder_core::UserRole;

use crate::db::RepositoryError;
use crate::error::{AppError, JsonBody};
use crate::integrations::AuthError;
use crate::middleware::RequireAuth;
use crate::models::{NewUser, User, UserSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "idToken")]
    pub id_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserSummary,
}

/// Verify an ID token and find or create the matching user.
///
/// First sign-in creates a `worker`; admins are promoted out of band.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let token = body
        .id_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("ID token required".to_string()))?;

    let identity = state.verifier().verify(token).await.map_err(|e| match e {
        AuthError::Provider(msg) => AppError::Internal(msg),
        _ => AppError::Unauthorized("Invalid token".to_string()),
    })?;

    if let Some(user) = state.users().get_by_firebase_uid(&identity.subject).await? {
        return Ok(Json(LoginResponse {
            user: UserSummary::from(&user),
        }));
    }

    let email = identity
        .email
        .ok_or_else(|| AppError::BadRequest("Identity has no email address".to_string()))?;
    let name = identity
        .name
        .unwrap_or_else(|| email.local_part().to_string());

    let new = NewUser {
        name,
        email,
        role: UserRole::Worker,
        firebase_uid: identity.subject,
    };
    let user = match state.users().create(&new).await {
        Ok(user) => user,
        // Lost a race with a concurrent first login for the same subject.
        Err(RepositoryError::Conflict(_)) => state
            .users()
            .get_by_firebase_uid(&new.firebase_uid)
            .await?
            .ok_or_else(|| AppError::BadRequest("Email already registered".to_string()))?,
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "User created on first login");
    Ok(Json(LoginResponse {
        user: UserSummary::from(&user),
    }))
}

/// The authenticated caller.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}
