//! Bearer-token authentication extractors.
//!
//! The token is an identity-provider ID token. It is verified out of
//! process, the subject is mapped to a stored user, and the role comes from
//! that user record.
//!
//! Missing credential → 401. Invalid credential, unknown subject, or
//! insufficient role → 403.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::error::{AppError, set_sentry_user};
use crate::integrations::AuthError;
use crate::models::User;
use crate::state::AppState;

/// Extract the token from `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Verify a token and load the user it belongs to.
///
/// # Errors
///
/// `Invalid` if the provider rejects the token, `UnknownUser` if no user is
/// linked to its subject, `Provider` if verification or lookup fails.
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, AuthError> {
    let identity = state.verifier().verify(token).await?;

    let user = state
        .users()
        .get_by_firebase_uid(&identity.subject)
        .await
        .map_err(|e| AuthError::Provider(e.to_string()))?
        .ok_or(AuthError::UnknownUser)?;

    set_sentry_user(user.id, &user.email);
    Ok(user)
}

/// Extractor that requires a valid bearer token for a known user.
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::Missing)?;
        let user = authenticate(state, token).await.inspect_err(|e| {
            debug!(error = %e, path = %parts.uri.path(), "Authentication failed");
        })?;
        Ok(Self(user))
    }
}

/// Extractor that additionally requires the `admin` role.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            debug!(user_id = %user.id, role = %user.role, "Admin role required");
            return Err(AuthError::Forbidden.into());
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
