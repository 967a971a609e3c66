//! Firebase ID token verification via the Identity Toolkit REST API.
//!
//! Each token is looked up once and the resulting identity cached for at
//! most five minutes, and never past the token's own `exp` claim. Tokens
//! whose claims cannot be read are verified on every request.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use workorder_core::Email;

use super::{AuthError, TokenVerifier, VerifiedIdentity};
use crate::config::FirebaseConfig;

const LOOKUP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

/// Upper bound on how long a verified identity is reused.
const MAX_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    disabled: bool,
}

impl From<LookupUser> for VerifiedIdentity {
    fn from(user: LookupUser) -> Self {
        Self {
            subject: user.local_id,
            email: user.email.and_then(|e| Email::parse(&e).ok()),
            name: user.display_name.filter(|n| !n.trim().is_empty()),
        }
    }
}

/// The part of the token payload that bounds caching.
#[derive(Debug, Deserialize)]
struct Claims {
    exp: i64,
}

/// When the token stops being valid, read from its (unverified) payload.
///
/// Only consulted after the provider accepted the token.
fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

/// How long a verified token may be served from cache, if at all.
fn cache_ttl(token: &str, now: DateTime<Utc>) -> Option<Duration> {
    let remaining = (token_expiry(token)? - now).to_std().ok()?;
    (!remaining.is_zero()).then(|| remaining.min(MAX_CACHE_TTL))
}

#[derive(Debug, Clone)]
struct CachedIdentity {
    identity: VerifiedIdentity,
    ttl: Duration,
}

/// Per-entry expiry taken from the token.
struct TokenExpiry;

impl Expiry<String, CachedIdentity> for TokenExpiry {
    fn expire_after_create(
        &self,
        _token: &String,
        cached: &CachedIdentity,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(cached.ttl)
    }
}

/// Token verifier backed by Firebase Authentication.
#[derive(Clone)]
pub struct FirebaseVerifier {
    client: Client,
    api_key: SecretString,
    lookup_url: String,
    cache: Cache<String, CachedIdentity>,
}

impl std::fmt::Debug for FirebaseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseVerifier")
            .field("api_key", &"[REDACTED]")
            .field("cached_tokens", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl FirebaseVerifier {
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .expire_after(TokenExpiry)
            .build();

        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            lookup_url: LOOKUP_URL.to_string(),
            cache,
        }
    }

    async fn lookup(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let response = self
            .client
            .post(&self.lookup_url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&LookupRequest { id_token: token })
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            debug!(%status, "Identity provider refused token");
            return Err(AuthError::Invalid);
        }
        if !status.is_success() {
            warn!(%status, "Identity provider lookup failed");
            return Err(AuthError::Provider(format!("lookup returned {status}")));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        match body.users.into_iter().next() {
            Some(user) if user.disabled => {
                debug!("Token belongs to a disabled account");
                Err(AuthError::Invalid)
            }
            Some(user) => Ok(user.into()),
            None => Err(AuthError::Invalid),
        }
    }
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        if let Some(cached) = self.cache.get(token).await {
            return Ok(cached.identity);
        }

        let identity = self.lookup(token).await?;
        if let Some(ttl) = cache_ttl(token, Utc::now()) {
            let cached = CachedIdentity {
                identity: identity.clone(),
                ttl,
            };
            self.cache.insert(token.to_string(), cached).await;
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_user_maps_to_identity() {
        let body: LookupResponse = serde_json::from_str(
            r#"{"users":[{"localId":"abc123","email":"Sarah@YMCA.org","displayName":"Sarah Admin"}]}"#,
        )
        .unwrap();

        let identity = VerifiedIdentity::from(body.users.into_iter().next().unwrap());
        assert_eq!(identity.subject, "abc123");
        assert_eq!(identity.email.unwrap().as_str(), "sarah@ymca.org");
        assert_eq!(identity.name.as_deref(), Some("Sarah Admin"));
    }

    #[test]
    fn test_missing_users_defaults_empty() {
        let body: LookupResponse = serde_json::from_str("{}").unwrap();
        assert!(body.users.is_empty());
    }

    #[test]
    fn test_disabled_flag_defaults_false() {
        let body: LookupResponse =
            serde_json::from_str(r#"{"users":[{"localId":"a"},{"localId":"b","disabled":true}]}"#)
                .unwrap();
        assert!(!body.users[0].disabled);
        assert!(body.users[1].disabled);
    }

    fn token_expiring_at(exp: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"abc123","exp":{exp}}}"#));
        format!("eyJhbGciOiJSUzI1NiJ9.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_cache_ttl_is_capped() {
        let now = Utc::now();
        let token = token_expiring_at(now.timestamp() + 3600);
        assert_eq!(cache_ttl(&token, now), Some(MAX_CACHE_TTL));
    }

    #[test]
    fn test_cache_ttl_stops_at_token_expiry() {
        let now = DateTime::from_timestamp(1_750_000_000, 0).unwrap();
        let token = token_expiring_at(1_750_000_060);
        assert_eq!(cache_ttl(&token, now), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_expired_or_unreadable_tokens_are_not_cached() {
        let now = DateTime::from_timestamp(1_750_000_000, 0).unwrap();
        assert_eq!(cache_ttl(&token_expiring_at(1_749_999_000), now), None);
        assert_eq!(cache_ttl(&token_expiring_at(1_750_000_000), now), None);
        assert_eq!(cache_ttl("not-a-jwt", now), None);
        assert_eq!(cache_ttl("a.!!!.c", now), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let verifier = FirebaseVerifier::new(&FirebaseConfig {
            api_key: SecretString::from("AIzaSecretKey"),
        });
        let debug = format!("{verifier:?}");
        assert!(!debug.contains("AIzaSecretKey"));
    }
}
