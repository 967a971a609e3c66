//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string (`WORKORDER_DATABASE_URL` takes precedence)
//! - `FIREBASE_API_KEY` - Web API key used to verify Firebase ID tokens
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 3001)
//! - `CORS_ORIGIN` - Frontend origin allowed by CORS (default: <http://localhost:3000>)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `DEFAULT_NOTIFICATION_NUMBER` - SMS destination for work-order notifications
//! - `SIDE_EFFECT_TIMEOUT_SECS` - Timeout for SMS and Shopify calls (default: 10)
//! - `DEGRADED_AFTER_FAILURES` - Consecutive failures before a channel is reported degraded (default: 3)
//! - `WORK_ORDER_TRANSITIONS` - `permissive` (default) or `forward`
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (Twilio - enables SMS notifications)
//! - `TWILIO_ACCOUNT_SID`
//! - `TWILIO_AUTH_TOKEN`
//! - `TWILIO_FROM_NUMBER`
//!
//! ## Optional (Shopify - enables order sync)
//! - `SHOPIFY_STORE` - Store domain (e.g., ymca-facilities.myshopify.com)
//! - `SHOPIFY_ACCESS_TOKEN` - Admin API access token
//! - `SHOPIFY_API_VERSION` - API version (default: 2025-01)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use workorder_core::TransitionPolicy;

use crate::services::{DEFAULT_NOTIFICATION_NUMBER, PipelineSettings};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_SHOPIFY_API_VERSION: &str = "2025-01";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Frontend origin allowed by CORS
    pub cors_origin: String,
    /// Emit JSON logs instead of text
    pub json_logs: bool,
    /// Firebase token verification
    pub firebase: FirebaseConfig,
    /// Twilio SMS (optional - notifications are skipped without it)
    pub twilio: Option<TwilioConfig>,
    /// Shopify order sync (optional - sync is skipped without it)
    pub shopify: Option<ShopifyConfig>,
    /// Work-order pipeline behavior
    pub pipeline: PipelineSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Firebase configuration. `Debug` redacts the key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Web API key for the Identity Toolkit
    pub api_key: SecretString,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Twilio configuration. `Debug` redacts the auth token.
#[derive(Clone)]
pub struct TwilioConfig {
    /// Account SID (AC...)
    pub account_sid: String,
    /// Auth token
    pub auth_token: SecretString,
    /// Sending phone number in E.164 form
    pub from_number: String,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .finish()
    }
}

/// Shopify Admin API configuration. `Debug` redacts the access token.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Store domain
    pub store: String,
    /// Admin API access token
    pub access_token: SecretString,
    /// API version (e.g., 2025-01)
    pub api_version: String,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("store", &self.store)
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("WORKORDER_DATABASE_URL")?;
        let host = parse_env("API_HOST", "127.0.0.1")?;
        let port = parse_env("API_PORT", "3001")?;
        let cors_origin = get_env_or_default("CORS_ORIGIN", "http://localhost:3000");
        let json_logs = get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

        let firebase = FirebaseConfig {
            api_key: get_validated_secret("FIREBASE_API_KEY")?,
        };
        let twilio = TwilioConfig::from_env()?;
        let shopify = ShopifyConfig::from_env()?;
        let pipeline = pipeline_from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            cors_origin,
            json_logs,
            firebase,
            twilio,
            shopify,
            pipeline,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl TwilioConfig {
    /// All three variables must be set together, or none.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let sid = get_optional_env("TWILIO_ACCOUNT_SID");
        let token = get_optional_env("TWILIO_AUTH_TOKEN");
        let from = get_optional_env("TWILIO_FROM_NUMBER");

        match (sid, token, from) {
            (Some(account_sid), Some(token), Some(from_number)) => {
                validate_secret_strength(&token, "TWILIO_AUTH_TOKEN")?;
                Ok(Some(Self {
                    account_sid,
                    auth_token: SecretString::from(token),
                    from_number,
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "TWILIO_*".to_string(),
                "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_FROM_NUMBER must be set together"
                    .to_string(),
            )),
        }
    }
}

impl ShopifyConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("SHOPIFY_STORE"),
            get_optional_env("SHOPIFY_ACCESS_TOKEN"),
        ) {
            (Some(store), Some(token)) => {
                validate_secret_strength(&token, "SHOPIFY_ACCESS_TOKEN")?;
                Ok(Some(Self {
                    store,
                    access_token: SecretString::from(token),
                    api_version: get_env_or_default(
                        "SHOPIFY_API_VERSION",
                        DEFAULT_SHOPIFY_API_VERSION,
                    ),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "SHOPIFY_*".to_string(),
                "Both SHOPIFY_STORE and SHOPIFY_ACCESS_TOKEN must be set together".to_string(),
            )),
        }
    }
}

fn pipeline_from_env() -> Result<PipelineSettings, ConfigError> {
    let timeout_secs: u64 = parse_env("SIDE_EFFECT_TIMEOUT_SECS", "10")?;
    if timeout_secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "SIDE_EFFECT_TIMEOUT_SECS".to_string(),
            "must be at least 1".to_string(),
        ));
    }

    Ok(PipelineSettings {
        transition_policy: parse_env::<TransitionPolicy>("WORK_ORDER_TRANSITIONS", "permissive")?,
        default_destination: get_env_or_default(
            "DEFAULT_NOTIFICATION_NUMBER",
            DEFAULT_NOTIFICATION_NUMBER,
        ),
        side_effect_timeout: Duration::from_secs(timeout_secs),
        degraded_after: parse_env("DEGRADED_AFTER_FAILURES", "3")?,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/workorders"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            cors_origin: "http://localhost:3000".to_string(),
            json_logs: false,
            firebase: FirebaseConfig {
                api_key: SecretString::from("AIzaSyD3-kq9Vb1X"),
            },
            twilio: Some(TwilioConfig {
                account_sid: "AC0123".to_string(),
                auth_token: SecretString::from("twilio-auth-token-value"),
                from_number: "+15005550006".to_string(),
            }),
            shopify: None,
            pipeline: PipelineSettings::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!(shannon_entropy("").abs() < f64::EPSILON);
        assert!(shannon_entropy("zzzzzz").abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_placeholder_secret_is_rejected() {
        let err = validate_secret_strength("your-firebase-key", "FIREBASE_API_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(ref var, _) if var == "FIREBASE_API_KEY"));
    }

    #[test]
    fn test_low_entropy_secret_is_rejected() {
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaabbbbbbbbbb", "TWILIO_AUTH_TOKEN").is_err());
    }

    #[test]
    fn test_random_secret_is_accepted() {
        assert!(validate_secret_strength("AIzaSyB8x-Qm3KpL7vR2tN9wZc4", "FIREBASE_API_KEY").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = sample_config().socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3001");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", sample_config());

        assert!(debug_output.contains("AC0123"));
        assert!(debug_output.contains("+15005550006"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("twilio-auth-token-value"));
        assert!(!debug_output.contains("AIzaSyD3-kq9Vb1X"));
    }
}
