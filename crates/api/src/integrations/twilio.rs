//! Twilio Programmable Messaging client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{DeliveryError, NotificationChannel};
use crate::config::TwilioConfig;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    code: Option<i64>,
    message: Option<String>,
}

/// SMS sender backed by the Twilio Messages API.
#[derive(Clone)]
pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    base_url: String,
}

impl std::fmt::Debug for TwilioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioClient")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .finish_non_exhaustive()
    }
}

impl TwilioClient {
    #[must_use]
    pub fn new(config: &TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            base_url: TWILIO_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API host (local mocks).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[async_trait]
impl NotificationChannel for TwilioClient {
    #[instrument(skip(self, body), fields(to = %to))]
    async fn send(&self, to: &str, body: &str) -> Result<String, DeliveryError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .map(|e| {
                    format!(
                        "{} ({})",
                        e.message.unwrap_or_else(|| "no message".to_string()),
                        e.code.map_or_else(|| "no code".to_string(), |c| c.to_string())
                    )
                })
                .unwrap_or_else(|| status.to_string());
            warn!(%status, %detail, "Twilio rejected message");
            return Err(DeliveryError::Rejected(detail));
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        debug!(sid = %message.sid, "SMS queued");
        Ok(message.sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: SecretString::from("tok"),
            from_number: "+15550001111".to_string(),
        }
    }

    #[test]
    fn test_messages_url() {
        let client = TwilioClient::new(&config()).with_base_url("http://localhost:4010/");
        assert_eq!(
            client.messages_url(),
            "http://localhost:4010/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", TwilioClient::new(&config()));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("tok\""));
    }
}
