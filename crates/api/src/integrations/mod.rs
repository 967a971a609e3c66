//! Outbound integrations.
//!
//! # Integrations
//!
//! - `twilio` - SMS delivery ([`NotificationChannel`])
//! - `shopify` - Admin REST order lookups ([`OrderSync`])
//! - `firebase` - Identity Toolkit token verification ([`TokenVerifier`])
//!
//! Services hold these as trait objects so tests can swap in fakes.

pub mod firebase;
pub mod shopify;
pub mod twilio;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use workorder_core::{Email, WorkOrderId};

pub use firebase::FirebaseVerifier;
pub use shopify::ShopifyOrderSync;
pub use twilio::TwilioClient;

/// Errors from an outbound delivery (SMS send, order sync).
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The provider answered and refused the request.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// The request never got a usable answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// No answer within the configured timeout.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The integration has no credentials.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Errors verifying a caller's credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer credential on the request.
    #[error("missing credential")]
    Missing,

    /// The identity provider did not accept the credential.
    #[error("invalid credential")]
    Invalid,

    /// Credential is valid but no user is linked to its subject.
    #[error("unknown user")]
    UnknownUser,

    /// User lacks the role required for this operation.
    #[error("insufficient role")]
    Forbidden,

    /// The identity provider could not be reached.
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Sends a text body to a destination, returning the provider's message id.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<String, DeliveryError>;
}

/// An external order as seen by the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedOrder {
    pub order_ref: String,
    /// Display name such as `#1001`.
    pub name: Option<String>,
    pub financial_status: Option<String>,
}

/// Looks up the external order referenced by a work order.
#[async_trait]
pub trait OrderSync: Send + Sync {
    async fn sync(
        &self,
        work_order_id: WorkOrderId,
        order_ref: &str,
    ) -> Result<SyncedOrder, DeliveryError>;
}

/// Identity established from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Identity-provider subject (Firebase uid).
    pub subject: String,
    pub email: Option<Email>,
    pub name: Option<String>,
}

/// Verifies bearer credentials with the identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}
