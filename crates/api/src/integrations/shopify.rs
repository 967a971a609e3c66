//! Shopify Admin REST order lookups.
//!
//! The sync is read-only: it confirms the referenced order exists and
//! reports its display name and financial status.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use workorder_core::WorkOrderId;

use super::{DeliveryError, OrderSync, SyncedOrder};
use crate::config::ShopifyConfig;

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: OrderBody,
}

#[derive(Debug, Deserialize)]
struct OrderBody {
    id: i64,
    name: Option<String>,
    financial_status: Option<String>,
}

/// Order lookups against one Shopify store.
#[derive(Clone)]
pub struct ShopifyOrderSync {
    client: Client,
    base_url: String,
    access_token: SecretString,
}

impl std::fmt::Debug for ShopifyOrderSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyOrderSync")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ShopifyOrderSync {
    #[must_use]
    pub fn new(config: &ShopifyConfig) -> Self {
        let host = if config.store.contains('.') {
            config.store.clone()
        } else {
            format!("{}.myshopify.com", config.store)
        };

        Self {
            client: Client::new(),
            base_url: format!("https://{host}/admin/api/{}", config.api_version),
            access_token: config.access_token.clone(),
        }
    }

    /// Order references are free text; accept `#1001`, `1001` or a
    /// full `gid://shopify/Order/1001`.
    fn numeric_id(order_ref: &str) -> Option<&str> {
        let trimmed = order_ref.trim();
        let tail = trimmed.rsplit('/').next().unwrap_or(trimmed);
        let id = tail.trim_start_matches('#');
        (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
    }
}

#[async_trait]
impl OrderSync for ShopifyOrderSync {
    #[instrument(skip(self), fields(work_order_id = %work_order_id))]
    async fn sync(
        &self,
        work_order_id: WorkOrderId,
        order_ref: &str,
    ) -> Result<SyncedOrder, DeliveryError> {
        let id = Self::numeric_id(order_ref).ok_or_else(|| {
            DeliveryError::Rejected(format!("not a Shopify order id: {order_ref}"))
        })?;

        let response = self
            .client
            .get(format!("{}/orders/{id}.json", self.base_url))
            .header("X-Shopify-Access-Token", self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(DeliveryError::Rejected(format!("order {id} not found")));
            }
            status if !status.is_success() => {
                return Err(DeliveryError::Rejected(format!("Shopify returned {status}")));
            }
            _ => {}
        }

        let envelope: OrderEnvelope = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        debug!(order_id = envelope.order.id, "Order synced");
        Ok(SyncedOrder {
            order_ref: envelope.order.id.to_string(),
            name: envelope.order.name,
            financial_status: envelope.order.financial_status,
        })
    }
}
