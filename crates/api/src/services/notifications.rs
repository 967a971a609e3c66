//! Work-order notifications.
//!
//! Formats the standard work-order SMS and hands it to the configured
//! channel under a timeout. Failures are counted for degraded-mode
//! reporting and returned to the caller; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use workorder_core::WorkOrderId;

use super::degraded::{ChannelHealth, ChannelStatus};
use crate::db::{RepositoryError, WorkOrderStore};
use crate::integrations::{DeliveryError, NotificationChannel};

/// A message the channel accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub destination: String,
    pub body: String,
    /// Provider message id (Twilio SID).
    pub message_id: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("work order not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] RepositoryError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Render the standard work-order SMS body.
///
/// ```
/// use workorder_api::services::notifications::format_message;
/// use workorder_core::WorkOrderId;
///
/// let id: WorkOrderId = "5f0c7e1a-2b3c-4d5e-8f90-a1b2c3d4e5f6".parse().unwrap();
/// assert_eq!(
///     format_message(id, "has been assigned to you"),
///     "WorkOrderWizard: Work Order #c3d4e5f6 has been assigned to you. Check your dashboard for details."
/// );
/// ```
#[must_use]
pub fn format_message(work_order_id: WorkOrderId, text: &str) -> String {
    format!(
        "WorkOrderWizard: Work Order #{} {text}. Check your dashboard for details.",
        work_order_id.short()
    )
}

/// Sends work-order notifications over an optional channel.
pub struct NotificationDispatcher {
    work_orders: Arc<dyn WorkOrderStore>,
    channel: Option<Arc<dyn NotificationChannel>>,
    timeout: Duration,
    health: ChannelHealth,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("configured", &self.channel.is_some())
            .field("timeout", &self.timeout)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(
        work_orders: Arc<dyn WorkOrderStore>,
        channel: Option<Arc<dyn NotificationChannel>>,
        timeout: Duration,
        degraded_after: u32,
    ) -> Self {
        Self {
            work_orders,
            channel,
            timeout,
            health: ChannelHealth::new("sms", degraded_after),
        }
    }

    /// Whether a channel is wired up at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.channel.is_some()
    }

    #[must_use]
    pub const fn health(&self) -> &ChannelHealth {
        &self.health
    }

    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        self.health.status(self.is_configured())
    }

    /// Notify about a work order: resolve it, format the standard body, send.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Delivery` when the channel rejects,
    /// times out, or is not configured.
    #[instrument(skip(self, text), fields(work_order_id = %work_order_id))]
    pub async fn notify(
        &self,
        work_order_id: WorkOrderId,
        text: &str,
        destination: &str,
    ) -> Result<Delivery, DispatchError> {
        let work_order = self
            .work_orders
            .get(work_order_id)
            .await?
            .ok_or(DispatchError::NotFound)?;

        let body = format_message(work_order.id, text);
        self.send_raw(destination, &body).await
    }

    /// Send `body` verbatim.
    ///
    /// # Errors
    ///
    /// `Delivery` when the channel rejects, times out, or is not configured.
    #[instrument(skip(self, body))]
    pub async fn send_raw(&self, destination: &str, body: &str) -> Result<Delivery, DispatchError> {
        let Some(channel) = &self.channel else {
            debug!("SMS not configured, skipping send");
            return Err(DeliveryError::NotConfigured("sms").into());
        };

        let result = match tokio::time::timeout(self.timeout, channel.send(destination, body)).await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::TimedOut(self.timeout)),
        };

        match result {
            Ok(message_id) => {
                self.health.record_success();
                Ok(Delivery {
                    destination: destination.to_string(),
                    body: body.to_string(),
                    message_id,
                })
            }
            Err(e) => {
                self.health.record_failure();
                warn!(error = %e, "SMS delivery failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewWorkOrder;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
        stall: bool,
    }

    #[async_trait]
    impl NotificationChannel for Outbox {
        async fn send(&self, to: &str, body: &str) -> Result<String, DeliveryError> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(DeliveryError::Rejected("invalid number".to_string()));
            }
            let mut sent = self.sent.lock().await;
            sent.push((to.to_string(), body.to_string()));
            Ok(format!("SM{}", sent.len()))
        }
    }

    async fn seeded() -> (Arc<MemoryStore>, WorkOrderId) {
        let store = Arc::new(MemoryStore::new());
        let (work_order, _) = store
            .insert(
                &NewWorkOrder {
                    title: "Fix sink".to_string(),
                    description: "Leaking".to_string(),
                    assigned_user_id: None,
                    shopify_order_id: None,
                },
                "created",
            )
            .await
            .unwrap();
        (store, work_order.id)
    }

    #[tokio::test]
    async fn test_notify_formats_and_sends() {
        let (store, id) = seeded().await;
        let outbox = Arc::new(Outbox::default());
        let dispatcher =
            NotificationDispatcher::new(store, Some(outbox.clone()), Duration::from_secs(1), 3);

        let delivery = dispatcher
            .notify(id, "status changed to completed", "+15550001111")
            .await
            .unwrap();

        assert_eq!(delivery.message_id, "SM1");
        let sent = outbox.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+15550001111");
        assert!(sent[0].1.contains(&format!("#{}", id.short())));
        assert!(sent[0].1.ends_with("status changed to completed. Check your dashboard for details."));
    }

    #[tokio::test]
    async fn test_notify_unknown_work_order() {
        let (store, _) = seeded().await;
        let outbox = Arc::new(Outbox::default());
        let dispatcher =
            NotificationDispatcher::new(store, Some(outbox.clone()), Duration::from_secs(1), 3);

        let result = dispatcher.notify(WorkOrderId::random(), "x", "+1").await;
        assert!(matches!(result, Err(DispatchError::NotFound)));
        assert!(outbox.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_mark_channel_degraded() {
        let (store, id) = seeded().await;
        let outbox = Arc::new(Outbox {
            fail: true,
            ..Outbox::default()
        });
        let dispatcher = NotificationDispatcher::new(store, Some(outbox), Duration::from_secs(1), 2);

        for _ in 0..2 {
            let result = dispatcher.notify(id, "x", "+1").await;
            assert!(matches!(
                result,
                Err(DispatchError::Delivery(DeliveryError::Rejected(_)))
            ));
        }
        assert!(dispatcher.health().is_degraded());
    }

    #[tokio::test]
    async fn test_stalled_channel_times_out() {
        let (store, _) = seeded().await;
        let outbox = Arc::new(Outbox {
            stall: true,
            ..Outbox::default()
        });
        let dispatcher = NotificationDispatcher::new(store, Some(outbox), Duration::from_millis(50), 3);

        let result = dispatcher.send_raw("+1", "hello").await;
        assert!(matches!(
            result,
            Err(DispatchError::Delivery(DeliveryError::TimedOut(_)))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_channel() {
        let (store, id) = seeded().await;
        let dispatcher = NotificationDispatcher::new(store, None, Duration::from_secs(1), 3);
        assert!(!dispatcher.is_configured());

        let result = dispatcher.notify(id, "x", "+1").await;
        assert!(matches!(
            result,
            Err(DispatchError::Delivery(DeliveryError::NotConfigured(_)))
        ));
    }
}
