//! Work order create/update orchestration.
//!
//! Each mutation runs the same pipeline:
//!
//! 1. Validate input (trimmed non-empty text, known status, existing assignee)
//! 2. Write the record and its audit entry in one transaction
//! 3. Best-effort side effects: order sync and SMS notification (concurrently,
//!    each under a timeout), then realtime broadcast
//!
//! Side effects never roll back the mutation. Their results are reported as
//! [`SideEffectOutcome`] values on the returned [`MutationOutcome`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use workorder_core::{LogAction, UserId, WorkOrderId, WorkOrderStatus};

use super::PipelineSettings;
use super::audit;
use super::degraded::{ChannelHealth, ChannelStatus};
use super::notifications::{DispatchError, NotificationDispatcher};
use super::realtime::{Broadcaster, Event, Topic};
use crate::db::{AuditLog, RepositoryError, UserStore, WorkOrderStore};
use crate::integrations::{DeliveryError, OrderSync};
use crate::models::{NewWorkOrder, User, WorkOrder, WorkOrderLog, WorkOrderPatch};

const ASSIGNED_TEXT: &str = "has been assigned to you";

/// Errors from the work order pipeline.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation; nothing was written.
    #[error("{0}")]
    Validation(String),

    #[error("work order not found")]
    NotFound,

    /// The status change is not allowed by the transition policy.
    #[error("{0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Raw create request. Unknown fields (including any `status`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWorkOrderInput {
    pub title: String,
    pub description: String,
    pub assigned_user_id: Option<String>,
    pub shopify_order_id: Option<String>,
}

/// Raw partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkOrderInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub assigned_user_id: Option<String>,
}

/// What happened to one side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SideEffectOutcome {
    Skipped { reason: String },
    Delivered { reference: String },
    Failed { error: String },
}

impl SideEffectOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Side effect results for one mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffects {
    pub notification: SideEffectOutcome,
    pub order_sync: SideEffectOutcome,
    /// Subscribers that accepted at least one broadcast event.
    pub broadcast_recipients: usize,
}

/// A committed mutation and what its side effects did.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    #[serde(flatten)]
    pub work_order: WorkOrder,
    /// The audit entry written with the mutation.
    #[serde(skip)]
    pub log: WorkOrderLog,
    pub side_effects: SideEffects,
}

/// Orchestrates work order mutations.
pub struct WorkOrderService {
    work_orders: Arc<dyn WorkOrderStore>,
    users: Arc<dyn UserStore>,
    audit: Arc<dyn AuditLog>,
    dispatcher: Arc<NotificationDispatcher>,
    order_sync: Option<Arc<dyn OrderSync>>,
    broadcaster: Arc<Broadcaster>,
    settings: PipelineSettings,
    sync_health: ChannelHealth,
}

impl std::fmt::Debug for WorkOrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkOrderService")
            .field("dispatcher", &self.dispatcher)
            .field("order_sync", &self.order_sync.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl WorkOrderService {
    #[must_use]
    pub fn new(
        work_orders: Arc<dyn WorkOrderStore>,
        users: Arc<dyn UserStore>,
        audit: Arc<dyn AuditLog>,
        dispatcher: Arc<NotificationDispatcher>,
        order_sync: Option<Arc<dyn OrderSync>>,
        broadcaster: Arc<Broadcaster>,
        settings: PipelineSettings,
    ) -> Self {
        let sync_health = ChannelHealth::new("order_sync", settings.degraded_after);
        Self {
            work_orders,
            users,
            audit,
            dispatcher,
            order_sync,
            broadcaster,
            settings,
            sync_health,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Order sync channel state.
    #[must_use]
    pub fn sync_status(&self) -> ChannelStatus {
        self.sync_health.status(self.order_sync.is_some())
    }

    /// Create a work order. It always starts `open`.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, `Store` if the write fails.
    #[instrument(skip(self, input, actor), fields(actor = %actor.email))]
    pub async fn create_work_order(
        &self,
        input: CreateWorkOrderInput,
        actor: &User,
    ) -> Result<MutationOutcome, ServiceError> {
        let new = NewWorkOrder {
            title: required_text("title", &input.title)?,
            description: required_text("description", &input.description)?,
            assigned_user_id: self
                .resolve_assignee(input.assigned_user_id.as_deref())
                .await?,
            shopify_order_id: input
                .shopify_order_id
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        };

        let details = audit::created_details(&actor.email);
        let (work_order, log) = self
            .work_orders
            .insert(&new, &details)
            .await
            .map_err(|e| match e {
                RepositoryError::MissingReference(what) => {
                    ServiceError::Validation(format!("{what} does not exist"))
                }
                other => ServiceError::Store(other),
            })?;

        info!(work_order_id = %work_order.id, "Work order created");

        let (order_sync, notification) = tokio::join!(
            self.sync_order(&work_order),
            self.notify_assignee(&work_order),
        );
        let broadcast_recipients = self.broadcast_created(&work_order).await;

        Ok(MutationOutcome {
            work_order,
            log,
            side_effects: SideEffects {
                notification,
                order_sync,
                broadcast_recipients,
            },
        })
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, `NotFound` for an unknown id,
    /// `InvalidTransition` when the policy refuses the status change,
    /// `Store` if the write fails. Nothing is written on error.
    #[instrument(skip(self, input, actor), fields(work_order_id = %id, actor = %actor.email))]
    pub async fn update_work_order(
        &self,
        id: WorkOrderId,
        input: UpdateWorkOrderInput,
        actor: &User,
    ) -> Result<MutationOutcome, ServiceError> {
        let patch = WorkOrderPatch {
            title: input
                .title
                .as_deref()
                .map(|t| required_text("title", t))
                .transpose()?,
            description: input
                .description
                .as_deref()
                .map(|d| required_text("description", d))
                .transpose()?,
            status: input.status.as_deref().map(parse_status).transpose()?,
            assigned_user_id: self
                .resolve_assignee(input.assigned_user_id.as_deref())
                .await?,
        };

        let policy = self.settings.transition_policy;
        let review = |before: &WorkOrder| {
            let target = before.patched(&patch);
            if !policy.allows(before.status, target.status) {
                return Err(format!(
                    "cannot change status from {} to {}",
                    before.status, target.status
                ));
            }
            Ok(audit::updated_details(&actor.email, before, &target))
        };

        let updated = self
            .work_orders
            .update(id, &patch, &review)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ServiceError::NotFound,
                RepositoryError::MissingReference(what) => {
                    ServiceError::Validation(format!("{what} does not exist"))
                }
                RepositoryError::Rejected(reason) => ServiceError::InvalidTransition(reason),
                other => ServiceError::Store(other),
            })?;

        let (before, after) = (&updated.before, &updated.after);
        info!(from = %before.status, to = %after.status, "Work order updated");

        let notification = if before.status == after.status {
            SideEffectOutcome::skipped("status unchanged")
        } else {
            self.dispatch(after.id, &format!("status changed to {}", after.status))
                .await
        };

        let newly_assigned = after
            .assigned_user_id
            .filter(|user| before.assigned_user_id != Some(*user));
        let broadcast_recipients = self.broadcast_updated(after, newly_assigned).await;

        Ok(MutationOutcome {
            work_order: updated.after,
            log: updated.log,
            side_effects: SideEffects {
                notification,
                order_sync: SideEffectOutcome::skipped("not applicable to updates"),
                broadcast_recipients,
            },
        })
    }

    /// Parse an assignee reference and check the user exists.
    async fn resolve_assignee(&self, raw: Option<&str>) -> Result<Option<UserId>, ServiceError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let id = UserId::parse(raw)
            .map_err(|_| ServiceError::Validation("assigned_user_id must be a UUID".to_string()))?;

        match self.users.get(id).await? {
            Some(_) => Ok(Some(id)),
            None => Err(ServiceError::Validation(
                "assigned user does not exist".to_string(),
            )),
        }
    }

    async fn notify_assignee(&self, work_order: &WorkOrder) -> SideEffectOutcome {
        if work_order.assigned_user_id.is_none() {
            return SideEffectOutcome::skipped("no assignee");
        }
        self.dispatch(work_order.id, ASSIGNED_TEXT).await
    }

    async fn dispatch(&self, id: WorkOrderId, text: &str) -> SideEffectOutcome {
        match self
            .dispatcher
            .notify(id, text, &self.settings.default_destination)
            .await
        {
            Ok(delivery) => SideEffectOutcome::Delivered {
                reference: delivery.message_id,
            },
            Err(DispatchError::Delivery(DeliveryError::NotConfigured(what))) => {
                SideEffectOutcome::skipped(format!("{what} not configured"))
            }
            Err(e) => SideEffectOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn sync_order(&self, work_order: &WorkOrder) -> SideEffectOutcome {
        let Some(order_ref) = work_order.shopify_order_id.as_deref() else {
            return SideEffectOutcome::skipped("no order reference");
        };
        let Some(sync) = &self.order_sync else {
            debug!("Order sync not configured, skipping");
            return SideEffectOutcome::skipped("order sync not configured");
        };

        let timeout = self.settings.side_effect_timeout;
        let result = tokio::time::timeout(timeout, sync.sync(work_order.id, order_ref))
            .await
            .unwrap_or(Err(DeliveryError::TimedOut(timeout)));

        let synced = match result {
            Ok(synced) => {
                self.sync_health.record_success();
                synced
            }
            Err(e) => {
                self.sync_health.record_failure();
                warn!(error = %e, order_ref, "Order sync failed");
                return SideEffectOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let reference = synced.name.unwrap_or(synced.order_ref);
        match self
            .audit
            .append(
                work_order.id,
                LogAction::ShopifySynced,
                &audit::synced_details(order_ref),
            )
            .await
        {
            Ok(_) => SideEffectOutcome::Delivered { reference },
            Err(e) => {
                warn!(error = %e, %reference, "Failed to record order sync");
                SideEffectOutcome::Failed {
                    error: format!("synced as {reference} but not recorded: {e}"),
                }
            }
        }
    }

    async fn broadcast_created(&self, work_order: &WorkOrder) -> usize {
        let mut recipients = self
            .broadcaster
            .publish(
                Topic::WorkOrder(work_order.id),
                Event::work_order_updated(
                    work_order.id,
                    json!({ "action": "created", "work_order": work_order }),
                ),
            )
            .await;

        if let Some(user) = work_order.assigned_user_id {
            recipients += self.notify_user(user, work_order).await;
        }

        recipients += self
            .broadcaster
            .publish(
                Topic::Role(workorder_core::UserRole::Admin),
                Event::admin_notification(json!({
                    "type": "work_order_created",
                    "work_order_id": work_order.id,
                    "title": work_order.title,
                })),
            )
            .await;

        recipients
    }

    async fn broadcast_updated(&self, work_order: &WorkOrder, newly_assigned: Option<UserId>) -> usize {
        let mut recipients = self
            .broadcaster
            .publish(
                Topic::WorkOrder(work_order.id),
                Event::work_order_updated(
                    work_order.id,
                    json!({ "action": "updated", "work_order": work_order }),
                ),
            )
            .await;

        if let Some(user) = newly_assigned {
            recipients += self.notify_user(user, work_order).await;
        }
        recipients
    }

    async fn notify_user(&self, user: UserId, work_order: &WorkOrder) -> usize {
        self.broadcaster
            .publish(
                Topic::User(user),
                Event::notification(json!({
                    "type": "work_order_assigned",
                    "work_order_id": work_order.id,
                    "title": work_order.title,
                    "message": format!("Work order \"{}\" {ASSIGNED_TEXT}", work_order.title),
                })),
            )
            .await
    }
}

fn required_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn parse_status(raw: &str) -> Result<WorkOrderStatus, ServiceError> {
    raw.parse::<WorkOrderStatus>()
        .map_err(|e| ServiceError::Validation(e.to_string()))
}
