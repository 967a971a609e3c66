//! In-process store backing the test suites.
//!
//! Mirrors the `PostgreSQL` semantics that callers rely on: foreign keys,
//! unique users, atomic record + audit writes, and serialized updates
//! (one mutex guards everything, standing in for the row lock).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use workorder_core::{
    LogAction, PaymentId, PaymentStatus, UserId, WorkOrderId, WorkOrderLogId, WorkOrderStatus,
};

use super::{
    AuditLog, PaymentStore, RepositoryError, UpdateReview, UpdatedWorkOrder, UserStore,
    WorkOrderStore,
};
use crate::models::{
    NewPayment, NewUser, NewWorkOrder, PageRequest, Payment, User, UserCounts, UserWithCount,
    WorkOrder, WorkOrderFilter, WorkOrderLog, WorkOrderPatch,
};

#[derive(Debug, Default)]
struct Tables {
    /// All vectors are kept in insertion order.
    users: Vec<User>,
    work_orders: Vec<WorkOrder>,
    logs: Vec<WorkOrderLog>,
    payments: Vec<Payment>,
}

impl Tables {
    fn work_order_exists(&self, id: WorkOrderId) -> bool {
        self.work_orders.iter().any(|w| w.id == id)
    }

    fn user_exists(&self, id: UserId) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn push_log(
        &mut self,
        work_order_id: WorkOrderId,
        action: LogAction,
        details: &str,
    ) -> WorkOrderLog {
        let log = WorkOrderLog {
            id: WorkOrderLogId::random(),
            work_order_id,
            action,
            details: details.to_string(),
            created_at: Utc::now(),
        };
        self.logs.push(log.clone());
        log
    }
}

/// Store that keeps everything in memory. Cloning shares the same tables.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: std::sync::Arc<Mutex<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit entries across all work orders.
    pub async fn log_count(&self) -> usize {
        self.tables.lock().await.logs.len()
    }
}

fn newest_first<T: Clone>(rows: &[T], keep: impl Fn(&T) -> bool) -> Vec<T> {
    rows.iter().rev().filter(|row| keep(row)).cloned().collect()
}

#[async_trait]
impl WorkOrderStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn get(&self, id: WorkOrderId) -> Result<Option<WorkOrder>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.work_orders.iter().find(|w| w.id == id).cloned())
    }

    async fn list(
        &self,
        filter: WorkOrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<WorkOrder>, u64), RepositoryError> {
        let tables = self.tables.lock().await;
        let matching = newest_first(&tables.work_orders, |w| {
            filter.status.is_none_or(|s| w.status == s)
                && filter
                    .assigned_user_id
                    .is_none_or(|u| w.assigned_user_id == Some(u))
        });

        let total = matching.len() as u64;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = page.limit() as usize;
        Ok((matching.into_iter().skip(skip).take(take).collect(), total))
    }

    async fn insert(
        &self,
        new: &NewWorkOrder,
        details: &str,
    ) -> Result<(WorkOrder, WorkOrderLog), RepositoryError> {
        let mut tables = self.tables.lock().await;
        if new.assigned_user_id.is_some_and(|u| !tables.user_exists(u)) {
            return Err(RepositoryError::MissingReference("assigned user"));
        }

        let now = Utc::now();
        let work_order = WorkOrder {
            id: WorkOrderId::random(),
            title: new.title.clone(),
            description: new.description.clone(),
            status: WorkOrderStatus::Open,
            assigned_user_id: new.assigned_user_id,
            shopify_order_id: new.shopify_order_id.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.work_orders.push(work_order.clone());
        let log = tables.push_log(work_order.id, LogAction::Created, details);

        Ok((work_order, log))
    }

    async fn update(
        &self,
        id: WorkOrderId,
        patch: &WorkOrderPatch,
        review: &UpdateReview<'_>,
    ) -> Result<UpdatedWorkOrder, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.work_order_exists(id) {
            return Err(RepositoryError::NotFound);
        }
        if patch.assigned_user_id.is_some_and(|u| !tables.user_exists(u)) {
            return Err(RepositoryError::MissingReference("assigned user"));
        }

        let slot = tables
            .work_orders
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(RepositoryError::NotFound)?;

        let before = slot.clone();
        let details = review(&before).map_err(RepositoryError::Rejected)?;
        let after = WorkOrder {
            updated_at: Utc::now(),
            ..before.patched(patch)
        };
        *slot = after.clone();

        let log = tables.push_log(id, LogAction::Updated, &details);
        Ok(UpdatedWorkOrder { before, after, log })
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn append(
        &self,
        work_order_id: WorkOrderId,
        action: LogAction,
        details: &str,
    ) -> Result<WorkOrderLog, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.work_order_exists(work_order_id) {
            return Err(RepositoryError::NotFound);
        }
        Ok(tables.push_log(work_order_id, action, details))
    }

    async fn list(&self, work_order_id: WorkOrderId) -> Result<Vec<WorkOrderLog>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .logs
            .iter()
            .filter(|log| log.work_order_id == work_order_id)
            .cloned()
            .collect())
    }

    async fn recent(
        &self,
        ids: &[WorkOrderId],
        per_order: usize,
    ) -> Result<HashMap<WorkOrderId, Vec<WorkOrderLog>>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut grouped: HashMap<WorkOrderId, Vec<WorkOrderLog>> = HashMap::new();
        for log in tables.logs.iter().rev() {
            if !ids.contains(&log.work_order_id) {
                continue;
            }
            let entries = grouped.entry(log.work_order_id).or_default();
            if entries.len() < per_order {
                entries.push(log.clone());
            }
        }
        Ok(grouped)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn get_by_firebase_uid(&self, uid: &str) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.firebase_uid == uid).cloned())
    }

    async fn create(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == new.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} already registered",
                new.email
            )));
        }
        if tables.users.iter().any(|u| u.firebase_uid == new.firebase_uid) {
            return Err(RepositoryError::Conflict("firebase uid already linked".to_string()));
        }

        let user = User {
            id: UserId::random(),
            name: new.name.clone(),
            email: new.email.clone(),
            role: new.role,
            firebase_uid: new.firebase_uid.clone(),
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn list_with_counts(&self) -> Result<Vec<UserWithCount>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .rev()
            .map(|user| {
                let work_orders = tables
                    .work_orders
                    .iter()
                    .filter(|w| w.assigned_user_id == Some(user.id))
                    .count() as u64;
                UserWithCount {
                    user: user.clone(),
                    count: UserCounts { work_orders },
                }
            })
            .collect())
    }

    async fn assigned_work_orders(&self, id: UserId) -> Result<Vec<WorkOrder>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(newest_first(&tables.work_orders, |w| {
            w.assigned_user_id == Some(id)
        }))
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create(&self, new: &NewPayment) -> Result<Payment, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.work_order_exists(new.work_order_id) {
            return Err(RepositoryError::NotFound);
        }

        let payment = Payment {
            id: PaymentId::random(),
            work_order_id: new.work_order_id,
            payment_reference: new.payment_reference.clone(),
            amount: new.amount,
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };
        tables.payments.push(payment.clone());
        Ok(payment)
    }

    async fn list_for_work_order(
        &self,
        work_order_id: WorkOrderId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.work_order_id == work_order_id)
            .cloned()
            .collect())
    }
}
