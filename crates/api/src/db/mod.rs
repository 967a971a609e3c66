//! Record store for work orders, users, audit logs and payments.
//!
//! # Tables
//!
//! - `users` - People who sign in through Firebase (admins and workers)
//! - `work_orders` - Maintenance requests and their lifecycle status
//! - `work_order_logs` - Append-only audit trail (UPDATE/DELETE rejected by trigger)
//! - `payments` - Payment records linked to work orders
//!
//! # Seams
//!
//! Services depend on the traits in this module, never on `PgPool` directly.
//! [`PgStore`] implements them against `PostgreSQL`; [`MemoryStore`]
//! implements them in process for tests and local experiments.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p workorder-cli -- migrate
//! ```

pub mod memory;
pub mod payments;
pub mod users;
pub mod work_order_logs;
pub mod work_orders;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use workorder_core::{LogAction, UserId, WorkOrderId};

use crate::models::{
    NewPayment, NewUser, NewWorkOrder, PageRequest, Payment, User, UserWithCount, WorkOrder,
    WorkOrderFilter, WorkOrderLog, WorkOrderPatch,
};

pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// A referenced row (such as the assignee) does not exist.
    #[error("missing reference: {0}")]
    MissingReference(&'static str),

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The update review refused the change; nothing was written.
    #[error("update rejected: {0}")]
    Rejected(String),
}

/// Decides, against the locked current row, whether an update may proceed
/// and what its audit entry says.
///
/// Returns the audit details on success, or the reason for refusing.
pub type UpdateReview<'a> = dyn Fn(&WorkOrder) -> Result<String, String> + Send + Sync + 'a;

/// Result of a committed update: the row before and after, plus its audit entry.
#[derive(Debug, Clone)]
pub struct UpdatedWorkOrder {
    pub before: WorkOrder,
    pub after: WorkOrder,
    pub log: WorkOrderLog,
}

/// Work order records.
///
/// `insert` and `update` write the record and its audit entry in one
/// transaction: either both are stored or neither is.
#[async_trait]
pub trait WorkOrderStore: Send + Sync {
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn get(&self, id: WorkOrderId) -> Result<Option<WorkOrder>, RepositoryError>;

    /// Newest first. Returns the page and the total matching row count.
    async fn list(
        &self,
        filter: WorkOrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<WorkOrder>, u64), RepositoryError>;

    /// Insert with status `open` and append a `created` entry with `details`.
    ///
    /// # Errors
    ///
    /// `MissingReference` if the assignee does not exist.
    async fn insert(
        &self,
        new: &NewWorkOrder,
        details: &str,
    ) -> Result<(WorkOrder, WorkOrderLog), RepositoryError>;

    /// Lock the row, run `review` on it, apply `patch` and append an
    /// `updated` entry with the review's details.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id does not exist, `MissingReference` if the
    /// assignee does not exist, `Rejected` if `review` refuses.
    async fn update(
        &self,
        id: WorkOrderId,
        patch: &WorkOrderPatch,
        review: &UpdateReview<'_>,
    ) -> Result<UpdatedWorkOrder, RepositoryError>;
}

/// The audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one entry.
    ///
    /// # Errors
    ///
    /// `NotFound` if the work order does not exist.
    async fn append(
        &self,
        work_order_id: WorkOrderId,
        action: LogAction,
        details: &str,
    ) -> Result<WorkOrderLog, RepositoryError>;

    /// All entries for a work order, oldest first.
    async fn list(&self, work_order_id: WorkOrderId) -> Result<Vec<WorkOrderLog>, RepositoryError>;

    /// Up to `per_order` newest entries for each of `ids`, newest first.
    async fn recent(
        &self,
        ids: &[WorkOrderId],
        per_order: usize,
    ) -> Result<HashMap<WorkOrderId, Vec<WorkOrderLog>>, RepositoryError>;
}

/// User records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError>;

    async fn get_by_firebase_uid(&self, uid: &str) -> Result<Option<User>, RepositoryError>;

    /// # Errors
    ///
    /// `Conflict` if the email or firebase uid is already taken.
    async fn create(&self, new: &NewUser) -> Result<User, RepositoryError>;

    /// Newest first, with assigned work order counts.
    async fn list_with_counts(&self) -> Result<Vec<UserWithCount>, RepositoryError>;

    /// Work orders assigned to a user, newest first.
    async fn assigned_work_orders(&self, id: UserId) -> Result<Vec<WorkOrder>, RepositoryError>;
}

/// Payment records.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// # Errors
    ///
    /// `NotFound` if the work order does not exist.
    async fn create(&self, new: &NewPayment) -> Result<Payment, RepositoryError>;

    /// Oldest first.
    async fn list_for_work_order(
        &self,
        work_order_id: WorkOrderId,
    ) -> Result<Vec<Payment>, RepositoryError>;
}

/// `PostgreSQL` implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map unique and foreign key violations to domain errors.
/// Like [`classify`], for writes whose only foreign key is the assignee.
fn classify_assignee(err: sqlx::Error) -> RepositoryError {
    match classify(err) {
        RepositoryError::NotFound => RepositoryError::MissingReference("assigned user"),
        other => other,
    }
}

fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::Database(err)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
