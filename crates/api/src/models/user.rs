//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workorder_core::{Email, UserId, UserRole, WorkOrderId, WorkOrderStatus};

/// A user known to the system, linked to an identity-provider subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    /// Identity-provider subject (Firebase uid). Never sent to clients.
    #[serde(skip_serializing)]
    pub firebase_uid: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub firebase_uid: String,
}

/// The public face of a user embedded in other responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Work-order counters attached to user list rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    pub work_orders: u64,
}

/// A user list row.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithCount {
    #[serde(flatten)]
    pub user: User,
    #[serde(rename = "_count")]
    pub count: UserCounts,
}

/// A work order as listed under its assignee.
#[derive(Debug, Clone, Serialize)]
pub struct AssignedWorkOrder {
    pub id: WorkOrderId,
    pub title: String,
    pub status: WorkOrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A user with the work orders assigned to them (newest first).
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub work_orders: Vec<AssignedWorkOrder>,
}
