//! Work order and audit log domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workorder_core::{LogAction, UserId, WorkOrderId, WorkOrderLogId, WorkOrderStatus};

use super::user::UserSummary;

/// A maintenance work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub title: String,
    pub description: String,
    pub status: WorkOrderStatus,
    pub assigned_user_id: Option<UserId>,
    /// Free-text reference to a Shopify order.
    pub shopify_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    /// The record as it will look once `patch` is applied.
    ///
    /// Only touches the editable fields; identity and timestamps are the
    /// store's business.
    #[must_use]
    pub fn patched(&self, patch: &WorkOrderPatch) -> Self {
        Self {
            title: patch.title.clone().unwrap_or_else(|| self.title.clone()),
            description: patch
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            status: patch.status.unwrap_or(self.status),
            assigned_user_id: patch.assigned_user_id.or(self.assigned_user_id),
            ..self.clone()
        }
    }
}

/// Validated input for inserting a work order. There is no status field:
/// new work orders always start `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorkOrder {
    pub title: String,
    pub description: String,
    pub assigned_user_id: Option<UserId>,
    pub shopify_order_id: Option<String>,
}

/// Validated partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkOrderPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<WorkOrderStatus>,
    pub assigned_user_id: Option<UserId>,
}

/// One immutable audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderLog {
    pub id: WorkOrderLogId,
    pub work_order_id: WorkOrderId,
    pub action: LogAction,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// List filters. Both are optional and combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkOrderFilter {
    pub status: Option<WorkOrderStatus>,
    pub assigned_user_id: Option<UserId>,
}

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp a page request into range: page at least 1, limit in `1..=100`.
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    /// Pagination block for a response given the total row count.
    #[must_use]
    pub const fn info(&self, total: u64) -> PageInfo {
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            pages: total.div_ceil(self.limit as u64),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination block returned with list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// A work order as shown in lists: assignee summary and latest log entries.
#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderListItem {
    #[serde(flatten)]
    pub work_order: WorkOrder,
    pub assigned_user: Option<UserSummary>,
    /// Newest first, at most five.
    pub logs: Vec<WorkOrderLog>,
}

/// A work order with its assignee and full audit trail (newest first).
#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderDetail {
    #[serde(flatten)]
    pub work_order: WorkOrder,
    pub assigned_user: Option<UserSummary>,
    pub logs: Vec<WorkOrderLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkOrder {
        let now = Utc::now();
        WorkOrder {
            id: WorkOrderId::random(),
            title: "Fix HVAC System".to_string(),
            description: "Temperature control is not working".to_string(),
            status: WorkOrderStatus::Open,
            assigned_user_id: None,
            shopify_order_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_patched_only_changes_given_fields() {
        let before = sample();
        let patch = WorkOrderPatch {
            status: Some(WorkOrderStatus::InProgress),
            ..WorkOrderPatch::default()
        };

        let after = before.patched(&patch);
        assert_eq!(after.status, WorkOrderStatus::InProgress);
        assert_eq!(after.title, before.title);
        assert_eq!(after.id, before.id);
    }

    #[test]
    fn test_page_request_clamps() {
        let page = PageRequest::new(Some(0), Some(1000));
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), PageRequest::MAX_LIMIT);
        assert_eq!(page.offset(), 0);

        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_page_info_rounds_up() {
        let info = PageRequest::new(Some(1), Some(10)).info(21);
        assert_eq!(info.pages, 3);
        assert_eq!(PageRequest::default().info(0).pages, 0);
    }
}
