//! Human-readable audit entry text.

use workorder_core::Email;

use crate::models::WorkOrder;

/// Details for a `created` entry.
#[must_use]
pub fn created_details(actor: &Email) -> String {
    format!("Work order created by {actor}")
}

/// Details for an `updated` entry: only fields whose value changed.
#[must_use]
pub fn updated_details(actor: &Email, before: &WorkOrder, after: &WorkOrder) -> String {
    let changes = describe_changes(before, after);
    if changes.is_empty() {
        format!("Updated by {actor}: no field changes")
    } else {
        format!("Updated by {actor}: {}", changes.join(", "))
    }
}

/// Details for a `shopify_synced` entry.
#[must_use]
pub fn synced_details(order_ref: &str) -> String {
    format!("Synced with Shopify order {order_ref}")
}

/// Details for a `notification_sent` entry.
#[must_use]
pub fn notification_details(destination: &str, body: &str) -> String {
    format!("SMS sent to {destination}: {body}")
}

/// `field: old → new` for each editable field that differs.
#[must_use]
pub fn describe_changes(before: &WorkOrder, after: &WorkOrder) -> Vec<String> {
    let mut changes = Vec::new();
    let mut push = |field: &str, old: String, new: String| {
        if old != new {
            changes.push(format!("{field}: {old} → {new}"));
        }
    };

    push("title", before.title.clone(), after.title.clone());
    push(
        "description",
        before.description.clone(),
        after.description.clone(),
    );
    push(
        "status",
        before.status.to_string(),
        after.status.to_string(),
    );
    push(
        "assigned_user_id",
        assignee(before),
        assignee(after),
    );

    changes
}

fn assignee(work_order: &WorkOrder) -> String {
    work_order
        .assigned_user_id
        .map_or_else(|| "unassigned".to_string(), |id| id.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use workorder_core::{UserId, WorkOrderId, WorkOrderStatus};

    use super::*;

    fn work_order() -> WorkOrder {
        let now = Utc::now();
        WorkOrder {
            id: WorkOrderId::random(),
            title: "Fix sink".to_string(),
            description: "Leaking".to_string(),
            status: WorkOrderStatus::Open,
            assigned_user_id: None,
            shopify_order_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn actor() -> Email {
        Email::parse("sarah@ymca.org").unwrap()
    }

    #[test]
    fn test_status_change_is_described() {
        let before = work_order();
        let after = WorkOrder {
            status: WorkOrderStatus::InProgress,
            ..before.clone()
        };

        assert_eq!(
            updated_details(&actor(), &before, &after),
            "Updated by sarah@ymca.org: status: open → in_progress"
        );
    }

    #[test]
    fn test_unchanged_fields_are_omitted() {
        let before = work_order();
        let user = UserId::random();
        let after = WorkOrder {
            title: "Fix kitchen sink".to_string(),
            assigned_user_id: Some(user),
            ..before.clone()
        };

        let changes = describe_changes(&before, &after);
        assert_eq!(
            changes,
            [
                "title: Fix sink → Fix kitchen sink".to_string(),
                format!("assigned_user_id: unassigned → {user}"),
            ]
        );
    }

    #[test]
    fn test_no_changes() {
        let before = work_order();
        assert_eq!(
            updated_details(&actor(), &before, &before),
            "Updated by sarah@ymca.org: no field changes"
        );
    }

    #[test]
    fn test_created_details() {
        assert_eq!(
            created_details(&actor()),
            "Work order created by sarah@ymca.org"
        );
    }
}
