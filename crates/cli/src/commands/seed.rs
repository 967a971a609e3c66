//! Demo data for local development.
//!
//! Three users (one admin, two workers), five work orders across every
//! status, a few audit entries and two payments. Users are upserted by
//! email; work orders, logs and payments are only written into an empty
//! `work_orders` table so the command can be re-run safely.

use rust_decimal::Decimal;
use sqlx::{PgConnection, types::Uuid};

use workorder_core::{LogAction, PaymentStatus, UserRole, WorkOrderStatus};

use super::{CommandError, connect};

struct SeedUser {
    name: &'static str,
    email: &'static str,
    role: UserRole,
    firebase_uid: &'static str,
}

const USERS: [SeedUser; 3] = [
    SeedUser {
        name: "Admin User",
        email: "admin@workorderwizard.com",
        role: UserRole::Admin,
        firebase_uid: "admin_firebase_uid_123",
    },
    SeedUser {
        name: "John Worker",
        email: "john@workorderwizard.com",
        role: UserRole::Worker,
        firebase_uid: "worker1_firebase_uid_456",
    },
    SeedUser {
        name: "Jane Smith",
        email: "jane@workorderwizard.com",
        role: UserRole::Worker,
        firebase_uid: "worker2_firebase_uid_789",
    },
];

struct SeedWorkOrder {
    title: &'static str,
    description: &'static str,
    status: WorkOrderStatus,
    /// Index into [`USERS`].
    assignee: Option<usize>,
    shopify_order_id: Option<&'static str>,
}

const WORK_ORDERS: [SeedWorkOrder; 5] = [
    SeedWorkOrder {
        title: "Fix HVAC System",
        description: "The HVAC system in building A needs immediate repair. Temperature control is not working properly.",
        status: WorkOrderStatus::Open,
        assignee: Some(1),
        shopify_order_id: Some("shopify_order_001"),
    },
    SeedWorkOrder {
        title: "Electrical Maintenance",
        description: "Routine electrical maintenance for the main office building. Check all outlets and lighting.",
        status: WorkOrderStatus::InProgress,
        assignee: Some(2),
        shopify_order_id: None,
    },
    SeedWorkOrder {
        title: "Plumbing Repair",
        description: "Leaky faucet in the break room needs to be fixed urgently.",
        status: WorkOrderStatus::Completed,
        assignee: Some(1),
        shopify_order_id: Some("shopify_order_002"),
    },
    SeedWorkOrder {
        title: "Network Equipment Setup",
        description: "Install and configure new network equipment in the server room.",
        status: WorkOrderStatus::Open,
        assignee: None,
        shopify_order_id: None,
    },
    SeedWorkOrder {
        title: "Security System Update",
        description: "Update security cameras and access control systems throughout the facility.",
        status: WorkOrderStatus::InProgress,
        assignee: Some(2),
        shopify_order_id: None,
    },
];

/// Seed the database.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;
    let mut tx = pool.begin().await?;

    let mut user_ids = Vec::with_capacity(USERS.len());
    for user in &USERS {
        user_ids.push(upsert_user(&mut tx, user).await?);
    }
    tracing::info!(count = user_ids.len(), "Users seeded");

    let existing: i64 = sqlx::query_scalar(r"SELECT COUNT(*) FROM work_orders")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        tx.commit().await?;
        tracing::info!(existing, "Work orders already present, skipping the rest");
        return Ok(());
    }

    let mut work_order_ids = Vec::with_capacity(WORK_ORDERS.len());
    for work_order in &WORK_ORDERS {
        let assignee = work_order.assignee.and_then(|i| user_ids.get(i).copied());
        work_order_ids.push(insert_work_order(&mut tx, work_order, assignee).await?);
    }

    let id = |i: usize| {
        work_order_ids
            .get(i)
            .copied()
            .ok_or_else(|| CommandError::Invalid(format!("no seeded work order #{i}")))
    };

    let logs = [
        (id(0)?, LogAction::Created, "Work order created by admin".to_string()),
        (
            id(0)?,
            LogAction::Assigned,
            format!("Work order assigned to {}", USERS[1].name),
        ),
        (
            id(1)?,
            LogAction::StatusChanged,
            "Status changed from open to in_progress".to_string(),
        ),
        (
            id(2)?,
            LogAction::Completed,
            "Work order marked as completed".to_string(),
        ),
    ];
    for (work_order_id, action, details) in &logs {
        sqlx::query(
            r"INSERT INTO work_order_logs (work_order_id, action, details) VALUES ($1, $2, $3)",
        )
        .bind(work_order_id)
        .bind(action.as_str())
        .bind(details)
        .execute(&mut *tx)
        .await?;
    }

    let payments = [
        (
            id(0)?,
            "pi_1234567890abcdef",
            Decimal::new(25000, 2),
            PaymentStatus::Pending,
        ),
        (
            id(2)?,
            "pi_0987654321fedcba",
            Decimal::new(15075, 2),
            PaymentStatus::Succeeded,
        ),
    ];
    for (work_order_id, reference, amount, status) in &payments {
        sqlx::query(
            r"INSERT INTO payments (work_order_id, payment_reference, amount, status)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(work_order_id)
        .bind(reference)
        .bind(amount)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(
        work_orders = work_order_ids.len(),
        logs = logs.len(),
        payments = payments.len(),
        "Database seeded successfully!"
    );
    Ok(())
}

async fn upsert_user(conn: &mut PgConnection, user: &SeedUser) -> Result<Uuid, CommandError> {
    let id = sqlx::query_scalar(
        r"
        INSERT INTO users (name, email, role, firebase_uid)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, role = EXCLUDED.role
        RETURNING id
        ",
    )
    .bind(user.name)
    .bind(user.email)
    .bind(user.role)
    .bind(user.firebase_uid)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

async fn insert_work_order(
    conn: &mut PgConnection,
    work_order: &SeedWorkOrder,
    assignee: Option<Uuid>,
) -> Result<Uuid, CommandError> {
    let id = sqlx::query_scalar(
        r"
        INSERT INTO work_orders (title, description, status, assigned_user_id, shopify_order_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(work_order.title)
    .bind(work_order.description)
    .bind(work_order.status)
    .bind(assignee)
    .bind(work_order.shopify_order_id)
    .fetch_one(conn)
    .await?;
    Ok(id)
}
