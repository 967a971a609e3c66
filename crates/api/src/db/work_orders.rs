//! Work order queries.
//!
//! Queries are checked at runtime (`query_as` + `bind`) so the crate builds
//! without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use workorder_core::{LogAction, UserId, WorkOrderId, WorkOrderStatus};

use super::work_order_logs::insert_log;
use super::{
    PgStore, RepositoryError, UpdateReview, UpdatedWorkOrder, WorkOrderStore, classify_assignee,
};
use crate::models::{
    NewWorkOrder, PageRequest, WorkOrder, WorkOrderFilter, WorkOrderLog, WorkOrderPatch,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(super) struct WorkOrderRow {
    id: Uuid,
    title: String,
    description: String,
    status: WorkOrderStatus,
    assigned_user_id: Option<Uuid>,
    shopify_order_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WorkOrderRow> for WorkOrder {
    type Error = RepositoryError;

    fn try_from(row: WorkOrderRow) -> Result<Self, Self::Error> {
        if row.title.trim().is_empty() {
            return Err(RepositoryError::DataCorruption(format!(
                "work order {} has a blank title",
                row.id
            )));
        }

        Ok(Self {
            id: WorkOrderId::new(row.id),
            title: row.title,
            description: row.description,
            status: row.status,
            assigned_user_id: row.assigned_user_id.map(UserId::new),
            shopify_order_id: row.shopify_order_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl WorkOrderStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }

    async fn get(&self, id: WorkOrderId) -> Result<Option<WorkOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, WorkOrderRow>(
            r"
            SELECT id, title, description, status, assigned_user_id,
                   shopify_order_id, created_at, updated_at
            FROM work_orders
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(
        &self,
        filter: WorkOrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<WorkOrder>, u64), RepositoryError> {
        let assignee = filter.assigned_user_id.map(|id| id.as_uuid());
        let limit = i64::from(page.limit());
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, WorkOrderRow>(
            r"
            SELECT id, title, description, status, assigned_user_id,
                   shopify_order_id, created_at, updated_at
            FROM work_orders
            WHERE ($1::work_order_status IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR assigned_user_id = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(filter.status)
        .bind(assignee)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM work_orders
            WHERE ($1::work_order_status IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR assigned_user_id = $2)
            ",
        )
        .bind(filter.status)
        .bind(assignee)
        .fetch_one(self.pool())
        .await?;

        let work_orders = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        let total = u64::try_from(total)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative count {total}")))?;

        Ok((work_orders, total))
    }

    async fn insert(
        &self,
        new: &NewWorkOrder,
        details: &str,
    ) -> Result<(WorkOrder, WorkOrderLog), RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query_as::<_, WorkOrderRow>(
            r"
            INSERT INTO work_orders (title, description, status, assigned_user_id, shopify_order_id)
            VALUES ($1, $2, 'open', $3, $4)
            RETURNING id, title, description, status, assigned_user_id,
                      shopify_order_id, created_at, updated_at
            ",
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.assigned_user_id.map(|id| id.as_uuid()))
        .bind(new.shopify_order_id.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_assignee)?;

        let work_order = WorkOrder::try_from(row)?;
        let log = insert_log(&mut tx, work_order.id, LogAction::Created, details).await?;

        tx.commit().await?;
        Ok((work_order, log))
    }

    async fn update(
        &self,
        id: WorkOrderId,
        patch: &WorkOrderPatch,
        review: &UpdateReview<'_>,
    ) -> Result<UpdatedWorkOrder, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        // Row lock serializes concurrent updates, so each review sees the
        // state the previous update committed.
        let current = sqlx::query_as::<_, WorkOrderRow>(
            r"
            SELECT id, title, description, status, assigned_user_id,
                   shopify_order_id, created_at, updated_at
            FROM work_orders
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let before = WorkOrder::try_from(current)?;
        let details = review(&before).map_err(RepositoryError::Rejected)?;
        let target = before.patched(patch);

        let row = sqlx::query_as::<_, WorkOrderRow>(
            r"
            UPDATE work_orders
            SET title = $2, description = $3, status = $4, assigned_user_id = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, description, status, assigned_user_id,
                      shopify_order_id, created_at, updated_at
            ",
        )
        .bind(id.as_uuid())
        .bind(&target.title)
        .bind(&target.description)
        .bind(target.status)
        .bind(target.assigned_user_id.map(|user| user.as_uuid()))
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_assignee)?;

        let after = WorkOrder::try_from(row)?;
        let log = insert_log(&mut tx, id, LogAction::Updated, &details).await?;

        tx.commit().await?;
        Ok(UpdatedWorkOrder { before, after, log })
    }
}
