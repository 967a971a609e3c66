//! Audit trail queries.
//!
//! `work_order_logs` is append-only; the table trigger rejects UPDATE and
//! DELETE, so this module only ever inserts and reads. Ordering uses the
//! identity column `seq`, never `created_at`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use workorder_core::{LogAction, WorkOrderId, WorkOrderLogId};

use super::{AuditLog, PgStore, RepositoryError, classify};
use crate::models::WorkOrderLog;

#[derive(Debug, sqlx::FromRow)]
struct WorkOrderLogRow {
    id: Uuid,
    work_order_id: Uuid,
    action: String,
    details: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<WorkOrderLogRow> for WorkOrderLog {
    type Error = RepositoryError;

    fn try_from(row: WorkOrderLogRow) -> Result<Self, Self::Error> {
        let action = row.action.parse::<LogAction>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid log action in database: {e}"))
        })?;

        Ok(Self {
            id: WorkOrderLogId::new(row.id),
            work_order_id: WorkOrderId::new(row.work_order_id),
            action,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

/// Insert one entry on an open connection or transaction.
pub(super) async fn insert_log(
    conn: &mut PgConnection,
    work_order_id: WorkOrderId,
    action: LogAction,
    details: &str,
) -> Result<WorkOrderLog, RepositoryError> {
    let row = sqlx::query_as::<_, WorkOrderLogRow>(
        r"
        INSERT INTO work_order_logs (work_order_id, action, details)
        VALUES ($1, $2, $3)
        RETURNING id, work_order_id, action, details, created_at
        ",
    )
    .bind(work_order_id.as_uuid())
    .bind(action.as_str())
    .bind(details)
    .fetch_one(conn)
    .await
    .map_err(classify)?;

    row.try_into()
}

#[async_trait]
impl AuditLog for PgStore {
    async fn append(
        &self,
        work_order_id: WorkOrderId,
        action: LogAction,
        details: &str,
    ) -> Result<WorkOrderLog, RepositoryError> {
        let mut conn = self.pool().acquire().await?;
        insert_log(&mut conn, work_order_id, action, details).await
    }

    async fn list(&self, work_order_id: WorkOrderId) -> Result<Vec<WorkOrderLog>, RepositoryError> {
        let rows = sqlx::query_as::<_, WorkOrderLogRow>(
            r"
            SELECT id, work_order_id, action, details, created_at
            FROM work_order_logs
            WHERE work_order_id = $1
            ORDER BY seq ASC
            ",
        )
        .bind(work_order_id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn recent(
        &self,
        ids: &[WorkOrderId],
        per_order: usize,
    ) -> Result<HashMap<WorkOrderId, Vec<WorkOrderLog>>, RepositoryError> {
        if ids.is_empty() || per_order == 0 {
            return Ok(HashMap::new());
        }

        let uuids: Vec<Uuid> = ids.iter().map(WorkOrderId::as_uuid).collect();
        let per_order = i64::try_from(per_order).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, WorkOrderLogRow>(
            r"
            SELECT id, work_order_id, action, details, created_at
            FROM (
                SELECT id, work_order_id, action, details, created_at, seq,
                       ROW_NUMBER() OVER (PARTITION BY work_order_id ORDER BY seq DESC) AS rn
                FROM work_order_logs
                WHERE work_order_id = ANY($1)
            ) ranked
            WHERE rn <= $2
            ORDER BY work_order_id, seq DESC
            ",
        )
        .bind(&uuids)
        .bind(per_order)
        .fetch_all(self.pool())
        .await?;

        let mut grouped: HashMap<WorkOrderId, Vec<WorkOrderLog>> = HashMap::new();
        for row in rows {
            let log = WorkOrderLog::try_from(row)?;
            grouped.entry(log.work_order_id).or_default().push(log);
        }
        Ok(grouped)
    }
}
