//! Payment queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use workorder_core::{PaymentAmount, PaymentId, PaymentStatus, WorkOrderId};

use super::{PaymentStore, PgStore, RepositoryError, classify};
use crate::models::{NewPayment, Payment};

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    work_order_id: Uuid,
    payment_reference: Option<String>,
    amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let amount = PaymentAmount::new(row.amount).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid payment amount in database: {e}"))
        })?;
        let status = row.status.parse::<PaymentStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid payment status in database: {e}"))
        })?;

        Ok(Self {
            id: PaymentId::new(row.id),
            work_order_id: WorkOrderId::new(row.work_order_id),
            payment_reference: row.payment_reference,
            amount,
            status,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn create(&self, new: &NewPayment) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r"
            INSERT INTO payments (work_order_id, payment_reference, amount, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, work_order_id, payment_reference, amount, status, created_at
            ",
        )
        .bind(new.work_order_id.as_uuid())
        .bind(new.payment_reference.as_deref())
        .bind(new.amount.get())
        .bind(PaymentStatus::Pending.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(classify)?;

        row.try_into()
    }

    async fn list_for_work_order(
        &self,
        work_order_id: WorkOrderId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT id, work_order_id, payment_reference, amount, status, created_at
            FROM payments
            WHERE work_order_id = $1
            ORDER BY created_at ASC, id
            ",
        )
        .bind(work_order_id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
