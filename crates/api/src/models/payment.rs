//! Payment records attached to work orders.
//!
//! Payments are bookkeeping only: nothing in the work-order lifecycle reads
//! them, and no status change is driven by a payment event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workorder_core::{PaymentAmount, PaymentId, PaymentStatus, WorkOrderId};

/// A recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub work_order_id: WorkOrderId,
    /// Processor-side reference (e.g., a payment intent id), if any.
    pub payment_reference: Option<String>,
    pub amount: PaymentAmount,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub work_order_id: WorkOrderId,
    pub amount: PaymentAmount,
    pub payment_reference: Option<String>,
}
