//! Business logic services.
//!
//! # Services
//!
//! - `work_orders` - Create/update orchestration: validate, write, audit, side effects
//! - `notifications` - Work-order SMS formatting and delivery with degraded-mode tracking
//! - `realtime` - Topic registry and fan-out for WebSocket subscribers
//! - `audit` - Audit entry text
//! - `degraded` - Consecutive-failure tracking for outbound channels

pub mod audit;
pub mod degraded;
pub mod notifications;
pub mod realtime;
pub mod work_orders;

use std::time::Duration;

use workorder_core::TransitionPolicy;

pub use degraded::{ChannelHealth, ChannelStatus};
pub use notifications::{Delivery, DispatchError, NotificationDispatcher};
pub use realtime::{Broadcaster, Event, Session, SubscriberId, Topic};
pub use work_orders::{
    CreateWorkOrderInput, MutationOutcome, ServiceError, SideEffectOutcome, SideEffects,
    UpdateWorkOrderInput, WorkOrderService,
};

/// Fallback SMS destination when a work order has no better one.
pub const DEFAULT_NOTIFICATION_NUMBER: &str = "+13202677242";

/// Tunables for the mutation pipeline's side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub transition_policy: TransitionPolicy,
    /// Where work-order notifications are sent.
    pub default_destination: String,
    /// Upper bound on each outbound call (SMS send, order sync).
    pub side_effect_timeout: Duration,
    /// Consecutive failures before a channel is reported as degraded.
    pub degraded_after: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::default(),
            default_destination: DEFAULT_NOTIFICATION_NUMBER.to_string(),
            side_effect_timeout: Duration::from_secs(10),
            degraded_after: 3,
        }
    }
}
