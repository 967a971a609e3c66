//! Status and role enums for work orders, users, audit entries and payments.

use serde::{Deserialize, Serialize};

/// Error returned when text does not name a known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` over a fixed snake_case table.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire and database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle status of a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "work_order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    #[default]
    Open,
    InProgress,
    Completed,
}

string_enum!(WorkOrderStatus, "work order status", {
    Open => "open",
    InProgress => "in_progress",
    Completed => "completed",
});

impl WorkOrderStatus {
    /// Position in the forward lifecycle.
    const fn stage(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }
}

/// Which status changes an update may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any status may move to any other status, including reopening.
    #[default]
    Permissive,
    /// `open → in_progress → completed`. Skipping ahead is allowed, moving
    /// back is not, and `completed` is terminal.
    Forward,
}

impl TransitionPolicy {
    /// Whether `from → to` is allowed. Staying on the same status always is.
    #[must_use]
    pub const fn allows(self, from: WorkOrderStatus, to: WorkOrderStatus) -> bool {
        match self {
            Self::Permissive => true,
            Self::Forward => to.stage() >= from.stage(),
        }
    }
}

impl std::str::FromStr for TransitionPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "forward" => Ok(Self::Forward),
            _ => Err(UnknownVariant {
                kind: "transition policy",
                value: s.to_owned(),
            }),
        }
    }
}

/// User role. Admins create work orders; workers are assigned them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    #[default]
    Worker,
}

string_enum!(UserRole, "user role", {
    Admin => "admin",
    Worker => "worker",
});

/// Audit log action tag. Stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Created,
    Updated,
    Assigned,
    StatusChanged,
    Completed,
    NotificationSent,
    ShopifySynced,
}

string_enum!(LogAction, "log action", {
    Created => "created",
    Updated => "updated",
    Assigned => "assigned",
    StatusChanged => "status_changed",
    Completed => "completed",
    NotificationSent => "notification_sent",
    ShopifySynced => "shopify_synced",
});

/// Payment status. Stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Succeeded => "succeeded",
    Failed => "failed",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_matches_serde() {
        for status in WorkOrderStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
            assert_eq!(status.as_str().parse::<WorkOrderStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "done".parse::<WorkOrderStatus>().unwrap_err();
        assert_eq!(err.kind, "work order status");
        assert_eq!(err.to_string(), "invalid work order status: \"done\"");
    }

    #[test]
    fn test_permissive_allows_reopening() {
        assert!(
            TransitionPolicy::Permissive.allows(WorkOrderStatus::Completed, WorkOrderStatus::Open)
        );
    }

    #[test]
    fn test_forward_policy() {
        use WorkOrderStatus::{Completed, InProgress, Open};
        let policy = TransitionPolicy::Forward;

        assert!(policy.allows(Open, InProgress));
        assert!(policy.allows(InProgress, Completed));
        assert!(policy.allows(Open, Completed));
        assert!(policy.allows(Completed, Completed));

        assert!(!policy.allows(Completed, Open));
        assert!(!policy.allows(Completed, InProgress));
        assert!(!policy.allows(InProgress, Open));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            " Forward ".parse::<TransitionPolicy>().unwrap(),
            TransitionPolicy::Forward
        );
        assert!("strict".parse::<TransitionPolicy>().is_err());
    }

    #[test]
    fn test_log_action_round_trip() {
        for action in LogAction::ALL {
            assert_eq!(action.as_str().parse::<LogAction>().unwrap(), *action);
        }
        assert_eq!(LogAction::ShopifySynced.to_string(), "shopify_synced");
    }

    #[test]
    fn test_default_role_is_worker() {
        assert_eq!(UserRole::default(), UserRole::Worker);
    }
}
