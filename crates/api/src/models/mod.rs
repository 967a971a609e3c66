//! Domain models for the API.
//!
//! These are validated domain objects. Database row types live next to the
//! queries in [`crate::db`]; request and response DTOs live with the routes.

pub mod payment;
pub mod user;
pub mod work_order;

pub use payment::{NewPayment, Payment};
pub use user::{AssignedWorkOrder, NewUser, User, UserCounts, UserDetail, UserSummary, UserWithCount};
pub use work_order::{
    NewWorkOrder, PageInfo, PageRequest, WorkOrder, WorkOrderDetail, WorkOrderFilter,
    WorkOrderListItem, WorkOrderLog, WorkOrderPatch,
};
