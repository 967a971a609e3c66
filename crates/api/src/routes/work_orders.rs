//! Work order routes.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use workorder_core::{UserId, WorkOrderStatus};

use super::work_order_id;
use crate::error::{AppError, JsonBody};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{
    PageInfo, PageRequest, UserSummary, WorkOrderDetail, WorkOrderFilter, WorkOrderListItem,
    WorkOrderLog,
};
use crate::services::{CreateWorkOrderInput, MutationOutcome, UpdateWorkOrderInput};
use crate::state::AppState;

/// Log entries shown per work order in list responses.
const RECENT_LOGS: usize = 5;

/// Raw list query. Everything arrives as text so bad values can be reported
/// as 400 rather than a bare extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub assigned_user_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    fn parse(&self) -> Result<(WorkOrderFilter, PageRequest), AppError> {
        let status = non_empty(self.status.as_deref())
            .map(|s| {
                s.parse::<WorkOrderStatus>()
                    .map_err(|e| AppError::BadRequest(e.to_string()))
            })
            .transpose()?;
        let assigned_user_id = non_empty(self.assigned_user_id.as_deref())
            .map(|s| {
                UserId::parse(s)
                    .map_err(|_| AppError::BadRequest("Invalid assigned_user_id".to_string()))
            })
            .transpose()?;
        let page = parse_number("page", self.page.as_deref())?;
        let limit = parse_number("limit", self.limit.as_deref())?;

        Ok((
            WorkOrderFilter {
                status,
                assigned_user_id,
            },
            PageRequest::new(page, limit),
        ))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(name: &str, value: Option<&str>) -> Result<Option<u32>, AppError> {
    non_empty(value)
        .map(|v| {
            v.parse::<u32>()
                .map_err(|_| AppError::BadRequest(format!("{name} must be a positive integer")))
        })
        .transpose()
}

#[derive(Debug, Serialize)]
pub struct WorkOrderList {
    pub work_orders: Vec<WorkOrderListItem>,
    pub pagination: PageInfo,
}

/// Paginated list, newest first, with assignees and recent activity.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<WorkOrderList>, AppError> {
    let (filter, page) = query.parse()?;
    let (work_orders, total) = state.work_orders().list(filter, page).await?;

    let ids: Vec<_> = work_orders.iter().map(|w| w.id).collect();
    let mut recent = state.audit().recent(&ids, RECENT_LOGS).await?;

    let mut assignee_ids: Vec<UserId> = work_orders
        .iter()
        .filter_map(|w| w.assigned_user_id)
        .collect();
    assignee_ids.sort_unstable_by_key(|id| id.as_uuid());
    assignee_ids.dedup();
    let assignees: HashMap<UserId, UserSummary> = state
        .users()
        .get_many(&assignee_ids)
        .await?
        .iter()
        .map(|u| (u.id, UserSummary::from(u)))
        .collect();

    let work_orders = work_orders
        .into_iter()
        .map(|work_order| WorkOrderListItem {
            assigned_user: work_order
                .assigned_user_id
                .and_then(|id| assignees.get(&id).cloned()),
            logs: recent.remove(&work_order.id).unwrap_or_default(),
            work_order,
        })
        .collect();

    Ok(Json(WorkOrderList {
        work_orders,
        pagination: page.info(total),
    }))
}

/// One work order with its assignee and full audit trail, newest first.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<WorkOrderDetail>, AppError> {
    let id = work_order_id(&id)?;
    let work_order = state
        .work_orders()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Work order not found".to_string()))?;

    let assigned_user = match work_order.assigned_user_id {
        Some(user_id) => state
            .users()
            .get(user_id)
            .await?
            .as_ref()
            .map(UserSummary::from),
        None => None,
    };
    let mut logs = state.audit().list(id).await?;
    logs.reverse();

    Ok(Json(WorkOrderDetail {
        work_order,
        assigned_user,
        logs,
    }))
}

/// Create a work order (admin only).
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    JsonBody(input): JsonBody<CreateWorkOrderInput>,
) -> Result<(StatusCode, Json<MutationOutcome>), AppError> {
    let outcome = state
        .work_order_service()
        .create_work_order(input, &user)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Partially update a work order.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateWorkOrderInput>,
) -> Result<Json<MutationOutcome>, AppError> {
    let id = work_order_id(&id)?;
    let outcome = state
        .work_order_service()
        .update_work_order(id, input, &user)
        .await?;
    Ok(Json(outcome))
}

/// The audit trail, oldest first.
pub async fn logs(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkOrderLog>>, AppError> {
    let id = work_order_id(&id)?;
    if state.work_orders().get(id).await?.is_none() {
        return Err(AppError::NotFound("Work order not found".to_string()));
    }
    Ok(Json(state.audit().list(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let mut q = ListQuery::default();
        for (key, value) in pairs {
            let value = Some((*value).to_string());
            match *key {
                "status" => q.status = value,
                "assigned_user_id" => q.assigned_user_id = value,
                "page" => q.page = value,
                "limit" => q.limit = value,
                _ => {}
            }
        }
        q
    }

    #[test]
    fn test_empty_query_uses_defaults() {
        let (filter, page) = query(&[]).parse().unwrap();
        assert_eq!(filter, WorkOrderFilter::default());
        assert_eq!(page, PageRequest::default());
    }

    #[test]
    fn test_query_parses_filters() {
        let user = UserId::random();
        let user_text = user.to_string();
        let (filter, page) = query(&[
            ("status", "in_progress"),
            ("assigned_user_id", user_text.as_str()),
            ("page", "2"),
            ("limit", "500"),
        ])
        .parse()
        .unwrap();

        assert_eq!(filter.status, Some(WorkOrderStatus::InProgress));
        assert_eq!(filter.assigned_user_id, Some(user));
        assert_eq!(page.page(), 2);
        assert_eq!(page.limit(), PageRequest::MAX_LIMIT);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let (filter, _) = query(&[("status", " "), ("assigned_user_id", "")])
            .parse()
            .unwrap();
        assert_eq!(filter, WorkOrderFilter::default());
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(matches!(
            query(&[("status", "archived")]).parse(),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            query(&[("assigned_user_id", "nobody")]).parse(),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            query(&[("page", "-1")]).parse(),
            Err(AppError::BadRequest(_))
        ));
    }
}
