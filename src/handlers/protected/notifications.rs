use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{
    NewNotification, Notification, NotificationFilter, NotificationKind, NotificationMetadata,
};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Operator};
use crate::state::AppState;
use crate::types::Pagination;

use super::utils::{non_blank, page_request};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub is_read: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationBody {
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub student_ids: Vec<Uuid>,
    #[serde(default)]
    pub student_names: Vec<String>,
    #[serde(default)]
    pub metadata: NotificationMetadata,
}

#[derive(Debug, Serialize)]
pub struct Count {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct Updated {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
}

fn parse_kind(raw: &str) -> Result<NotificationKind, ApiError> {
    raw.trim().parse().map_err(ApiError::bad_request)
}

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> ApiResult<NotificationPage> {
    let Query(query) = query?;
    let page = page_request(&state, query.page, query.limit);
    let filter = NotificationFilter {
        is_read: query.is_read,
        kind: non_blank(query.kind).map(|k| parse_kind(&k)).transpose()?,
    };

    let (notifications, total) = state.notifications.list(operator.id, &filter, page).await?;
    Ok(ApiResponse::success(NotificationPage {
        notifications,
        pagination: Pagination::new(page, total),
    }))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
) -> ApiResult<Count> {
    let count = state.notifications.count_unread(operator.id).await?;
    Ok(ApiResponse::success(Count { count }))
}

/// POST /api/notifications
pub async fn create(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    body: Result<Json<CreateNotificationBody>, JsonRejection>,
) -> ApiResult<Notification> {
    let Json(body) = body?;

    let (Some(title), Some(message)) = (non_blank(body.title), non_blank(body.message)) else {
        return Err(ApiError::bad_request("Title and message are required"));
    };
    let kind = non_blank(body.kind)
        .map(|k| parse_kind(&k))
        .transpose()?
        .unwrap_or_default();
    if kind == NotificationKind::OverduePayment {
        return Err(ApiError::bad_request(
            "Overdue payment notifications are maintained automatically",
        ));
    }
    if body.student_ids.len() != body.student_names.len() {
        return Err(ApiError::bad_request(
            "studentIds and studentNames must have the same length",
        ));
    }

    let notification = state
        .notifications
        .insert(NewNotification {
            owner_id: operator.id,
            title,
            message,
            kind,
            student_ids: body.student_ids,
            student_names: body.student_names,
            metadata: body.metadata,
        })
        .await?;

    Ok(ApiResponse::created(notification).with_message("Notification created successfully"))
}

/// PATCH /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Notification> {
    let Path(id) = path?;
    let notification = state
        .notifications
        .mark_read(operator.id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    Ok(ApiResponse::success(notification).with_message("Notification marked as read"))
}

/// PATCH /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
) -> ApiResult<Updated> {
    let updated = state.notifications.mark_all_read(operator.id).await?;
    Ok(ApiResponse::success(Updated { updated }).with_message("All notifications marked as read"))
}

/// DELETE /api/notifications/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Deleted> {
    let Path(id) = path?;
    if !state.notifications.delete(operator.id, id).await? {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(ApiResponse::success(Deleted { id }).with_message("Notification deleted successfully"))
}
