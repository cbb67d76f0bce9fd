use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::notification,
    errors::ServiceError,
    services::notifications::{MarkAllReadResult, NotificationPage},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct NotificationListQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub unread_only: bool,
}

/// The caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    summary = "List own notifications",
    params(NotificationListQuery),
    responses(
        (status = 200, description = "Notifications retrieved", body = ApiResponse<NotificationPage>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<ApiResponse<NotificationPage>>, ServiceError> {
    let page = state
        .services
        .notifications
        .list(auth_user.user_id, query.unread_only, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Mark one notification as read
#[utoipa::path(
    put,
    path = "/api/v1/notifications/{notification_id}/read",
    summary = "Mark notification read",
    params(("notification_id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification updated", body = ApiResponse<notification::Model>),
        (status = 404, description = "Not found or owned by another user", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<ApiResponse<notification::Model>>, ServiceError> {
    let updated = state
        .services
        .notifications
        .mark_read(auth_user.user_id, notification_id)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Mark every notification of the caller as read
#[utoipa::path(
    put,
    path = "/api/v1/notifications/read-all",
    summary = "Mark all notifications read",
    responses(
        (status = 200, description = "Notifications updated", body = ApiResponse<MarkAllReadResult>),
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<MarkAllReadResult>>, ServiceError> {
    let result = state
        .services
        .notifications
        .mark_all_read(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
