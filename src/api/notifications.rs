//! Notification inbox API endpoints
//!
//! - GET /api/v1/notifications - Own notifications, newest first
//! - GET /api/v1/notifications/unread-count
//! - POST /api/v1/notifications/{id}/read
//! - POST /api/v1/notifications/read-all

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, PageResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ListParams, Notification, NotificationFilter, NotificationKind};

/// Query parameters for the inbox listing
#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub is_read: Option<bool>,
    pub kind: Option<NotificationKind>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub marked: u64,
}

/// Build notification routes (all require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/{id}/read", post(mark_read))
}

/// GET /api/v1/notifications
async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<PageResponse<Notification>>, ApiError> {
    let filter = NotificationFilter {
        is_read: query.is_read,
        kind: query.kind,
    };
    let params = ListParams::new(query.page, query.per_page);
    let result = state
        .notification_service
        .list(&user, filter, params)
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/notifications/unread-count
async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = state.notification_service.unread_count(&user).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// POST /api/v1/notifications/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(state.notification_service.mark_read(&user, id).await?))
}

/// POST /api/v1/notifications/read-all
async fn mark_all_read(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let marked = state.notification_service.mark_all_read(&user).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}
