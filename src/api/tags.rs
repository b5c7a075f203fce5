//! Tag API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};

use crate::api::common::{ListResponse, PageResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{PostSummary, TagWithCount};
use crate::services::CreateTagInput;

/// Build public tag routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/{id}/posts", get(list_tag_posts))
}

/// Build protected tag routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(create_tag))
        .route("/{id}", delete(delete_tag))
}

/// GET /api/v1/tags
async fn list_tags(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<TagWithCount>>, ApiError> {
    Ok(Json(state.tag_service.list().await?.into()))
}

/// GET /api/v1/tags/{id}/posts
async fn list_tag_posts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<PostSummary>>, ApiError> {
    Ok(Json(state.post_service.list_by_tag(id, query.into()).await?.into()))
}

/// POST /api/v1/tags
async fn create_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateTagInput>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state.tag_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// DELETE /api/v1/tags/{id} - staff only
async fn delete_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.tag_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
