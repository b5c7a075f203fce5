//! Comment API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::ListResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Comment, CommentThread, CommentView, CreateCommentInput};

/// Request body for editing a comment
#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// Request body for moderation
#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

/// Build public comment routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/posts/{id}/comments", get(list_comments))
}

/// Build protected comment routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/comments", post(create_comment))
        .route("/comments/mine", get(my_comments))
        .route("/comments/{id}", put(update_comment).delete(delete_comment))
        .route("/comments/{id}/approval", post(set_approval))
}

/// GET /api/v1/posts/{id}/comments - approved threads
async fn list_comments(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(post_id): Path<i64>,
) -> Result<Json<ListResponse<CommentThread>>, ApiError> {
    let viewer = viewer.as_ref().map(|v| &v.0);
    let threads = state.comment_service.list_for_post(post_id, viewer).await?;
    Ok(Json(threads.into()))
}

/// POST /api/v1/posts/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateCommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state.comment_service.create(&user, post_id, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/comments/mine
async fn my_comments(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ListResponse<CommentView>>, ApiError> {
    Ok(Json(state.comment_service.list_by_author(&user).await?.into()))
}

/// PUT /api/v1/comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(
        state
            .comment_service
            .update(&user, id, &body.content)
            .await?,
    ))
}

/// DELETE /api/v1/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/comments/{id}/approval - staff only
async fn set_approval(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ApprovalRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(
        state
            .comment_service
            .set_approved(&user, id, body.approved)
            .await?,
    ))
}
