//! Like and rating API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::ListResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Like, Rating, RatingInput, RatingView};

/// Build public engagement routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/posts/{id}/ratings", get(list_ratings))
}

/// Build protected engagement routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/like", post(like_post).delete(unlike_post))
        .route(
            "/posts/{id}/ratings",
            post(rate_post).put(update_rating).delete(delete_rating),
        )
        .route("/likes/mine", get(my_likes))
}

/// POST /api/v1/posts/{id}/like
async fn like_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let like = state.engagement_service.like(&user, post_id).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

/// DELETE /api/v1/posts/{id}/like
async fn unlike_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.engagement_service.unlike(&user, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/posts/{id}/ratings
async fn list_ratings(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(post_id): Path<i64>,
) -> Result<Json<ListResponse<RatingView>>, ApiError> {
    let viewer = viewer.as_ref().map(|v| &v.0);
    let ratings = state
        .engagement_service
        .list_ratings(post_id, viewer)
        .await?;
    Ok(Json(ratings.into()))
}

/// POST /api/v1/posts/{id}/ratings
async fn rate_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<i64>,
    Json(body): Json<RatingInput>,
) -> Result<impl IntoResponse, ApiError> {
    let rating = state.engagement_service.rate(&user, post_id, body).await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

/// PUT /api/v1/posts/{id}/ratings
async fn update_rating(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<i64>,
    Json(body): Json<RatingInput>,
) -> Result<Json<Rating>, ApiError> {
    Ok(Json(
        state
            .engagement_service
            .update_rating(&user, post_id, body)
            .await?,
    ))
}

/// DELETE /api/v1/posts/{id}/ratings
async fn delete_rating(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.engagement_service.delete_rating(&user, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/likes/mine
async fn my_likes(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ListResponse<Like>>, ApiError> {
    Ok(Json(state.engagement_service.likes_by_user(&user).await?.into()))
}
