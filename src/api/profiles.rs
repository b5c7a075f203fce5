//! User and profile API endpoints
//!
//! - GET /api/v1/users/{id} - Public user with published post count
//! - GET /api/v1/profiles/{user_id} - Public profile
//! - GET, PUT /api/v1/profiles/me - Own profile

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ProfileView, PublicUser, UpdateProfileInput};

/// Build public user and profile routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/users/{id}", get(get_user))
        .route("/profiles/{user_id}", get(get_profile))
}

/// Build protected profile routes
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/profiles/me", get(get_own_profile).put(update_own_profile))
}

/// GET /api/v1/users/{id}
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state
        .user_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))?;
    let posts_count = state.post_service.count_published_by_author(user.id).await?;

    Ok(Json(PublicUser::new(user, posts_count)))
}

/// GET /api/v1/profiles/{user_id}
async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(state.profile_service.get_or_create(user_id).await?))
}

/// GET /api/v1/profiles/me
async fn get_own_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(state.profile_service.get_or_create(user.id).await?))
}

/// PUT /api/v1/profiles/me
async fn update_own_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(state.profile_service.update(&user, body).await?))
}
