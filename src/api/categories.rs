//! Category API endpoints
//!
//! - GET /api/v1/categories - Categories with published post counts
//! - GET /api/v1/categories/{id} - One category
//! - GET /api/v1/categories/{id}/posts - Published posts in a category
//! - POST, PUT, DELETE - Staff-only management

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::{ListResponse, PageResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    Category, CategoryWithCount, CreateCategoryInput, PostSummary, UpdateCategoryInput,
};

/// Build public category routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/{id}", get(get_category))
        .route("/{id}/posts", get(list_category_posts))
}

/// Build protected category routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/{id}", put(update_category).delete(delete_category))
}

/// GET /api/v1/categories
async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<CategoryWithCount>>, ApiError> {
    Ok(Json(state.category_service.list().await?.into()))
}

/// GET /api/v1/categories/{id}
async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get(id).await?))
}

/// GET /api/v1/categories/{id}/posts
async fn list_category_posts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<PostSummary>>, ApiError> {
    let result = state
        .post_service
        .list_by_category(id, query.into())
        .await?;
    Ok(Json(result.into()))
}

/// POST /api/v1/categories
async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.category_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/v1/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(&user, id, body).await?))
}

/// DELETE /api/v1/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
