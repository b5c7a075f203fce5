//! Post API endpoints
//!
//! Public:
//! - GET /api/v1/posts - Published posts, filterable by category, author or tag
//! - GET /api/v1/posts/{id}, /api/v1/posts/slug/{slug} - Detail (counts a view)
//! - GET /api/v1/posts/by-author/{id}
//! - GET /api/v1/posts/most-liked, /top-rated, /trending
//!
//! Authenticated:
//! - POST /api/v1/posts, PUT/DELETE /api/v1/posts/{id}
//! - GET /api/v1/posts/mine, /drafts, /scheduled
//! - POST /api/v1/posts/{id}/publish, /unpublish, /archive

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, ListResponse, PageResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    CreatePostInput, ListParams, Post, PostDetail, PostStatus, PostSummary, UpdatePostInput,
};
use crate::services::PostQuery;

/// Query parameters for the public post listing
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub tag_id: Option<i64>,
}

impl ListPostsQuery {
    fn split(&self) -> (PostQuery, ListParams) {
        (
            PostQuery {
                category_id: self.category_id,
                author_id: self.author_id,
                tag_id: self.tag_id,
            },
            ListParams::new(self.page, self.per_page),
        )
    }
}

/// Query parameters for the author's own listing
#[derive(Debug, Deserialize)]
pub struct MyPostsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<PostStatus>,
}

/// Build public post routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/most-liked", get(most_liked))
        .route("/top-rated", get(top_rated))
        .route("/trending", get(trending))
        .route("/by-author/{id}", get(list_author_posts))
        .route("/slug/{slug}", get(get_post_by_slug))
        .route("/{id}", get(get_post))
}

/// Build protected post routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route("/mine", get(list_my_posts))
        .route("/drafts", get(list_drafts))
        .route("/scheduled", get(list_scheduled))
        .route("/{id}", axum::routing::put(update_post).delete(delete_post))
        .route("/{id}/publish", post(publish_post))
        .route("/{id}/unpublish", post(unpublish_post))
        .route("/{id}/archive", post(archive_post))
}

/// GET /api/v1/posts
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PageResponse<PostSummary>>, ApiError> {
    let (filter, params) = query.split();
    Ok(Json(state.post_service.list_published(filter, params).await?.into()))
}

/// GET /api/v1/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    let viewer = viewer.as_ref().map(|v| &v.0);
    Ok(Json(state.post_service.view(id, viewer).await?))
}

/// GET /api/v1/posts/slug/{slug}
async fn get_post_by_slug(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(slug): Path<String>,
) -> Result<Json<PostDetail>, ApiError> {
    let viewer = viewer.as_ref().map(|v| &v.0);
    Ok(Json(state.post_service.view_by_slug(&slug, viewer).await?))
}

/// GET /api/v1/posts/by-author/{id}
async fn list_author_posts(
    State(state): State<AppState>,
    Path(author_id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<PostSummary>>, ApiError> {
    let result = state
        .post_service
        .list_by_author(author_id, query.into())
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/posts/most-liked
async fn most_liked(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<PostSummary>>, ApiError> {
    Ok(Json(state.post_service.most_liked().await?.into()))
}

/// GET /api/v1/posts/top-rated
async fn top_rated(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<PostSummary>>, ApiError> {
    Ok(Json(state.post_service.top_rated().await?.into()))
}

/// GET /api/v1/posts/trending
async fn trending(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<PostSummary>>, ApiError> {
    Ok(Json(state.post_service.trending().await?.into()))
}

/// POST /api/v1/posts - creates a draft
async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreatePostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.post_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /api/v1/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.update(&user, id, body).await?))
}

/// DELETE /api/v1/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/posts/mine
async fn list_my_posts(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<MyPostsQuery>,
) -> Result<Json<PageResponse<PostSummary>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let result = state
        .post_service
        .list_mine(&user, query.status, params)
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/posts/drafts
async fn list_drafts(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<PostSummary>>, ApiError> {
    Ok(Json(state.post_service.list_drafts(&user, query.into()).await?.into()))
}

/// GET /api/v1/posts/scheduled
async fn list_scheduled(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<PostSummary>>, ApiError> {
    Ok(Json(state.post_service.list_scheduled(&user, query.into()).await?.into()))
}

/// POST /api/v1/posts/{id}/publish
async fn publish_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.publish(&user, id).await?))
}

/// POST /api/v1/posts/{id}/unpublish
async fn unpublish_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.unpublish(&user, id).await?))
}

/// POST /api/v1/posts/{id}/archive
async fn archive_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.archive(&user, id).await?))
}
