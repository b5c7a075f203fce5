//! API layer - HTTP handlers and routing
//!
//! JSON endpoints under `/api/v1`:
//! - Auth, user and profile endpoints
//! - Category and tag endpoints
//! - Post endpoints, including lifecycle and leaderboards
//! - Like, rating and comment endpoints
//! - Subscription and notification endpoints

pub mod auth;
pub mod categories;
pub mod comments;
pub mod common;
pub mod engagement;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod subscriptions;
pub mod tags;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a valid session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/categories", categories::protected_router())
        .nest("/tags", tags::protected_router())
        .nest("/posts", posts::protected_router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/notifications", notifications::router())
        .merge(profiles::protected_router())
        .merge(engagement::protected_router())
        .merge(comments::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes (a session, when present, identifies the viewer)
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/categories", categories::public_router())
        .nest("/tags", tags::public_router())
        .nest("/posts", posts::public_router())
        .merge(profiles::public_router())
        .merge(engagement::public_router())
        .merge(comments::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ))
        .merge(protected_routes)
}

/// Build the complete router with middleware
///
/// # Errors
///
/// Returns an error if `cors_origin` is not a valid header value.
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
