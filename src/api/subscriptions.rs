//! Subscription API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::ListResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Subscription, SubscriptionKind};
use crate::services::SubscribeInput;

/// Filters for listing one's subscriptions
#[derive(Debug, Default, Deserialize)]
pub struct ListSubscriptionsQuery {
    pub kind: Option<SubscriptionKind>,
    pub is_active: Option<bool>,
}

/// Build subscription routes (all require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(subscribe))
        .route("/{id}/unsubscribe", post(unsubscribe))
}

/// GET /api/v1/subscriptions
async fn list_subscriptions(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ListSubscriptionsQuery>,
) -> Result<Json<ListResponse<Subscription>>, ApiError> {
    let subscriptions = state
        .subscription_service
        .list(&user, query.kind, query.is_active)
        .await?;
    Ok(Json(subscriptions.into()))
}

/// POST /api/v1/subscriptions
///
/// Re-subscribing after an unsubscribe reactivates the earlier subscription.
async fn subscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<SubscribeInput>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = state.subscription_service.subscribe(&user, body).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// POST /api/v1/subscriptions/{id}/unsubscribe
async fn unsubscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(state.subscription_service.unsubscribe(&user, id).await?))
}
