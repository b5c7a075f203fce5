//! Subscription registry
//!
//! A user follows authors or categories. Re-subscribing after an
//! unsubscribe reactivates the original row rather than inserting another.

use crate::db::repositories::{CategoryRepository, SubscriptionRepository, UserRepository};
use crate::models::{Subscription, SubscriptionKind, SubscriptionTarget, User};
use crate::services::error::{ServiceError, ServiceResult};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

/// Request to subscribe; exactly one of the ids must match `kind`
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeInput {
    pub kind: SubscriptionKind,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

impl SubscribeInput {
    pub fn author(author_id: i64) -> Self {
        Self {
            kind: SubscriptionKind::Author,
            author_id: Some(author_id),
            category_id: None,
        }
    }

    pub fn category(category_id: i64) -> Self {
        Self {
            kind: SubscriptionKind::Category,
            author_id: None,
            category_id: Some(category_id),
        }
    }

    fn target(&self) -> ServiceResult<SubscriptionTarget> {
        SubscriptionTarget::from_parts(self.kind.as_str(), self.author_id, self.category_id)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "A {} subscription needs exactly {}",
                    self.kind.as_str(),
                    match self.kind {
                        SubscriptionKind::Author => "an author_id",
                        SubscriptionKind::Category => "a category_id",
                    }
                ))
            })
    }
}

/// Subscription service
pub struct SubscriptionService {
    repo: Arc<dyn SubscriptionRepository>,
    user_repo: Arc<dyn UserRepository>,
    category_repo: Arc<dyn CategoryRepository>,
}

impl SubscriptionService {
    pub fn new(
        repo: Arc<dyn SubscriptionRepository>,
        user_repo: Arc<dyn UserRepository>,
        category_repo: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self {
            repo,
            user_repo,
            category_repo,
        }
    }

    pub async fn subscribe(
        &self,
        actor: &User,
        input: SubscribeInput,
    ) -> ServiceResult<Subscription> {
        let target = input.target()?;
        self.ensure_target_exists(&target).await?;

        if target.author_id() == Some(actor.id) {
            return Err(ServiceError::InvalidOperation(
                "You cannot subscribe to yourself".to_string(),
            ));
        }

        if let Some(existing) = self
            .repo
            .find(actor.id, &target)
            .await
            .context("Failed to look up subscription")?
        {
            if existing.is_active {
                return Err(ServiceError::AlreadyExists(
                    "You are already subscribed".to_string(),
                ));
            }
            let reactivated = self
                .repo
                .set_active(existing.id, true)
                .await
                .context("Failed to reactivate subscription")?;
            tracing::debug!(subscription_id = reactivated.id, "Reactivated subscription");
            return Ok(reactivated);
        }

        self.repo
            .create(actor.id, &target)
            .await
            .context("Failed to create subscription")?
            .ok_or_else(|| ServiceError::AlreadyExists("You are already subscribed".to_string()))
    }

    /// Deactivate one of the actor's subscriptions
    pub async fn unsubscribe(&self, actor: &User, id: i64) -> ServiceResult<Subscription> {
        let subscription = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get subscription")?
            .ok_or_else(|| ServiceError::not_found("Subscription", id))?;

        if subscription.subscriber_id != actor.id {
            return Err(ServiceError::Forbidden(
                "You can only manage your own subscriptions".to_string(),
            ));
        }
        if !subscription.is_active {
            return Ok(subscription);
        }

        Ok(self
            .repo
            .set_active(id, false)
            .await
            .context("Failed to deactivate subscription")?)
    }

    pub async fn list(
        &self,
        actor: &User,
        kind: Option<SubscriptionKind>,
        is_active: Option<bool>,
    ) -> ServiceResult<Vec<Subscription>> {
        Ok(self
            .repo
            .list_for_subscriber(actor.id, kind, is_active)
            .await
            .context("Failed to list subscriptions")?)
    }

    async fn ensure_target_exists(&self, target: &SubscriptionTarget) -> ServiceResult<()> {
        match *target {
            SubscriptionTarget::Author { author_id } => {
                self.user_repo
                    .get_by_id(author_id)
                    .await
                    .context("Failed to get author")?
                    .ok_or_else(|| ServiceError::not_found("Author", author_id))?;
            }
            SubscriptionTarget::Category { category_id } => {
                self.category_repo
                    .get_by_id(category_id)
                    .await
                    .context("Failed to get category")?
                    .ok_or_else(|| ServiceError::not_found("Category", category_id))?;
            }
        }
        Ok(())
    }
}
