//! Subscription repository
//!
//! A subscription row stores its target as `kind` plus exactly one of
//! `author_id` / `category_id`. Rows are never deleted by the application;
//! unsubscribing clears `is_active`.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Subscription, SubscriptionKind, SubscriptionTarget};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Subscription>>;

    /// Existing row for (subscriber, target), active or not
    async fn find(
        &self,
        subscriber_id: i64,
        target: &SubscriptionTarget,
    ) -> Result<Option<Subscription>>;

    /// Insert an active subscription; `None` when the unique constraint
    /// already holds a row for this pair
    async fn create(
        &self,
        subscriber_id: i64,
        target: &SubscriptionTarget,
    ) -> Result<Option<Subscription>>;

    /// Flip the active flag of a subscription
    async fn set_active(&self, id: i64, active: bool) -> Result<Subscription>;

    /// A subscriber's subscriptions, newest first
    async fn list_for_subscriber(
        &self,
        subscriber_id: i64,
        kind: Option<SubscriptionKind>,
        is_active: Option<bool>,
    ) -> Result<Vec<Subscription>>;

    /// Users with an active subscription to the given target, in
    /// subscription order
    async fn active_subscribers(&self, target: &SubscriptionTarget) -> Result<Vec<i64>>;
}

/// SQLx-based subscription repository implementation
pub struct SqlxSubscriptionRepository {
    pool: DynDatabasePool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubscriptionRepository> {
        Arc::new(Self::new(pool))
    }
}

const SUBSCRIPTION_COLUMNS: &str =
    "id, subscriber_id, kind, author_id, category_id, is_active, created_at";

/// `WHERE` fragment matching a target; binds kind, author_id, category_id.
const TARGET_MATCH: &str = "kind = ? \
     AND ((author_id IS NULL AND ? IS NULL) OR author_id = ?) \
     AND ((category_id IS NULL AND ? IS NULL) OR category_id = ?)";

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Subscription>> {
        let sql = format!("SELECT {} FROM subscriptions WHERE id = ?", SUBSCRIPTION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get subscription")?;
                row.as_ref().map(row_to_subscription_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get subscription")?;
                row.as_ref().map(row_to_subscription_mysql).transpose()
            }
        }
    }

    async fn find(
        &self,
        subscriber_id: i64,
        target: &SubscriptionTarget,
    ) -> Result<Option<Subscription>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_subscription_sqlite(self.pool.sqlite()?, subscriber_id, target).await
            }
            DatabaseDriver::Mysql => {
                find_subscription_mysql(self.pool.mysql()?, subscriber_id, target).await
            }
        }
    }

    async fn create(
        &self,
        subscriber_id: i64,
        target: &SubscriptionTarget,
    ) -> Result<Option<Subscription>> {
        let now = Utc::now();
        let inserted_id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let result = sqlx::query(
                    "INSERT OR IGNORE INTO subscriptions \
                     (subscriber_id, kind, author_id, category_id, is_active, created_at) \
                     VALUES (?, ?, ?, ?, 1, ?)",
                )
                .bind(subscriber_id)
                .bind(target.kind().as_str())
                .bind(target.author_id())
                .bind(target.category_id())
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create subscription")?;
                (result.rows_affected() > 0).then(|| result.last_insert_rowid())
            }
            DatabaseDriver::Mysql => {
                let result = sqlx::query(
                    "INSERT IGNORE INTO subscriptions \
                     (subscriber_id, kind, author_id, category_id, is_active, created_at) \
                     VALUES (?, ?, ?, ?, TRUE, ?)",
                )
                .bind(subscriber_id)
                .bind(target.kind().as_str())
                .bind(target.author_id())
                .bind(target.category_id())
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create subscription")?;
                (result.rows_affected() > 0).then(|| result.last_insert_id() as i64)
            }
        };

        Ok(inserted_id.map(|id| Subscription {
            id,
            subscriber_id,
            target: *target,
            is_active: true,
            created_at: now,
        }))
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<Subscription> {
        let sql = "UPDATE subscriptions SET is_active = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(active)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update subscription")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(active)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update subscription")?;
            }
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Subscription not found after update"))
    }

    async fn list_for_subscriber(
        &self,
        subscriber_id: i64,
        kind: Option<SubscriptionKind>,
        is_active: Option<bool>,
    ) -> Result<Vec<Subscription>> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE subscriber_id = ? \
             AND (? IS NULL OR kind = ?) AND (? IS NULL OR is_active = ?) \
             ORDER BY created_at DESC, id DESC",
            SUBSCRIPTION_COLUMNS
        );
        let kind = kind.map(|k| k.as_str());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(subscriber_id)
                    .bind(kind)
                    .bind(kind)
                    .bind(is_active)
                    .bind(is_active)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list subscriptions")?;
                rows.iter().map(row_to_subscription_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(subscriber_id)
                    .bind(kind)
                    .bind(kind)
                    .bind(is_active)
                    .bind(is_active)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list subscriptions")?;
                rows.iter().map(row_to_subscription_mysql).collect()
            }
        }
    }

    async fn active_subscribers(&self, target: &SubscriptionTarget) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT subscriber_id FROM subscriptions WHERE is_active = 1 AND {} ORDER BY id ASC",
            TARGET_MATCH
        );
        let (kind, author_id, category_id) =
            (target.kind().as_str(), target.author_id(), target.category_id());
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(kind)
                .bind(author_id)
                .bind(author_id)
                .bind(category_id)
                .bind(category_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to load subscribers")?
                .iter()
                .map(|row| row.get("subscriber_id"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(kind)
                .bind(author_id)
                .bind(author_id)
                .bind(category_id)
                .bind(category_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to load subscribers")?
                .iter()
                .map(|row| row.get("subscriber_id"))
                .collect(),
        };
        Ok(ids)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_subscription_sqlite(
    pool: &SqlitePool,
    subscriber_id: i64,
    target: &SubscriptionTarget,
) -> Result<Option<Subscription>> {
    let sql = format!(
        "SELECT {} FROM subscriptions WHERE subscriber_id = ? AND {}",
        SUBSCRIPTION_COLUMNS, TARGET_MATCH
    );
    let row = sqlx::query(&sql)
        .bind(subscriber_id)
        .bind(target.kind().as_str())
        .bind(target.author_id())
        .bind(target.author_id())
        .bind(target.category_id())
        .bind(target.category_id())
        .fetch_optional(pool)
        .await
        .context("Failed to find subscription")?;

    row.as_ref().map(row_to_subscription_sqlite).transpose()
}

fn row_to_subscription_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Subscription> {
    let kind: String = row.get("kind");
    let target = SubscriptionTarget::from_parts(&kind, row.get("author_id"), row.get("category_id"))
        .with_context(|| format!("Malformed subscription target of kind {}", kind))?;

    Ok(Subscription {
        id: row.get("id"),
        subscriber_id: row.get("subscriber_id"),
        target,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn find_subscription_mysql(
    pool: &MySqlPool,
    subscriber_id: i64,
    target: &SubscriptionTarget,
) -> Result<Option<Subscription>> {
    let sql = format!(
        "SELECT {} FROM subscriptions WHERE subscriber_id = ? AND {}",
        SUBSCRIPTION_COLUMNS, TARGET_MATCH
    );
    let row = sqlx::query(&sql)
        .bind(subscriber_id)
        .bind(target.kind().as_str())
        .bind(target.author_id())
        .bind(target.author_id())
        .bind(target.category_id())
        .bind(target.category_id())
        .fetch_optional(pool)
        .await
        .context("Failed to find subscription")?;

    row.as_ref().map(row_to_subscription_mysql).transpose()
}

fn row_to_subscription_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Subscription> {
    let kind: String = row.get("kind");
    let target = SubscriptionTarget::from_parts(&kind, row.get("author_id"), row.get("category_id"))
        .with_context(|| format!("Malformed subscription target of kind {}", kind))?;

    Ok(Subscription {
        id: row.get("id"),
        subscriber_id: row.get("subscriber_id"),
        target,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_category, insert_user, setup_pool};

    #[tokio::test]
    async fn test_create_and_find() {
        let pool = setup_pool().await;
        let reader = insert_user(&pool, "bob").await;
        let author = insert_user(&pool, "alice").await;
        let repo = SqlxSubscriptionRepository::new(pool);
        let target = SubscriptionTarget::Author { author_id: author };

        let created = repo.create(reader, &target).await.unwrap().unwrap();
        assert!(created.is_active);

        let found = repo.find(reader, &target).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.target, target);

        assert!(repo.create(reader, &target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_author_and_category_targets_coexist() {
        let pool = setup_pool().await;
        let reader = insert_user(&pool, "bob").await;
        let author = insert_user(&pool, "alice").await;
        let category = insert_category(&pool, "Rust").await;
        let other = insert_category(&pool, "Go").await;
        let repo = SqlxSubscriptionRepository::new(pool);

        repo.create(reader, &SubscriptionTarget::Author { author_id: author })
            .await
            .unwrap()
            .unwrap();
        repo.create(reader, &SubscriptionTarget::Category { category_id: category })
            .await
            .unwrap()
            .unwrap();
        repo.create(reader, &SubscriptionTarget::Category { category_id: other })
            .await
            .unwrap()
            .unwrap();

        let all = repo.list_for_subscriber(reader, None, None).await.unwrap();
        assert_eq!(all.len(), 3);
        let categories = repo
            .list_for_subscriber(reader, Some(SubscriptionKind::Category), None)
            .await
            .unwrap();
        assert_eq!(categories.len(), 2);
    }

    #[tokio::test]
    async fn test_active_subscribers_skip_inactive() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let carol = insert_user(&pool, "carol").await;
        let repo = SqlxSubscriptionRepository::new(pool);
        let target = SubscriptionTarget::Author { author_id: author };

        repo.create(bob, &target).await.unwrap();
        let carols = repo.create(carol, &target).await.unwrap().unwrap();
        repo.set_active(carols.id, false).await.unwrap();

        assert_eq!(repo.active_subscribers(&target).await.unwrap(), vec![bob]);

        let inactive = repo
            .list_for_subscriber(carol, None, Some(false))
            .await
            .unwrap();
        assert_eq!(inactive.len(), 1);

        let reactivated = repo.set_active(carols.id, true).await.unwrap();
        assert_eq!(reactivated.id, carols.id);
        assert_eq!(repo.active_subscribers(&target).await.unwrap(), vec![bob, carol]);
    }
}
