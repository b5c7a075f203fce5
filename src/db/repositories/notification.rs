//! Notification repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, NewNotification, Notification, NotificationFilter, NotificationKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

/// Notification repository trait
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Store a batch of notifications atomically; returns how many were stored
    async fn insert_many(&self, notifications: &[NewNotification]) -> Result<usize>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>>;

    /// A recipient's notifications, newest first, with the unpaged total
    async fn list(
        &self,
        recipient_id: i64,
        filter: &NotificationFilter,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)>;

    async fn mark_read(&self, id: i64) -> Result<()>;

    /// Mark every unread notification of a recipient; returns the number changed
    async fn mark_all_read(&self, recipient_id: i64) -> Result<u64>;

    async fn unread_count(&self, recipient_id: i64) -> Result<i64>;
}

/// SQLx-based notification repository implementation
pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, kind, post_id, sender_id, message, is_read, created_at";

const LIST_WHERE: &str =
    "recipient_id = ? AND (? IS NULL OR is_read = ?) AND (? IS NULL OR kind = ?)";

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn insert_many(&self, notifications: &[NewNotification]) -> Result<usize> {
        if notifications.is_empty() {
            return Ok(0);
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                insert_notifications_sqlite(self.pool.sqlite()?, notifications).await
            }
            DatabaseDriver::Mysql => {
                insert_notifications_mysql(self.pool.mysql()?, notifications).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let sql = format!("SELECT {} FROM notifications WHERE id = ?", NOTIFICATION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get notification")?;
                row.as_ref().map(row_to_notification_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get notification")?;
                row.as_ref().map(row_to_notification_mysql).transpose()
            }
        }
    }

    async fn list(
        &self,
        recipient_id: i64,
        filter: &NotificationFilter,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_notifications_sqlite(self.pool.sqlite()?, recipient_id, filter, params).await
            }
            DatabaseDriver::Mysql => {
                list_notifications_mysql(self.pool.mysql()?, recipient_id, filter, params).await
            }
        }
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        let sql = "UPDATE notifications SET is_read = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(true)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to mark notification read")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(true)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to mark notification read")?;
            }
        }
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: i64) -> Result<u64> {
        let sql = "UPDATE notifications SET is_read = ? WHERE recipient_id = ? AND is_read = ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(true)
                .bind(recipient_id)
                .bind(false)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(true)
                .bind(recipient_id)
                .bind(false)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
        };
        Ok(result)
    }

    async fn unread_count(&self, recipient_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM notifications WHERE recipient_id = ? AND is_read = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(recipient_id)
                .bind(false)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count unread notifications")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(recipient_id)
                .bind(false)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count unread notifications")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_notifications_sqlite(
    pool: &SqlitePool,
    notifications: &[NewNotification],
) -> Result<usize> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let stored = store_notifications_sqlite(&mut *tx, notifications).await?;
    tx.commit().await.context("Failed to commit notifications")?;
    Ok(stored)
}

/// Insert notifications on a connection the caller holds, usually inside
/// the transaction that records the triggering change
pub(crate) async fn store_notifications_sqlite(
    conn: &mut SqliteConnection,
    notifications: &[NewNotification],
) -> Result<usize> {
    let now = Utc::now();
    for n in notifications {
        sqlx::query(
            "INSERT INTO notifications \
             (recipient_id, kind, post_id, sender_id, message, is_read, created_at) \
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(n.recipient_id)
        .bind(n.kind.as_str())
        .bind(n.post_id)
        .bind(n.sender_id)
        .bind(&n.message)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert notification")?;
    }
    Ok(notifications.len())
}

async fn list_notifications_sqlite(
    pool: &SqlitePool,
    recipient_id: i64,
    filter: &NotificationFilter,
    params: &ListParams,
) -> Result<(Vec<Notification>, i64)> {
    let kind = filter.kind.map(|k| k.as_str());

    let total: i64 = sqlx::query(&format!(
        "SELECT COUNT(*) AS count FROM notifications WHERE {}",
        LIST_WHERE
    ))
    .bind(recipient_id)
    .bind(filter.is_read)
    .bind(filter.is_read)
    .bind(kind)
    .bind(kind)
    .fetch_one(pool)
    .await
    .context("Failed to count notifications")?
    .get("count");

    let rows = sqlx::query(&format!(
        "SELECT {} FROM notifications WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        NOTIFICATION_COLUMNS, LIST_WHERE
    ))
    .bind(recipient_id)
    .bind(filter.is_read)
    .bind(filter.is_read)
    .bind(kind)
    .bind(kind)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list notifications")?;

    let items = rows
        .iter()
        .map(row_to_notification_sqlite)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    Ok(Notification {
        id: row.get("id"),
        recipient_id: row.get("recipient_id"),
        kind: NotificationKind::from_str(&kind)
            .with_context(|| format!("Unknown notification kind: {}", kind))?,
        post_id: row.get("post_id"),
        sender_id: row.get("sender_id"),
        message: row.get("message"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_notifications_mysql(
    pool: &MySqlPool,
    notifications: &[NewNotification],
) -> Result<usize> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let stored = store_notifications_mysql(&mut *tx, notifications).await?;
    tx.commit().await.context("Failed to commit notifications")?;
    Ok(stored)
}

pub(crate) async fn store_notifications_mysql(
    conn: &mut MySqlConnection,
    notifications: &[NewNotification],
) -> Result<usize> {
    let now = Utc::now();
    for n in notifications {
        sqlx::query(
            "INSERT INTO notifications \
             (recipient_id, kind, post_id, sender_id, message, is_read, created_at) \
             VALUES (?, ?, ?, ?, ?, FALSE, ?)",
        )
        .bind(n.recipient_id)
        .bind(n.kind.as_str())
        .bind(n.post_id)
        .bind(n.sender_id)
        .bind(&n.message)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert notification")?;
    }
    Ok(notifications.len())
}

async fn list_notifications_mysql(
    pool: &MySqlPool,
    recipient_id: i64,
    filter: &NotificationFilter,
    params: &ListParams,
) -> Result<(Vec<Notification>, i64)> {
    let kind = filter.kind.map(|k| k.as_str());

    let total: i64 = sqlx::query(&format!(
        "SELECT COUNT(*) AS count FROM notifications WHERE {}",
        LIST_WHERE
    ))
    .bind(recipient_id)
    .bind(filter.is_read)
    .bind(filter.is_read)
    .bind(kind)
    .bind(kind)
    .fetch_one(pool)
    .await
    .context("Failed to count notifications")?
    .get("count");

    let rows = sqlx::query(&format!(
        "SELECT {} FROM notifications WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        NOTIFICATION_COLUMNS, LIST_WHERE
    ))
    .bind(recipient_id)
    .bind(filter.is_read)
    .bind(filter.is_read)
    .bind(kind)
    .bind(kind)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list notifications")?;

    let items = rows
        .iter()
        .map(row_to_notification_mysql)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

fn row_to_notification_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    Ok(Notification {
        id: row.get("id"),
        recipient_id: row.get("recipient_id"),
        kind: NotificationKind::from_str(&kind)
            .with_context(|| format!("Unknown notification kind: {}", kind))?,
        post_id: row.get("post_id"),
        sender_id: row.get("sender_id"),
        message: row.get("message"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_post, insert_user, setup_pool};
    use crate::models::PostStatus;

    async fn seeded() -> (SqlxNotificationRepository, i64, i64, i64) {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let post = insert_post(&pool, alice, "hello", PostStatus::Published, None).await;
        (SqlxNotificationRepository::new(pool), alice, bob, post)
    }

    #[tokio::test]
    async fn test_insert_many_and_list() {
        let (repo, alice, bob, post) = seeded().await;
        let batch = vec![
            NewNotification::new(alice, NotificationKind::NewLike, Some(post), Some(bob), "liked"),
            NewNotification::new(alice, NotificationKind::NewComment, Some(post), Some(bob), "commented"),
            NewNotification::new(bob, NotificationKind::NewPost, Some(post), Some(alice), "posted"),
        ];
        assert_eq!(repo.insert_many(&batch).await.unwrap(), 3);
        assert_eq!(repo.insert_many(&[]).await.unwrap(), 0);

        let (items, total) = repo
            .list(alice, &NotificationFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        // Same timestamp within a batch; id breaks the tie
        assert_eq!(items[0].message, "commented");
        assert_eq!(items[1].message, "liked");
        assert!(items.iter().all(|n| !n.is_read));
    }

    #[tokio::test]
    async fn test_filters_and_paging() {
        let (repo, alice, bob, post) = seeded().await;
        let batch: Vec<_> = (0..5)
            .map(|i| {
                let kind = if i % 2 == 0 { NotificationKind::NewLike } else { NotificationKind::NewRating };
                NewNotification::new(alice, kind, Some(post), Some(bob), format!("n{}", i))
            })
            .collect();
        repo.insert_many(&batch).await.unwrap();

        let likes = NotificationFilter { is_read: None, kind: Some(NotificationKind::NewLike) };
        let (items, total) = repo.list(alice, &likes, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
        assert!(items.iter().all(|n| n.kind == NotificationKind::NewLike));

        let (page, total) = repo
            .list(alice, &NotificationFilter::default(), &ListParams::new(2, 2))
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_and_unread_count() {
        let (repo, alice, bob, post) = seeded().await;
        let batch: Vec<_> = (0..3)
            .map(|i| NewNotification::new(alice, NotificationKind::NewLike, Some(post), Some(bob), format!("n{}", i)))
            .collect();
        repo.insert_many(&batch).await.unwrap();
        assert_eq!(repo.unread_count(alice).await.unwrap(), 3);

        let (items, _) = repo
            .list(alice, &NotificationFilter::default(), &ListParams::default())
            .await
            .unwrap();
        repo.mark_read(items[0].id).await.unwrap();
        repo.mark_read(items[0].id).await.unwrap();
        assert!(repo.get_by_id(items[0].id).await.unwrap().unwrap().is_read);
        assert_eq!(repo.unread_count(alice).await.unwrap(), 2);

        let unread = NotificationFilter { is_read: Some(false), kind: None };
        let (items, total) = repo.list(alice, &unread, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        assert_eq!(repo.mark_all_read(alice).await.unwrap(), 2);
        assert_eq!(repo.mark_all_read(alice).await.unwrap(), 0);
        assert_eq!(repo.unread_count(alice).await.unwrap(), 0);
    }
}
