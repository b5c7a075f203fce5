//! Engagement repository
//!
//! Likes and ratings. Both are unique per (post, user); inserts go through
//! `INSERT OR IGNORE` / `INSERT IGNORE` so that a duplicate, including one
//! lost to a concurrent request, is reported as `None` instead of an error.
//! A new like or rating and the notifications it triggers are written in
//! one transaction; a duplicate stores neither.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::db::repositories::notification::{store_notifications_mysql, store_notifications_sqlite};
use crate::models::{Like, NewNotification, PostStats, Rating, RatingView};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Engagement repository trait
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// Record a like along with `notify`; `None` when the user already
    /// likes the post
    async fn insert_like(
        &self,
        post_id: i64,
        user_id: i64,
        notify: &[NewNotification],
    ) -> Result<Option<Like>>;

    /// Remove a like; false when there was none
    async fn delete_like(&self, post_id: i64, user_id: i64) -> Result<bool>;

    async fn has_liked(&self, post_id: i64, user_id: i64) -> Result<bool>;

    /// A user's likes, newest first
    async fn likes_by_user(&self, user_id: i64) -> Result<Vec<Like>>;

    /// Record a rating along with `notify`; `None` when the user already
    /// rated the post
    async fn insert_rating(
        &self,
        post_id: i64,
        user_id: i64,
        rating: i32,
        review: Option<&str>,
        notify: &[NewNotification],
    ) -> Result<Option<Rating>>;

    /// Change an existing rating in place; `None` when there is none
    async fn update_rating(
        &self,
        post_id: i64,
        user_id: i64,
        rating: i32,
        review: Option<&str>,
    ) -> Result<Option<Rating>>;

    /// Remove a rating; false when there was none
    async fn delete_rating(&self, post_id: i64, user_id: i64) -> Result<bool>;

    async fn get_rating(&self, post_id: i64, user_id: i64) -> Result<Option<Rating>>;

    /// Ratings of a post with rater usernames, newest first
    async fn list_ratings(&self, post_id: i64) -> Result<Vec<RatingView>>;

    /// Aggregate likes, ratings and approved comments of a post
    async fn stats(&self, post_id: i64) -> Result<PostStats>;
}

/// SQLx-based engagement repository implementation
pub struct SqlxEngagementRepository {
    pool: DynDatabasePool,
}

impl SqlxEngagementRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EngagementRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EngagementRepository for SqlxEngagementRepository {
    async fn insert_like(
        &self,
        post_id: i64,
        user_id: i64,
        notify: &[NewNotification],
    ) -> Result<Option<Like>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                insert_like_sqlite(self.pool.sqlite()?, post_id, user_id, notify).await
            }
            DatabaseDriver::Mysql => {
                insert_like_mysql(self.pool.mysql()?, post_id, user_id, notify).await
            }
        }
    }

    async fn delete_like(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM likes WHERE post_id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(post_id)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete like")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(post_id)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete like")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn has_liked(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM likes WHERE post_id = ? AND user_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(post_id)
                .bind(user_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check like")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(post_id)
                .bind(user_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check like")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn likes_by_user(&self, user_id: i64) -> Result<Vec<Like>> {
        let sql = "SELECT id, post_id, user_id, created_at FROM likes WHERE user_id = ? \
                   ORDER BY created_at DESC, id DESC";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .bind(user_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list likes")?;
                Ok(rows.iter().map(row_to_like_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .bind(user_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list likes")?;
                Ok(rows.iter().map(row_to_like_mysql).collect())
            }
        }
    }

    async fn insert_rating(
        &self,
        post_id: i64,
        user_id: i64,
        rating: i32,
        review: Option<&str>,
        notify: &[NewNotification],
    ) -> Result<Option<Rating>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                insert_rating_sqlite(pool, post_id, user_id, rating, review, notify).await
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                insert_rating_mysql(pool, post_id, user_id, rating, review, notify).await
            }
        }
    }

    async fn update_rating(
        &self,
        post_id: i64,
        user_id: i64,
        rating: i32,
        review: Option<&str>,
    ) -> Result<Option<Rating>> {
        let sql = "UPDATE ratings SET rating = ?, review = ?, updated_at = ? \
                   WHERE post_id = ? AND user_id = ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(rating)
                .bind(review)
                .bind(now)
                .bind(post_id)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update rating")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(rating)
                .bind(review)
                .bind(now)
                .bind(post_id)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update rating")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_rating(post_id, user_id).await
    }

    async fn delete_rating(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM ratings WHERE post_id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(post_id)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete rating")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(post_id)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete rating")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_rating(&self, post_id: i64, user_id: i64) -> Result<Option<Rating>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_rating_sqlite(self.pool.sqlite()?, post_id, user_id).await,
            DatabaseDriver::Mysql => get_rating_mysql(self.pool.mysql()?, post_id, user_id).await,
        }
    }

    async fn list_ratings(&self, post_id: i64) -> Result<Vec<RatingView>> {
        let sql = r#"
            SELECT r.id, r.post_id, r.user_id, r.rating, r.review, r.created_at, r.updated_at,
                   u.username
            FROM ratings r
            INNER JOIN users u ON u.id = r.user_id
            WHERE r.post_id = ?
            ORDER BY r.created_at DESC, r.id DESC
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .bind(post_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list ratings")?;
                Ok(rows
                    .iter()
                    .map(|row| RatingView {
                        rating: row_to_rating_sqlite(row),
                        username: row.get("username"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .bind(post_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list ratings")?;
                Ok(rows
                    .iter()
                    .map(|row| RatingView {
                        rating: row_to_rating_mysql(row),
                        username: row.get("username"),
                    })
                    .collect())
            }
        }
    }

    async fn stats(&self, post_id: i64) -> Result<PostStats> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => stats_sqlite(self.pool.sqlite()?, post_id).await,
            DatabaseDriver::Mysql => stats_mysql(self.pool.mysql()?, post_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_like_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    user_id: i64,
    notify: &[NewNotification],
) -> Result<Option<Like>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let result =
        sqlx::query("INSERT OR IGNORE INTO likes (post_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to insert like")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    store_notifications_sqlite(&mut *tx, notify).await?;
    tx.commit().await.context("Failed to commit like")?;

    Ok(Some(Like {
        id: result.last_insert_rowid(),
        post_id,
        user_id,
        created_at: now,
    }))
}

async fn insert_rating_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    user_id: i64,
    rating: i32,
    review: Option<&str>,
    notify: &[NewNotification],
) -> Result<Option<Rating>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO ratings (post_id, user_id, rating, review, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(rating)
    .bind(review)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to insert rating")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    store_notifications_sqlite(&mut *tx, notify).await?;
    tx.commit().await.context("Failed to commit rating")?;

    Ok(Some(Rating {
        id: result.last_insert_rowid(),
        post_id,
        user_id,
        rating,
        review: review.map(str::to_string),
        created_at: now,
        updated_at: now,
    }))
}

async fn get_rating_sqlite(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<Option<Rating>> {
    let row = sqlx::query(
        "SELECT id, post_id, user_id, rating, review, created_at, updated_at \
         FROM ratings WHERE post_id = ? AND user_id = ?",
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get rating")?;

    Ok(row.as_ref().map(row_to_rating_sqlite))
}

async fn stats_sqlite(pool: &SqlitePool, post_id: i64) -> Result<PostStats> {
    let row = sqlx::query(
        r#"
        SELECT (SELECT COUNT(*) FROM likes WHERE post_id = ?1) AS likes_count,
               (SELECT COUNT(*) FROM ratings WHERE post_id = ?1) AS ratings_count,
               (SELECT COALESCE(SUM(rating), 0) FROM ratings WHERE post_id = ?1) AS ratings_sum,
               (SELECT COUNT(*) FROM comments WHERE post_id = ?1 AND is_approved = 1) AS comments_count
        "#,
    )
    .bind(post_id)
    .fetch_one(pool)
    .await
    .context("Failed to aggregate post engagement")?;

    let ratings_count: i64 = row.get("ratings_count");
    Ok(PostStats {
        likes_count: row.get("likes_count"),
        average_rating: PostStats::average(row.get("ratings_sum"), ratings_count),
        ratings_count,
        comments_count: row.get("comments_count"),
    })
}

fn row_to_like_sqlite(row: &sqlx::sqlite::SqliteRow) -> Like {
    Like {
        id: row.get("id"),
        post_id: row.get("post_id"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

fn row_to_rating_sqlite(row: &sqlx::sqlite::SqliteRow) -> Rating {
    Rating {
        id: row.get("id"),
        post_id: row.get("post_id"),
        user_id: row.get("user_id"),
        rating: row.get("rating"),
        review: row.get("review"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_like_mysql(
    pool: &MySqlPool,
    post_id: i64,
    user_id: i64,
    notify: &[NewNotification],
) -> Result<Option<Like>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let result =
        sqlx::query("INSERT IGNORE INTO likes (post_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to insert like")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    store_notifications_mysql(&mut *tx, notify).await?;
    tx.commit().await.context("Failed to commit like")?;

    Ok(Some(Like {
        id: result.last_insert_id() as i64,
        post_id,
        user_id,
        created_at: now,
    }))
}

async fn insert_rating_mysql(
    pool: &MySqlPool,
    post_id: i64,
    user_id: i64,
    rating: i32,
    review: Option<&str>,
    notify: &[NewNotification],
) -> Result<Option<Rating>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let result = sqlx::query(
        r#"
        INSERT IGNORE INTO ratings (post_id, user_id, rating, review, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(rating)
    .bind(review)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to insert rating")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    store_notifications_mysql(&mut *tx, notify).await?;
    tx.commit().await.context("Failed to commit rating")?;

    Ok(Some(Rating {
        id: result.last_insert_id() as i64,
        post_id,
        user_id,
        rating,
        review: review.map(str::to_string),
        created_at: now,
        updated_at: now,
    }))
}

async fn get_rating_mysql(pool: &MySqlPool, post_id: i64, user_id: i64) -> Result<Option<Rating>> {
    let row = sqlx::query(
        "SELECT id, post_id, user_id, rating, review, created_at, updated_at \
         FROM ratings WHERE post_id = ? AND user_id = ?",
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get rating")?;

    Ok(row.as_ref().map(row_to_rating_mysql))
}

async fn stats_mysql(pool: &MySqlPool, post_id: i64) -> Result<PostStats> {
    let row = sqlx::query(
        r#"
        SELECT (SELECT COUNT(*) FROM likes WHERE post_id = ?) AS likes_count,
               (SELECT COUNT(*) FROM ratings WHERE post_id = ?) AS ratings_count,
               (SELECT CAST(COALESCE(SUM(rating), 0) AS SIGNED) FROM ratings WHERE post_id = ?) AS ratings_sum,
               (SELECT COUNT(*) FROM comments WHERE post_id = ? AND is_approved = 1) AS comments_count
        "#,
    )
    .bind(post_id)
    .bind(post_id)
    .bind(post_id)
    .bind(post_id)
    .fetch_one(pool)
    .await
    .context("Failed to aggregate post engagement")?;

    let ratings_count: i64 = row.get("ratings_count");
    Ok(PostStats {
        likes_count: row.get("likes_count"),
        average_rating: PostStats::average(row.get("ratings_sum"), ratings_count),
        ratings_count,
        comments_count: row.get("comments_count"),
    })
}

fn row_to_like_mysql(row: &sqlx::mysql::MySqlRow) -> Like {
    Like {
        id: row.get("id"),
        post_id: row.get("post_id"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

fn row_to_rating_mysql(row: &sqlx::mysql::MySqlRow) -> Rating {
    Rating {
        id: row.get("id"),
        post_id: row.get("post_id"),
        user_id: row.get("user_id"),
        rating: row.get("rating"),
        review: row.get("review"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
