//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::repositories::notification::{store_notifications_mysql, store_notifications_sqlite};
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentPlacement, CommentView, NewNotification};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new approved comment, storing `notify` in the same transaction
    async fn create(
        &self,
        post_id: i64,
        author_id: i64,
        placement: CommentPlacement,
        content: &str,
        notify: &[NewNotification],
    ) -> Result<Comment>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Replace the text of a comment
    async fn update_content(&self, id: i64, content: &str) -> Result<Comment>;

    /// Delete a comment; replies go with it
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Approve or hide a comment
    async fn set_approved(&self, id: i64, approved: bool) -> Result<Option<Comment>>;

    /// Approved comments of a post, oldest first
    async fn list_approved_for_post(&self, post_id: i64) -> Result<Vec<CommentView>>;

    /// All comments written by a user, newest first
    async fn list_by_author(&self, author_id: i64) -> Result<Vec<CommentView>>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const COMMENT_COLUMNS: &str =
    "c.id, c.post_id, c.author_id, c.parent_id, c.content, c.is_approved, c.created_at, c.updated_at";

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(
        &self,
        post_id: i64,
        author_id: i64,
        placement: CommentPlacement,
        content: &str,
        notify: &[NewNotification],
    ) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                create_comment_sqlite(pool, post_id, author_id, placement, content, notify).await
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                create_comment_mysql(pool, post_id, author_id, placement, content, notify).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_comment_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_comment_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn update_content(&self, id: i64, content: &str) -> Result<Comment> {
        let sql = "UPDATE comments SET content = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(content)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update comment")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(content)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update comment")?;
            }
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Comment not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn set_approved(&self, id: i64, approved: bool) -> Result<Option<Comment>> {
        let sql = "UPDATE comments SET is_approved = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(approved)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update comment approval")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(approved)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update comment approval")?;
            }
        }
        self.get_by_id(id).await
    }

    async fn list_approved_for_post(&self, post_id: i64) -> Result<Vec<CommentView>> {
        let sql = format!(
            "SELECT {}, u.username FROM comments c INNER JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = ? AND c.is_approved = 1 ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(post_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list comments for post")?;
                Ok(rows.iter().map(row_to_view_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(post_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list comments for post")?;
                Ok(rows.iter().map(row_to_view_mysql).collect())
            }
        }
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<CommentView>> {
        let sql = format!(
            "SELECT {}, u.username FROM comments c INNER JOIN users u ON u.id = c.author_id \
             WHERE c.author_id = ? ORDER BY c.created_at DESC, c.id DESC",
            COMMENT_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(author_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list comments by author")?;
                Ok(rows.iter().map(row_to_view_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(author_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list comments by author")?;
                Ok(rows.iter().map(row_to_view_mysql).collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    placement: CommentPlacement,
    content: &str,
    notify: &[NewNotification],
) -> Result<Comment> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let result = sqlx::query(
        r#"
        INSERT INTO comments (post_id, author_id, parent_id, content, is_approved, created_at, updated_at)
        VALUES (?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(placement.parent_id())
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create comment")?;

    store_notifications_sqlite(&mut *tx, notify).await?;
    tx.commit().await.context("Failed to commit comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        post_id,
        author_id,
        placement,
        content: content.to_string(),
        is_approved: true,
        created_at: now,
        updated_at: now,
    })
}

async fn get_comment_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let sql = format!("SELECT {} FROM comments c WHERE c.id = ?", COMMENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;

    Ok(row.as_ref().map(row_to_comment_sqlite))
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        placement: CommentPlacement::from_parent(row.get("parent_id")),
        content: row.get("content"),
        is_approved: row.get("is_approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_view_sqlite(row: &sqlx::sqlite::SqliteRow) -> CommentView {
    CommentView {
        comment: row_to_comment_sqlite(row),
        author_username: row.get("username"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_comment_mysql(
    pool: &MySqlPool,
    post_id: i64,
    author_id: i64,
    placement: CommentPlacement,
    content: &str,
    notify: &[NewNotification],
) -> Result<Comment> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let result = sqlx::query(
        r#"
        INSERT INTO comments (post_id, author_id, parent_id, content, is_approved, created_at, updated_at)
        VALUES (?, ?, ?, ?, TRUE, ?, ?)
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(placement.parent_id())
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create comment")?;

    store_notifications_mysql(&mut *tx, notify).await?;
    tx.commit().await.context("Failed to commit comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        post_id,
        author_id,
        placement,
        content: content.to_string(),
        is_approved: true,
        created_at: now,
        updated_at: now,
    })
}

async fn get_comment_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let sql = format!("SELECT {} FROM comments c WHERE c.id = ?", COMMENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;

    Ok(row.as_ref().map(row_to_comment_mysql))
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        placement: CommentPlacement::from_parent(row.get("parent_id")),
        content: row.get("content"),
        is_approved: row.get("is_approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_view_mysql(row: &sqlx::mysql::MySqlRow) -> CommentView {
    CommentView {
        comment: row_to_comment_mysql(row),
        author_username: row.get("username"),
    }
}
