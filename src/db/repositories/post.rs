//! Post repository
//!
//! Database operations for posts.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//!
//! Listing queries return [`PostSummary`] rows whose engagement figures are
//! aggregated from the likes, ratings and comments tables at read time.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::db::repositories::notification::{store_notifications_mysql, store_notifications_sqlite};
use crate::models::{
    ListParams, NewNotification, Post, PostFilter, PostStatus, PostStats, PostSummary,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post
    async fn create(&self, post: &Post) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get post by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Get a post with its author/category names and engagement figures
    async fn get_summary(&self, id: i64) -> Result<Option<PostSummary>>;

    /// Check whether a slug is taken, ignoring `exclude_id`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Persist the editable fields of a post
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Set the status and store `notify` in the same transaction;
    /// `published_at` is only written when `Some`
    async fn update_status(
        &self,
        id: i64,
        status: PostStatus,
        published_at: Option<DateTime<Utc>>,
        notify: &[NewNotification],
    ) -> Result<Post>;

    /// Add one to the view counter in a single statement
    async fn increment_views(&self, id: i64) -> Result<()>;

    /// Delete a post and everything hanging off it
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Paginated listing, newest first
    async fn list(&self, filter: &PostFilter, params: &ListParams)
        -> Result<(Vec<PostSummary>, i64)>;

    /// An author's drafts scheduled after `now`, soonest first
    async fn list_scheduled(
        &self,
        author_id: i64,
        now: DateTime<Utc>,
        params: &ListParams,
    ) -> Result<(Vec<PostSummary>, i64)>;

    /// Published posts with the most likes
    async fn most_liked(&self, limit: i64) -> Result<Vec<PostSummary>>;

    /// Rated published posts with the highest average rating
    async fn top_rated(&self, limit: i64) -> Result<Vec<PostSummary>>;

    /// Posts published since `since`, by views then likes
    async fn trending(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<PostSummary>>;

    /// Number of published posts by an author
    async fn count_published_by_author(&self, author_id: i64) -> Result<i64>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_slug_sqlite(self.pool.sqlite()?, slug).await,
            DatabaseDriver::Mysql => get_post_by_slug_mysql(self.pool.mysql()?, slug).await,
        }
    }

    async fn get_summary(&self, id: i64) -> Result<Option<PostSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_summary_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_summary_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM posts WHERE slug = ? AND (? IS NULL OR id <> ?)";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .bind(exclude_id)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check post slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .bind(exclude_id)
                .bind(exclude_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check post slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn update_status(
        &self,
        id: i64,
        status: PostStatus,
        published_at: Option<DateTime<Utc>>,
        notify: &[NewNotification],
    ) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_status_sqlite(self.pool.sqlite()?, id, status, published_at, notify).await
            }
            DatabaseDriver::Mysql => {
                update_status_mysql(self.pool.mysql()?, id, status, published_at, notify).await
            }
        }
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        let sql = "UPDATE posts SET views_count = views_count + 1 WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to increment post views")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to increment post views")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(
        &self,
        filter: &PostFilter,
        params: &ListParams,
    ) -> Result<(Vec<PostSummary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_posts_sqlite(self.pool.sqlite()?, filter, params).await,
            DatabaseDriver::Mysql => list_posts_mysql(self.pool.mysql()?, filter, params).await,
        }
    }

    async fn list_scheduled(
        &self,
        author_id: i64,
        now: DateTime<Utc>,
        params: &ListParams,
    ) -> Result<(Vec<PostSummary>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_scheduled_sqlite(self.pool.sqlite()?, author_id, now, params).await
            }
            DatabaseDriver::Mysql => {
                list_scheduled_mysql(self.pool.mysql()?, author_id, now, params).await
            }
        }
    }

    async fn most_liked(&self, limit: i64) -> Result<Vec<PostSummary>> {
        let tail = "WHERE p.status = 'published' ORDER BY likes_count DESC, p.id DESC LIMIT ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                leaderboard_sqlite(self.pool.sqlite()?, tail, None, limit).await
            }
            DatabaseDriver::Mysql => leaderboard_mysql(self.pool.mysql()?, tail, None, limit).await,
        }
    }

    async fn top_rated(&self, limit: i64) -> Result<Vec<PostSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => top_rated_sqlite(self.pool.sqlite()?, limit).await,
            DatabaseDriver::Mysql => top_rated_mysql(self.pool.mysql()?, limit).await,
        }
    }

    async fn trending(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<PostSummary>> {
        let tail = "WHERE p.status = 'published' AND p.published_at >= ? \
                    ORDER BY p.views_count DESC, likes_count DESC, p.id DESC LIMIT ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                leaderboard_sqlite(self.pool.sqlite()?, tail, Some(since), limit).await
            }
            DatabaseDriver::Mysql => {
                leaderboard_mysql(self.pool.mysql()?, tail, Some(since), limit).await
            }
        }
    }

    async fn count_published_by_author(&self, author_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM posts WHERE author_id = ? AND status = 'published'";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(author_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count author posts")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(author_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count author posts")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// Shared SQL
// ============================================================================

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, author_id, category_id, status, \
     featured_image, published_at, scheduled_at, views_count, created_at, updated_at";

const FILTER_WHERE: &str = r#"
    WHERE (? IS NULL OR p.status = ?)
      AND (? IS NULL OR p.author_id = ?)
      AND (? IS NULL OR p.category_id = ?)
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM post_tags pt WHERE pt.post_id = p.id AND pt.tag_id = ?))
"#;

const FILTER_ORDER: &str = "ORDER BY COALESCE(p.published_at, p.created_at) DESC, p.id DESC";

const SCHEDULED_WHERE: &str = r#"
    WHERE p.author_id = ? AND p.status = 'draft'
      AND p.scheduled_at IS NOT NULL AND p.scheduled_at > ?
"#;

/// Post columns joined with author/category names and aggregated engagement.
/// `ratings_sum` differs per backend because MySQL sums to DECIMAL.
fn summary_select(ratings_sum: &str) -> String {
    format!(
        r#"
        SELECT p.id, p.title, p.slug, p.content, p.excerpt, p.author_id, p.category_id,
               p.status, p.featured_image, p.published_at, p.scheduled_at, p.views_count,
               p.created_at, p.updated_at,
               u.username AS author_username,
               c.name AS category_name,
               (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
               (SELECT COUNT(*) FROM ratings r WHERE r.post_id = p.id) AS ratings_count,
               (SELECT {} FROM ratings r WHERE r.post_id = p.id) AS ratings_sum,
               (SELECT COUNT(*) FROM comments cm
                 WHERE cm.post_id = p.id AND cm.is_approved = 1) AS comments_count
        FROM posts p
        INNER JOIN users u ON u.id = p.author_id
        LEFT JOIN categories c ON c.id = p.category_id
        "#,
        ratings_sum
    )
}

fn summary_select_sqlite() -> String {
    summary_select("COALESCE(SUM(r.rating), 0)")
}

fn summary_select_mysql() -> String {
    summary_select("CAST(COALESCE(SUM(r.rating), 0) AS SIGNED)")
}

/// Rated posts only, by mean rating; wraps the summary in a derived table so
/// the ordering can use the aggregated columns.
fn top_rated_sql(summary: &str) -> String {
    format!(
        r#"
        SELECT * FROM ({}
            WHERE p.status = 'published') s
        WHERE s.ratings_count > 0
        ORDER BY (s.ratings_sum * 1.0 / s.ratings_count) DESC, s.ratings_count DESC, s.id DESC
        LIMIT ?
        "#,
        summary
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, slug, content, excerpt, author_id, category_id, status,
                           featured_image, published_at, scheduled_at, views_count,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(&post.content)
    .bind(&post.excerpt)
    .bind(post.author_id)
    .bind(post.category_id)
    .bind(post.status.as_str())
    .bind(&post.featured_image)
    .bind(post.published_at)
    .bind(post.scheduled_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        views_count: 0,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn get_post_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE slug = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn get_summary_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<PostSummary>> {
    let sql = format!("{} WHERE p.id = ?", summary_select_sqlite());
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post summary")?;

    row.as_ref().map(row_to_summary_sqlite).transpose()
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, slug = ?, content = ?, excerpt = ?, category_id = ?,
            featured_image = ?, scheduled_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(&post.content)
    .bind(&post.excerpt)
    .bind(post.category_id)
    .bind(&post.featured_image)
    .bind(post.scheduled_at)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_by_id_sqlite(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn update_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    status: PostStatus,
    published_at: Option<DateTime<Utc>>,
    notify: &[NewNotification],
) -> Result<Post> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        "UPDATE posts SET status = ?, published_at = COALESCE(?, published_at), updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(published_at)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update post status")?;

    store_notifications_sqlite(&mut *tx, notify).await?;
    tx.commit().await.context("Failed to commit status change")?;

    get_post_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after status change"))
}

fn bind_filter_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    filter: &PostFilter,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let status = filter.status.map(|s| s.as_str());
    query
        .bind(status)
        .bind(status)
        .bind(filter.author_id)
        .bind(filter.author_id)
        .bind(filter.category_id)
        .bind(filter.category_id)
        .bind(filter.tag_id)
        .bind(filter.tag_id)
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<(Vec<PostSummary>, i64)> {
    let sql = format!(
        "{} {} {} LIMIT ? OFFSET ?",
        summary_select_sqlite(),
        FILTER_WHERE,
        FILTER_ORDER
    );
    let rows = bind_filter_sqlite(sqlx::query(&sql), filter)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM posts p {}", FILTER_WHERE);
    let total: i64 = bind_filter_sqlite(sqlx::query(&count_sql), filter)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?
        .get("count");

    let items = rows
        .iter()
        .map(row_to_summary_sqlite)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn list_scheduled_sqlite(
    pool: &SqlitePool,
    author_id: i64,
    now: DateTime<Utc>,
    params: &ListParams,
) -> Result<(Vec<PostSummary>, i64)> {
    let sql = format!(
        "{} {} ORDER BY p.scheduled_at ASC, p.id ASC LIMIT ? OFFSET ?",
        summary_select_sqlite(),
        SCHEDULED_WHERE
    );
    let rows = sqlx::query(&sql)
        .bind(author_id)
        .bind(now)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list scheduled posts")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM posts p {}", SCHEDULED_WHERE);
    let total: i64 = sqlx::query(&count_sql)
        .bind(author_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .context("Failed to count scheduled posts")?
        .get("count");

    let items = rows
        .iter()
        .map(row_to_summary_sqlite)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn leaderboard_sqlite(
    pool: &SqlitePool,
    tail: &str,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<PostSummary>> {
    let sql = format!("{} {}", summary_select_sqlite(), tail);
    let mut query = sqlx::query(&sql);
    if let Some(since) = since {
        query = query.bind(since);
    }
    let rows = query
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to load leaderboard")?;

    rows.iter().map(row_to_summary_sqlite).collect()
}

async fn top_rated_sqlite(pool: &SqlitePool, limit: i64) -> Result<Vec<PostSummary>> {
    let sql = top_rated_sql(&summary_select_sqlite());
    let rows = sqlx::query(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to load top rated posts")?;

    rows.iter().map(row_to_summary_sqlite).collect()
}

fn row_to_post_sqlite(row: &SqliteRow) -> Result<Post> {
    let status: String = row.get("status");
    let status = PostStatus::from_str(&status)
        .with_context(|| format!("Invalid post status in database: {}", status))?;

    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        excerpt: row.get("excerpt"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        status,
        featured_image: row.get("featured_image"),
        published_at: row.get("published_at"),
        scheduled_at: row.get("scheduled_at"),
        views_count: row.get("views_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_summary_sqlite(row: &SqliteRow) -> Result<PostSummary> {
    let ratings_count: i64 = row.get("ratings_count");
    let ratings_sum: i64 = row.get("ratings_sum");

    Ok(PostSummary {
        post: row_to_post_sqlite(row)?,
        author_username: row.get("author_username"),
        category_name: row.get("category_name"),
        stats: PostStats {
            likes_count: row.get("likes_count"),
            average_rating: PostStats::average(ratings_sum, ratings_count),
            ratings_count,
            comments_count: row.get("comments_count"),
        },
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, slug, content, excerpt, author_id, category_id, status,
                           featured_image, published_at, scheduled_at, views_count,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(&post.content)
    .bind(&post.excerpt)
    .bind(post.author_id)
    .bind(post.category_id)
    .bind(post.status.as_str())
    .bind(&post.featured_image)
    .bind(post.published_at)
    .bind(post.scheduled_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        views_count: 0,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn get_post_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE slug = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn get_summary_mysql(pool: &MySqlPool, id: i64) -> Result<Option<PostSummary>> {
    let sql = format!("{} WHERE p.id = ?", summary_select_mysql());
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post summary")?;

    row.as_ref().map(row_to_summary_mysql).transpose()
}

async fn update_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, slug = ?, content = ?, excerpt = ?, category_id = ?,
            featured_image = ?, scheduled_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(&post.content)
    .bind(&post.excerpt)
    .bind(post.category_id)
    .bind(&post.featured_image)
    .bind(post.scheduled_at)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_by_id_mysql(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn update_status_mysql(
    pool: &MySqlPool,
    id: i64,
    status: PostStatus,
    published_at: Option<DateTime<Utc>>,
    notify: &[NewNotification],
) -> Result<Post> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        "UPDATE posts SET status = ?, published_at = COALESCE(?, published_at), updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(published_at)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update post status")?;

    store_notifications_mysql(&mut *tx, notify).await?;
    tx.commit().await.context("Failed to commit status change")?;

    get_post_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after status change"))
}

fn bind_filter_mysql<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    filter: &PostFilter,
) -> Query<'q, MySql, MySqlArguments> {
    let status = filter.status.map(|s| s.as_str());
    query
        .bind(status)
        .bind(status)
        .bind(filter.author_id)
        .bind(filter.author_id)
        .bind(filter.category_id)
        .bind(filter.category_id)
        .bind(filter.tag_id)
        .bind(filter.tag_id)
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<(Vec<PostSummary>, i64)> {
    let sql = format!(
        "{} {} {} LIMIT ? OFFSET ?",
        summary_select_mysql(),
        FILTER_WHERE,
        FILTER_ORDER
    );
    let rows = bind_filter_mysql(sqlx::query(&sql), filter)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM posts p {}", FILTER_WHERE);
    let total: i64 = bind_filter_mysql(sqlx::query(&count_sql), filter)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?
        .get("count");

    let items = rows
        .iter()
        .map(row_to_summary_mysql)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn list_scheduled_mysql(
    pool: &MySqlPool,
    author_id: i64,
    now: DateTime<Utc>,
    params: &ListParams,
) -> Result<(Vec<PostSummary>, i64)> {
    let sql = format!(
        "{} {} ORDER BY p.scheduled_at ASC, p.id ASC LIMIT ? OFFSET ?",
        summary_select_mysql(),
        SCHEDULED_WHERE
    );
    let rows = sqlx::query(&sql)
        .bind(author_id)
        .bind(now)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list scheduled posts")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM posts p {}", SCHEDULED_WHERE);
    let total: i64 = sqlx::query(&count_sql)
        .bind(author_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .context("Failed to count scheduled posts")?
        .get("count");

    let items = rows
        .iter()
        .map(row_to_summary_mysql)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn leaderboard_mysql(
    pool: &MySqlPool,
    tail: &str,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<PostSummary>> {
    let sql = format!("{} {}", summary_select_mysql(), tail);
    let mut query = sqlx::query(&sql);
    if let Some(since) = since {
        query = query.bind(since);
    }
    let rows = query
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to load leaderboard")?;

    rows.iter().map(row_to_summary_mysql).collect()
}

async fn top_rated_mysql(pool: &MySqlPool, limit: i64) -> Result<Vec<PostSummary>> {
    let sql = top_rated_sql(&summary_select_mysql());
    let rows = sqlx::query(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to load top rated posts")?;

    rows.iter().map(row_to_summary_mysql).collect()
}

fn row_to_post_mysql(row: &MySqlRow) -> Result<Post> {
    let status: String = row.get("status");
    let status = PostStatus::from_str(&status)
        .with_context(|| format!("Invalid post status in database: {}", status))?;

    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        excerpt: row.get("excerpt"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        status,
        featured_image: row.get("featured_image"),
        published_at: row.get("published_at"),
        scheduled_at: row.get("scheduled_at"),
        views_count: row.get("views_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_summary_mysql(row: &MySqlRow) -> Result<PostSummary> {
    let ratings_count: i64 = row.get("ratings_count");
    let ratings_sum: i64 = row.get("ratings_sum");

    Ok(PostSummary {
        post: row_to_post_mysql(row)?,
        author_username: row.get("author_username"),
        category_name: row.get("category_name"),
        stats: PostStats {
            likes_count: row.get("likes_count"),
            average_rating: PostStats::average(ratings_sum, ratings_count),
            ratings_count,
            comments_count: row.get("comments_count"),
        },
    })
}
