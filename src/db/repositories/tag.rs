//! Tag repository
//!
//! Database operations for tags and the post/tag association.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by exact name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Check whether a slug is taken
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// List all tags with their published post counts, by name
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;

    /// Delete a tag; returns false when it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Number of the given ids that reference existing tags
    async fn count_existing(&self, ids: &[i64]) -> Result<usize>;

    /// Tags attached to a post, by name
    async fn get_by_post(&self, post_id: i64) -> Result<Vec<Tag>>;

    /// Replace the tag set of a post
    async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<()>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tag_sqlite(self.pool.sqlite()?, tag).await,
            DatabaseDriver::Mysql => create_tag_mysql(self.pool.mysql()?, tag).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tag_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_tag_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tag_by_name_sqlite(self.pool.sqlite()?, name).await,
            DatabaseDriver::Mysql => get_tag_by_name_mysql(self.pool.mysql()?, name).await,
        }
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query("SELECT COUNT(*) as count FROM tags WHERE slug = ?")
                    .bind(slug)
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to check tag slug")?;
                row.get::<i64, _>("count")
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query("SELECT COUNT(*) as count FROM tags WHERE slug = ?")
                    .bind(slug)
                    .fetch_one(self.pool.mysql()?)
                    .await
                    .context("Failed to check tag slug")?;
                row.get::<i64, _>("count")
            }
        };
        Ok(count > 0)
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_tags_mysql(self.pool.mysql()?).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete tag")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete tag")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_existing(&self, ids: &[i64]) -> Result<usize> {
        let mut unique: Vec<i64> = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut found = 0;
        for id in unique {
            if self.get_by_id(id).await?.is_some() {
                found += 1;
            }
        }
        Ok(found)
    }

    async fn get_by_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tags_by_post_sqlite(self.pool.sqlite()?, post_id).await,
            DatabaseDriver::Mysql => get_tags_by_post_mysql(self.pool.mysql()?, post_id).await,
        }
    }

    async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_post_tags_sqlite(self.pool.sqlite()?, post_id, tag_ids).await
            }
            DatabaseDriver::Mysql => set_post_tags_mysql(self.pool.mysql()?, post_id, tag_ids).await,
        }
    }
}

const LIST_WITH_COUNTS_SQL: &str = r#"
    SELECT t.id, t.name, t.slug, t.created_at,
           COUNT(p.id) AS posts_count
    FROM tags t
    LEFT JOIN post_tags pt ON pt.tag_id = t.id
    LEFT JOIN posts p ON p.id = pt.post_id AND p.status = 'published'
    GROUP BY t.id, t.name, t.slug, t.created_at
    ORDER BY t.name ASC
"#;

const TAGS_BY_POST_SQL: &str = r#"
    SELECT t.id, t.name, t.slug, t.created_at
    FROM tags t
    INNER JOIN post_tags pt ON pt.tag_id = t.id
    WHERE pt.post_id = ?
    ORDER BY t.name ASC
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(&tag.name)
        .bind(&tag.slug)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        created_at: now,
        ..tag.clone()
    })
}

async fn get_tag_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    row.as_ref().map(row_to_tag_sqlite).transpose()
}

async fn get_tag_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_sqlite).transpose()
}

async fn list_tags_sqlite(pool: &SqlitePool) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(LIST_WITH_COUNTS_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    rows.iter()
        .map(|row| Ok(TagWithCount::new(row_to_tag_sqlite(row)?, row.get("posts_count"))))
        .collect()
}

async fn get_tags_by_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(TAGS_BY_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to get tags for post")?;

    rows.iter().map(row_to_tag_sqlite).collect()
}

async fn set_post_tags_sqlite(pool: &SqlitePool, post_id: i64, tag_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear post tags")?;

    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to attach tag to post")?;
    }

    tx.commit().await.context("Failed to commit post tags")?;
    Ok(())
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(&tag.name)
        .bind(&tag.slug)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..tag.clone()
    })
}

async fn get_tag_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    row.as_ref().map(row_to_tag_mysql).transpose()
}

async fn get_tag_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_mysql).transpose()
}

async fn list_tags_mysql(pool: &MySqlPool) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(LIST_WITH_COUNTS_SQL)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    rows.iter()
        .map(|row| Ok(TagWithCount::new(row_to_tag_mysql(row)?, row.get("posts_count"))))
        .collect()
}

async fn get_tags_by_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(TAGS_BY_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to get tags for post")?;

    rows.iter().map(row_to_tag_mysql).collect()
}

async fn set_post_tags_mysql(pool: &MySqlPool, post_id: i64, tag_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear post tags")?;

    for tag_id in tag_ids {
        sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to attach tag to post")?;
    }

    tx.commit().await.context("Failed to commit post tags")?;
    Ok(())
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_post, insert_user, setup_pool};
    use crate::models::PostStatus;

    fn tag(name: &str) -> Tag {
        Tag::new(name.to_string(), name.to_lowercase())
    }

    #[tokio::test]
    async fn test_create_and_lookup_tag() {
        let pool = setup_pool().await;
        let repo = SqlxTagRepository::new(pool);

        let created = repo.create(&tag("Rust")).await.unwrap();

        assert_eq!(repo.get_by_id(created.id).await.unwrap(), Some(created.clone()));
        assert_eq!(repo.get_by_name("Rust").await.unwrap(), Some(created));
        assert!(repo.slug_exists("rust").await.unwrap());
        assert!(repo.create(&tag("Rust")).await.is_err());
    }

    #[tokio::test]
    async fn test_set_post_tags_replaces_set() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "alice").await;
        let post = insert_post(&pool, author, "post", PostStatus::Draft, None).await;
        let repo = SqlxTagRepository::new(pool);

        let rust = repo.create(&tag("Rust")).await.unwrap();
        let web = repo.create(&tag("Web")).await.unwrap();
        let async_tag = repo.create(&tag("Async")).await.unwrap();

        repo.set_post_tags(post, &[rust.id, web.id]).await.unwrap();
        let names: Vec<String> = repo
            .get_by_post(post)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Rust", "Web"]);

        repo.set_post_tags(post, &[async_tag.id, async_tag.id]).await.unwrap();
        let tags = repo.get_by_post(post).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, async_tag.id);
    }

    #[tokio::test]
    async fn test_count_existing_ignores_duplicates() {
        let pool = setup_pool().await;
        let repo = SqlxTagRepository::new(pool);
        let rust = repo.create(&tag("Rust")).await.unwrap();

        assert_eq!(repo.count_existing(&[rust.id, rust.id]).await.unwrap(), 1);
        assert_eq!(repo.count_existing(&[rust.id, 999]).await.unwrap(), 1);
        assert_eq!(repo.count_existing(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_counts_and_delete() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "alice").await;
        let published = insert_post(&pool, author, "a", PostStatus::Published, None).await;
        let draft = insert_post(&pool, author, "b", PostStatus::Draft, None).await;
        let repo = SqlxTagRepository::new(pool);

        let rust = repo.create(&tag("Rust")).await.unwrap();
        repo.set_post_tags(published, &[rust.id]).await.unwrap();
        repo.set_post_tags(draft, &[rust.id]).await.unwrap();

        let listed = repo.list_with_counts().await.unwrap();
        assert_eq!(listed[0].posts_count, 1);

        assert!(repo.delete(rust.id).await.unwrap());
        assert!(repo.get_by_post(published).await.unwrap().is_empty());
    }
}
