//! Profile repository
//!
//! One profile row per user, created at registration or on first read.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Profile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Profile repository trait
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Get the profile belonging to a user
    async fn get_by_user(&self, user_id: i64) -> Result<Option<Profile>>;

    /// Create an empty profile for a user; returns the existing one if present
    async fn create_for_user(&self, user_id: i64) -> Result<Profile>;

    /// Persist the editable fields of a profile
    async fn update(&self, profile: &Profile) -> Result<Profile>;
}

/// SQLx-based profile repository implementation
pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn get_by_user(&self, user_id: i64) -> Result<Option<Profile>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_profile_sqlite(self.pool.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => get_profile_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn create_for_user(&self, user_id: i64) -> Result<Profile> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_profile_sqlite(self.pool.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => create_profile_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn update(&self, profile: &Profile) -> Result<Profile> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_profile_sqlite(self.pool.sqlite()?, profile).await,
            DatabaseDriver::Mysql => update_profile_mysql(self.pool.mysql()?, profile).await,
        }
    }
}

const PROFILE_COLUMNS: &str =
    "id, user_id, bio, picture, website, location, birth_date, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_profile_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get profile")?;

    row.as_ref().map(row_to_profile_sqlite).transpose()
}

async fn create_profile_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Profile> {
    let now = Utc::now();
    sqlx::query(
        "INSERT OR IGNORE INTO profiles (user_id, bio, created_at, updated_at) VALUES (?, '', ?, ?)",
    )
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create profile")?;

    get_profile_sqlite(pool, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Profile not found after create"))
}

async fn update_profile_sqlite(pool: &SqlitePool, profile: &Profile) -> Result<Profile> {
    sqlx::query(
        r#"
        UPDATE profiles
        SET bio = ?, picture = ?, website = ?, location = ?, birth_date = ?, updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(&profile.bio)
    .bind(&profile.picture)
    .bind(&profile.website)
    .bind(&profile.location)
    .bind(profile.birth_date)
    .bind(Utc::now())
    .bind(profile.user_id)
    .execute(pool)
    .await
    .context("Failed to update profile")?;

    get_profile_sqlite(pool, profile.user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Profile not found after update"))
}

fn row_to_profile_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Profile> {
    Ok(Profile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        bio: row.get("bio"),
        picture: row.get("picture"),
        website: row.get("website"),
        location: row.get("location"),
        birth_date: row.get("birth_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_profile_mysql(pool: &MySqlPool, user_id: i64) -> Result<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get profile")?;

    row.as_ref().map(row_to_profile_mysql).transpose()
}

async fn create_profile_mysql(pool: &MySqlPool, user_id: i64) -> Result<Profile> {
    let now = Utc::now();
    sqlx::query(
        "INSERT IGNORE INTO profiles (user_id, bio, created_at, updated_at) VALUES (?, '', ?, ?)",
    )
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create profile")?;

    get_profile_mysql(pool, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Profile not found after create"))
}

async fn update_profile_mysql(pool: &MySqlPool, profile: &Profile) -> Result<Profile> {
    sqlx::query(
        r#"
        UPDATE profiles
        SET bio = ?, picture = ?, website = ?, location = ?, birth_date = ?, updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(&profile.bio)
    .bind(&profile.picture)
    .bind(&profile.website)
    .bind(&profile.location)
    .bind(profile.birth_date)
    .bind(Utc::now())
    .bind(profile.user_id)
    .execute(pool)
    .await
    .context("Failed to update profile")?;

    get_profile_mysql(pool, profile.user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Profile not found after update"))
}

fn row_to_profile_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Profile> {
    Ok(Profile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        bio: row.get("bio"),
        picture: row.get("picture"),
        website: row.get("website"),
        location: row.get("location"),
        birth_date: row.get("birth_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
