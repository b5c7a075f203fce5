//! Database layer
//!
//! Storage for the blogging platform. Supports:
//! - SQLite (default, single-file deployment)
//! - MySQL (for larger deployments)
//!
//! Uniqueness of likes, ratings and subscriptions is enforced here by
//! table constraints; the services rely on them to settle racing inserts.
//!
//! # Usage
//!
//! ```ignore
//! use quillnote::config::DatabaseConfig;
//! use quillnote::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
