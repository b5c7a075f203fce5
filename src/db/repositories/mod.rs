//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the storage operations for one entity (or one
//! tightly coupled group, such as likes and ratings).

pub mod category;
pub mod comment;
pub mod engagement;
pub mod notification;
pub mod post;
pub mod profile;
pub mod session;
pub mod subscription;
pub mod tag;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use engagement::{EngagementRepository, SqlxEngagementRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use subscription::{SqlxSubscriptionRepository, SubscriptionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Fixtures shared by the repository tests. Rows are inserted with raw SQL
/// so each repository can be tested without the others.
#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::PostStatus;
    use chrono::Utc;

    pub async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    pub async fn insert_user(pool: &DynDatabasePool, username: &str) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, is_staff, created_at, updated_at) \
             VALUES (?, ?, 'x', 0, ?, ?)",
        )
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind(now)
        .bind(now)
        .execute(pool.as_sqlite().expect("sqlite pool"))
        .await
        .expect("Failed to insert user")
        .last_insert_rowid()
    }

    pub async fn insert_category(pool: &DynDatabasePool, name: &str) -> i64 {
        sqlx::query("INSERT INTO categories (name, slug, description, created_at) VALUES (?, ?, '', ?)")
            .bind(name)
            .bind(name.to_lowercase())
            .bind(Utc::now())
            .execute(pool.as_sqlite().expect("sqlite pool"))
            .await
            .expect("Failed to insert category")
            .last_insert_rowid()
    }

    pub async fn insert_post(
        pool: &DynDatabasePool,
        author_id: i64,
        slug: &str,
        status: PostStatus,
        category_id: Option<i64>,
    ) -> i64 {
        let now = Utc::now();
        let published_at = (status == PostStatus::Published).then_some(now);
        sqlx::query(
            "INSERT INTO posts (title, slug, content, excerpt, author_id, category_id, status, \
             published_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(format!("Title of {}", slug))
        .bind(slug)
        .bind("Some content that is long enough.")
        .bind("Some content...")
        .bind(author_id)
        .bind(category_id)
        .bind(status.as_str())
        .bind(published_at)
        .bind(now)
        .bind(now)
        .execute(pool.as_sqlite().expect("sqlite pool"))
        .await
        .expect("Failed to insert post")
        .last_insert_rowid()
    }
}
