//! Services layer - Business logic
//!
//! Services enforce the engagement rules on top of the repositories:
//! - Ownership and staff checks
//! - Validation and uniqueness rules
//! - The post lifecycle and notification fan-out

pub mod category;
pub mod comment;
pub mod engagement;
pub mod error;
pub mod notification;
pub mod password;
pub mod post;
pub mod profile;
pub mod slug;
pub mod subscription;
pub mod tag;
pub mod user;

pub use category::CategoryService;
pub use comment::CommentService;
pub use engagement::EngagementService;
pub use error::{ServiceError, ServiceResult};
pub use notification::NotificationService;
pub use password::{hash_password, verify_password};
pub use post::{derive_excerpt, PostQuery, PostService};
pub use profile::{gravatar_url, ProfileService};
pub use slug::slugify;
pub use subscription::{SubscribeInput, SubscriptionService};
pub use tag::{CreateTagInput, TagService};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};

/// Users for service tests, inserted through the repository fixtures.
#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::repositories::{test_support::insert_user, SqlxUserRepository, UserRepository};
    use crate::db::DynDatabasePool;
    use crate::models::User;

    pub async fn regular_user(pool: &DynDatabasePool, username: &str) -> User {
        let id = insert_user(pool, username).await;
        SqlxUserRepository::new(pool.clone())
            .get_by_id(id)
            .await
            .expect("Failed to load user")
            .expect("User should exist")
    }

    pub async fn staff_user(pool: &DynDatabasePool, username: &str) -> User {
        let id = insert_user(pool, username).await;
        sqlx::query("UPDATE users SET is_staff = 1 WHERE id = ?")
            .bind(id)
            .execute(pool.as_sqlite().expect("sqlite pool"))
            .await
            .expect("Failed to promote user");
        SqlxUserRepository::new(pool.clone())
            .get_by_id(id)
            .await
            .expect("Failed to load user")
            .expect("User should exist")
    }
}
