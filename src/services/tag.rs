//! Tag service
//!
//! Any signed-in user may create tags; only staff may delete them.

use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount, User};
use crate::services::error::{ensure_staff, ServiceError, ServiceResult};
use crate::services::slug::{slugify, with_suffix};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 50;

/// Input for creating a tag
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTagInput {
    pub name: String,
}

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, actor: &User, input: CreateTagInput) -> ServiceResult<Tag> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Tag name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ServiceError::ValidationError(format!(
                "Tag name cannot exceed {} characters",
                MAX_NAME_LEN
            )));
        }

        if self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to check tag name")?
            .is_some()
        {
            return Err(ServiceError::AlreadyExists(format!(
                "Tag '{}' already exists",
                name
            )));
        }

        let base = slugify(name, "tag");
        let mut slug = base.clone();
        let mut n = 2;
        while self
            .repo
            .slug_exists(&slug)
            .await
            .context("Failed to check tag slug")?
        {
            slug = with_suffix(&base, n);
            n += 1;
        }

        let created = self
            .repo
            .create(&Tag::new(name.to_string(), slug))
            .await
            .context("Failed to create tag")?;
        tracing::debug!(tag_id = created.id, user_id = actor.id, "Created tag {}", created.name);
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Tag> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag")?
            .ok_or_else(|| ServiceError::not_found("Tag", id))
    }

    /// All tags by name, with their published post counts
    pub async fn list(&self) -> ServiceResult<Vec<TagWithCount>> {
        Ok(self
            .repo
            .list_with_counts()
            .await
            .context("Failed to list tags")?)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        ensure_staff(actor, "delete tags")?;
        if !self.repo.delete(id).await.context("Failed to delete tag")? {
            return Err(ServiceError::not_found("Tag", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{test_support::setup_pool, SqlxTagRepository};
    use crate::services::test_support::{regular_user, staff_user};

    fn input(name: &str) -> CreateTagInput {
        CreateTagInput {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_any_user_creates_staff_deletes() {
        let pool = setup_pool().await;
        let staff = staff_user(&pool, "admin").await;
        let reader = regular_user(&pool, "reader").await;
        let service = TagService::new(SqlxTagRepository::boxed(pool));

        let tag = service.create(&reader, input("Async Rust")).await.unwrap();
        assert_eq!(tag.slug, "async-rust");

        let denied = service.delete(&reader, tag.id).await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));

        service.delete(&staff, tag.id).await.unwrap();
        assert!(matches!(service.get(tag.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_names() {
        let pool = setup_pool().await;
        let reader = regular_user(&pool, "reader").await;
        let service = TagService::new(SqlxTagRepository::boxed(pool));

        service.create(&reader, input("rust")).await.unwrap();
        assert!(matches!(
            service.create(&reader, input("rust")).await,
            Err(ServiceError::AlreadyExists(_))
        ));
        assert!(matches!(
            service.create(&reader, input("")).await,
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(&reader, input(&"x".repeat(51))).await,
            Err(ServiceError::ValidationError(_))
        ));

        let other = service.create(&reader, input("Rust!")).await.unwrap();
        assert_eq!(other.slug, "rust-2");
        assert_eq!(service.list().await.unwrap().len(), 2);
    }
}
