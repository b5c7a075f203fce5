//! Category service
//!
//! Categories are managed by staff only. Names are unique; slugs are
//! derived from the name and suffixed when two names collapse to the same
//! slug.

use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput, User};
use crate::services::error::{ensure_staff, ServiceError, ServiceResult};
use crate::services::slug::{slugify, with_suffix};
use anyhow::Context;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 100;

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        actor: &User,
        input: CreateCategoryInput,
    ) -> ServiceResult<Category> {
        ensure_staff(actor, "create categories")?;
        let name = validate_name(&input.name)?;

        if self
            .repo
            .name_exists(&name, None)
            .await
            .context("Failed to check category name")?
        {
            return Err(ServiceError::AlreadyExists(format!(
                "Category '{}' already exists",
                name
            )));
        }

        let slug = self.unique_slug(&name, None).await?;
        let category = Category::new(name, slug, input.description.unwrap_or_default());
        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;

        tracing::info!(category_id = created.id, "Created category {}", created.name);
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Category> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }

    /// All categories by name, with their published post counts
    pub async fn list(&self) -> ServiceResult<Vec<CategoryWithCount>> {
        Ok(self
            .repo
            .list_with_counts()
            .await
            .context("Failed to list categories")?)
    }

    /// Rename or re-describe a category. A new name re-derives the slug.
    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateCategoryInput,
    ) -> ServiceResult<Category> {
        ensure_staff(actor, "update categories")?;
        let mut category = self.get(id).await?;

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            if name != category.name {
                if self
                    .repo
                    .name_exists(&name, Some(id))
                    .await
                    .context("Failed to check category name")?
                {
                    return Err(ServiceError::AlreadyExists(format!(
                        "Category '{}' already exists",
                        name
                    )));
                }
                category.slug = self.unique_slug(&name, Some(id)).await?;
                category.name = name;
            }
        }
        if let Some(description) = input.description {
            category.description = description;
        }

        Ok(self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?)
    }

    /// Delete a category. Its posts become uncategorized and its
    /// subscriptions are removed.
    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        ensure_staff(actor, "delete categories")?;
        if !self
            .repo
            .delete(id)
            .await
            .context("Failed to delete category")?
        {
            return Err(ServiceError::not_found("Category", id));
        }
        tracing::info!(category_id = id, "Deleted category");
        Ok(())
    }

    async fn unique_slug(&self, name: &str, exclude_id: Option<i64>) -> ServiceResult<String> {
        let base = slugify(name, "category");
        let mut candidate = base.clone();
        let mut n = 2;
        while self
            .repo
            .slug_exists(&candidate, exclude_id)
            .await
            .context("Failed to check category slug")?
        {
            candidate = with_suffix(&base, n);
            n += 1;
        }
        Ok(candidate)
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "Category name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::ValidationError(format!(
            "Category name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{test_support::setup_pool, SqlxCategoryRepository};
    use crate::services::test_support::{regular_user, staff_user};

    async fn setup() -> (CategoryService, User, User) {
        let pool = setup_pool().await;
        let staff = staff_user(&pool, "admin").await;
        let reader = regular_user(&pool, "reader").await;
        (
            CategoryService::new(SqlxCategoryRepository::boxed(pool)),
            staff,
            reader,
        )
    }

    #[tokio::test]
    async fn test_staff_creates_category_with_derived_slug() {
        let (service, staff, _) = setup().await;
        let created = service
            .create(&staff, CreateCategoryInput::new("Systems Programming").with_description("Low level"))
            .await
            .unwrap();
        assert_eq!(created.slug, "systems-programming");
        assert_eq!(created.description, "Low level");
    }

    #[tokio::test]
    async fn test_non_staff_forbidden() {
        let (service, staff, reader) = setup().await;
        let result = service.create(&reader, CreateCategoryInput::new("Rust")).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let created = service.create(&staff, CreateCategoryInput::new("Rust")).await.unwrap();
        let update = service
            .update(&reader, created.id, UpdateCategoryInput::default())
            .await;
        assert!(matches!(update, Err(ServiceError::Forbidden(_))));
        let delete = service.delete(&reader, created.id).await;
        assert!(matches!(delete, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_duplicate_name_and_colliding_slug() {
        let (service, staff, _) = setup().await;
        service.create(&staff, CreateCategoryInput::new("Rust")).await.unwrap();

        let dup = service.create(&staff, CreateCategoryInput::new("  Rust ")).await;
        assert!(matches!(dup, Err(ServiceError::AlreadyExists(_))));

        let similar = service.create(&staff, CreateCategoryInput::new("Rust!")).await.unwrap();
        assert_eq!(similar.slug, "rust-2");

        let empty = service.create(&staff, CreateCategoryInput::new("   ")).await;
        assert!(matches!(empty, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_update_rederives_slug_and_delete() {
        let (service, staff, _) = setup().await;
        let created = service.create(&staff, CreateCategoryInput::new("Rust")).await.unwrap();

        let updated = service
            .update(
                &staff,
                created.id,
                UpdateCategoryInput {
                    name: Some("Rust Lang".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "rust-lang");

        service.delete(&staff, created.id).await.unwrap();
        assert!(matches!(
            service.get(created.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(&staff, created.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
