//! Post service
//!
//! Implements the post lifecycle and everything that reads posts:
//! - Create/update/delete with ownership checks and slug/excerpt derivation
//! - `publish` / `unpublish` / `archive`, with subscriber fan-out on publish
//! - Detail views with view counting and per-viewer engagement flags
//! - Paginated listings and leaderboards

use crate::config::MediaConfig;
use crate::db::repositories::{
    CategoryRepository, EngagementRepository, PostRepository, TagRepository, UserRepository,
};
use crate::models::{
    CreatePostInput, LifecycleAction, ListParams, PagedResult, Post, PostDetail, PostFilter,
    PostStatus, PostSummary, UpdatePostInput, User,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::notification::NotificationService;
use crate::services::slug::{slugify, with_suffix};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

const MIN_TITLE_LEN: usize = 5;
const MAX_TITLE_LEN: usize = 200;
const MIN_CONTENT_LEN: usize = 20;
const EXCERPT_LEN: usize = 200;
const LEADERBOARD_SIZE: i64 = 10;
const TRENDING_WINDOW_DAYS: i64 = 7;

/// Optional filters for the public post listing
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PostQuery {
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub tag_id: Option<i64>,
}

/// Post service
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    tags: Arc<dyn TagRepository>,
    categories: Arc<dyn CategoryRepository>,
    users: Arc<dyn UserRepository>,
    engagement: Arc<dyn EngagementRepository>,
    notifications: Arc<NotificationService>,
    media: MediaConfig,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        tags: Arc<dyn TagRepository>,
        categories: Arc<dyn CategoryRepository>,
        users: Arc<dyn UserRepository>,
        engagement: Arc<dyn EngagementRepository>,
        notifications: Arc<NotificationService>,
        media: MediaConfig,
    ) -> Self {
        Self {
            posts,
            tags,
            categories,
            users,
            engagement,
            notifications,
            media,
        }
    }

    /// Create a draft owned by `actor`.
    ///
    /// An empty slug is derived from the title and suffixed on collision;
    /// an explicit slug that collides is rejected. An empty excerpt is
    /// derived from the content.
    pub async fn create(&self, actor: &User, input: CreatePostInput) -> ServiceResult<Post> {
        let title = validate_title(&input.title)?;
        validate_content(&input.content)?;
        if let Some(at) = input.scheduled_at {
            validate_schedule(at, Utc::now())?;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }
        self.ensure_tags(&input.tag_ids).await?;

        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => self.claim_slug(explicit, None).await?,
            None => self.derive_slug(&title, None).await?,
        };

        let mut post = Post::new(title, slug, input.content, actor.id);
        post.excerpt = Some(
            input
                .excerpt
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| derive_excerpt(&post.content)),
        );
        post.category_id = input.category_id;
        post.featured_image = input.featured_image.filter(|f| !f.trim().is_empty());
        post.scheduled_at = input.scheduled_at;

        let created = self
            .posts
            .create(&post)
            .await
            .context("Failed to create post")?;
        if !input.tag_ids.is_empty() {
            self.tags
                .set_post_tags(created.id, &input.tag_ids)
                .await
                .context("Failed to attach tags")?;
        }

        tracing::info!(post_id = created.id, author_id = actor.id, "Created post {}", created.slug);
        Ok(created)
    }

    /// Update a post owned by `actor`. Omitted fields are left alone; the
    /// slug and excerpt are only re-derived when supplied empty.
    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdatePostInput,
    ) -> ServiceResult<Post> {
        let mut post = self.owned_post(actor, id, "edit").await?;

        if let Some(title) = input.title {
            post.title = validate_title(&title)?;
        }
        if let Some(content) = input.content {
            validate_content(&content)?;
            post.content = content;
        }
        if let Some(slug) = input.slug {
            let slug = slug.trim();
            post.slug = if slug.is_empty() {
                self.derive_slug(&post.title, Some(id)).await?
            } else {
                self.claim_slug(slug, Some(id)).await?
            };
        }
        if let Some(excerpt) = input.excerpt {
            post.excerpt = Some(if excerpt.trim().is_empty() {
                derive_excerpt(&post.content)
            } else {
                excerpt
            });
        }
        if let Some(category_id) = input.category_id {
            if let Some(category_id) = category_id {
                self.ensure_category(category_id).await?;
            }
            post.category_id = category_id;
        }
        if let Some(featured_image) = input.featured_image {
            post.featured_image = Some(featured_image).filter(|f| !f.trim().is_empty());
        }
        if let Some(scheduled_at) = input.scheduled_at {
            if let Some(at) = scheduled_at {
                validate_schedule(at, Utc::now())?;
            }
            post.scheduled_at = scheduled_at;
        }
        if let Some(tag_ids) = &input.tag_ids {
            self.ensure_tags(tag_ids).await?;
        }

        let updated = self
            .posts
            .update(&post)
            .await
            .context("Failed to update post")?;
        if let Some(tag_ids) = &input.tag_ids {
            self.tags
                .set_post_tags(id, tag_ids)
                .await
                .context("Failed to replace tags")?;
        }
        Ok(updated)
    }

    /// Delete a post owned by `actor`, with its comments, likes, ratings
    /// and notifications.
    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        self.owned_post(actor, id, "delete").await?;
        self.posts
            .delete(id)
            .await
            .context("Failed to delete post")?;
        tracing::info!(post_id = id, "Deleted post");
        Ok(())
    }

    pub async fn publish(&self, actor: &User, id: i64) -> ServiceResult<Post> {
        self.transition(actor, id, LifecycleAction::Publish).await
    }

    pub async fn unpublish(&self, actor: &User, id: i64) -> ServiceResult<Post> {
        self.transition(actor, id, LifecycleAction::Unpublish).await
    }

    pub async fn archive(&self, actor: &User, id: i64) -> ServiceResult<Post> {
        self.transition(actor, id, LifecycleAction::Archive).await
    }

    /// Post detail by id, counting a view unless the viewer is the author
    pub async fn view(&self, id: i64, viewer: Option<&User>) -> ServiceResult<PostDetail> {
        let post = self.posts.get_by_id(id).await.context("Failed to get post")?;
        self.detail(post, viewer, &id.to_string()).await
    }

    /// Post detail by slug, counting a view unless the viewer is the author
    pub async fn view_by_slug(&self, slug: &str, viewer: Option<&User>) -> ServiceResult<PostDetail> {
        let post = self
            .posts
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?;
        self.detail(post, viewer, slug).await
    }

    /// Published posts, optionally narrowed by category, author or tag
    pub async fn list_published(
        &self,
        query: PostQuery,
        params: ListParams,
    ) -> ServiceResult<PagedResult<PostSummary>> {
        let filter = PostFilter {
            category_id: query.category_id,
            author_id: query.author_id,
            tag_id: query.tag_id,
            ..PostFilter::published()
        };
        self.list(filter, params).await
    }

    /// The actor's own posts in any (or the given) status
    pub async fn list_mine(
        &self,
        actor: &User,
        status: Option<PostStatus>,
        params: ListParams,
    ) -> ServiceResult<PagedResult<PostSummary>> {
        let filter = PostFilter {
            status,
            ..PostFilter::default().by_author(actor.id)
        };
        self.list(filter, params).await
    }

    pub async fn list_drafts(
        &self,
        actor: &User,
        params: ListParams,
    ) -> ServiceResult<PagedResult<PostSummary>> {
        self.list_mine(actor, Some(PostStatus::Draft), params).await
    }

    /// The actor's drafts scheduled for the future, soonest first
    pub async fn list_scheduled(
        &self,
        actor: &User,
        params: ListParams,
    ) -> ServiceResult<PagedResult<PostSummary>> {
        let (items, total) = self
            .posts
            .list_scheduled(actor.id, Utc::now(), &params)
            .await
            .context("Failed to list scheduled posts")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn list_by_category(
        &self,
        category_id: i64,
        params: ListParams,
    ) -> ServiceResult<PagedResult<PostSummary>> {
        self.ensure_category(category_id).await?;
        self.list(PostFilter::published().in_category(category_id), params)
            .await
    }

    pub async fn list_by_author(
        &self,
        author_id: i64,
        params: ListParams,
    ) -> ServiceResult<PagedResult<PostSummary>> {
        self.users
            .get_by_id(author_id)
            .await
            .context("Failed to get author")?
            .ok_or_else(|| ServiceError::not_found("Author", author_id))?;
        self.list(PostFilter::published().by_author(author_id), params)
            .await
    }

    pub async fn list_by_tag(
        &self,
        tag_id: i64,
        params: ListParams,
    ) -> ServiceResult<PagedResult<PostSummary>> {
        self.tags
            .get_by_id(tag_id)
            .await
            .context("Failed to get tag")?
            .ok_or_else(|| ServiceError::not_found("Tag", tag_id))?;
        self.list(PostFilter::published().with_tag(tag_id), params)
            .await
    }

    pub async fn most_liked(&self) -> ServiceResult<Vec<PostSummary>> {
        Ok(self
            .posts
            .most_liked(LEADERBOARD_SIZE)
            .await
            .context("Failed to load most liked posts")?)
    }

    pub async fn top_rated(&self) -> ServiceResult<Vec<PostSummary>> {
        Ok(self
            .posts
            .top_rated(LEADERBOARD_SIZE)
            .await
            .context("Failed to load top rated posts")?)
    }

    /// Posts published within the last week, by views then likes
    pub async fn trending(&self) -> ServiceResult<Vec<PostSummary>> {
        let since = Utc::now() - Duration::days(TRENDING_WINDOW_DAYS);
        Ok(self
            .posts
            .trending(since, LEADERBOARD_SIZE)
            .await
            .context("Failed to load trending posts")?)
    }

    pub async fn count_published_by_author(&self, author_id: i64) -> ServiceResult<i64> {
        Ok(self
            .posts
            .count_published_by_author(author_id)
            .await
            .context("Failed to count author posts")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn transition(
        &self,
        actor: &User,
        id: i64,
        action: LifecycleAction,
    ) -> ServiceResult<Post> {
        let post = self.owned_post(actor, id, &action.to_string()).await?;

        let next = post.status.apply(action).ok_or_else(|| {
            ServiceError::InvalidTransition(format!("Cannot {} a {} post", action, post.status))
        })?;
        let published_at = (action == LifecycleAction::Publish).then(Utc::now);

        let notify = if action == LifecycleAction::Publish {
            let category = match post.category_id {
                Some(category_id) => self
                    .categories
                    .get_by_id(category_id)
                    .await
                    .context("Failed to get post category")?,
                None => None,
            };
            self.notifications
                .new_post_batch(&post, actor, category.as_ref())
                .await?
        } else {
            Vec::new()
        };

        let updated = self
            .posts
            .update_status(id, next, published_at, &notify)
            .await
            .context("Failed to update post status")?;
        tracing::info!(
            post_id = id,
            from = %post.status,
            to = %next,
            notified = notify.len(),
            "Post transitioned"
        );
        Ok(updated)
    }

    async fn detail(
        &self,
        post: Option<Post>,
        viewer: Option<&User>,
        key: &str,
    ) -> ServiceResult<PostDetail> {
        let post = post
            .filter(|p| p.is_visible_to(viewer))
            .ok_or_else(|| ServiceError::not_found("Post", key))?;

        if viewer.map(|v| v.id) != Some(post.author_id) {
            if let Err(e) = self.posts.increment_views(post.id).await {
                tracing::warn!(post_id = post.id, "Failed to count view: {:#}", e);
            }
        }

        let summary = self
            .posts
            .get_summary(post.id)
            .await
            .context("Failed to load post summary")?
            .ok_or_else(|| ServiceError::not_found("Post", key))?;
        let tags = self
            .tags
            .get_by_post(post.id)
            .await
            .context("Failed to load post tags")?;

        let (user_has_liked, user_rating) = match viewer {
            Some(viewer) => (
                self.engagement
                    .has_liked(post.id, viewer.id)
                    .await
                    .context("Failed to check like")?,
                self.engagement
                    .get_rating(post.id, viewer.id)
                    .await
                    .context("Failed to get rating")?
                    .map(|r| r.rating),
            ),
            None => (false, None),
        };

        let featured_image_url = summary
            .post
            .featured_image
            .as_deref()
            .map(|reference| self.media.resolve(reference));

        Ok(PostDetail {
            summary,
            tags,
            featured_image_url,
            user_has_liked,
            user_rating,
        })
    }

    async fn list(
        &self,
        filter: PostFilter,
        params: ListParams,
    ) -> ServiceResult<PagedResult<PostSummary>> {
        let (items, total) = self
            .posts
            .list(&filter, &params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Load a post and check that `actor` wrote it
    async fn owned_post(&self, actor: &User, id: i64, verb: &str) -> ServiceResult<Post> {
        let post = self
            .posts
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| ServiceError::not_found("Post", id))?;
        if post.author_id != actor.id {
            return Err(ServiceError::Forbidden(format!(
                "Only the author may {} this post",
                verb
            )));
        }
        Ok(post)
    }

    async fn ensure_category(&self, category_id: i64) -> ServiceResult<()> {
        self.categories
            .get_by_id(category_id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| ServiceError::not_found("Category", category_id))?;
        Ok(())
    }

    async fn ensure_tags(&self, tag_ids: &[i64]) -> ServiceResult<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        let mut unique = tag_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let found = self
            .tags
            .count_existing(&unique)
            .await
            .context("Failed to check tags")?;
        if found != unique.len() {
            return Err(ServiceError::NotFound(
                "One or more tags do not exist".to_string(),
            ));
        }
        Ok(())
    }

    /// Slug derived from the title, suffixed until unused
    async fn derive_slug(&self, title: &str, exclude_id: Option<i64>) -> ServiceResult<String> {
        let base = slugify(title, "post");
        let mut candidate = base.clone();
        let mut n = 2;
        while self.slug_taken(&candidate, exclude_id).await? {
            candidate = with_suffix(&base, n);
            n += 1;
        }
        Ok(candidate)
    }

    /// Caller-chosen slug, normalized; must not be in use
    async fn claim_slug(&self, requested: &str, exclude_id: Option<i64>) -> ServiceResult<String> {
        let slug = slugify(requested, "post");
        if self.slug_taken(&slug, exclude_id).await? {
            return Err(ServiceError::AlreadyExists(format!(
                "Slug '{}' is already in use",
                slug
            )));
        }
        Ok(slug)
    }

    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> ServiceResult<bool> {
        Ok(self
            .posts
            .slug_exists(slug, exclude_id)
            .await
            .context("Failed to check slug")?)
    }
}

/// Load a post that `viewer` is allowed to see. Drafts and archived posts
/// of other users are reported as missing.
pub(crate) async fn load_visible_post(
    posts: &dyn PostRepository,
    id: i64,
    viewer: Option<&User>,
) -> ServiceResult<Post> {
    posts
        .get_by_id(id)
        .await
        .context("Failed to get post")?
        .filter(|post| post.is_visible_to(viewer))
        .ok_or_else(|| ServiceError::not_found("Post", id))
}

/// First 200 characters of the content followed by `...`
pub fn derive_excerpt(content: &str) -> String {
    let head: String = content.chars().take(EXCERPT_LEN).collect();
    format!("{}...", head)
}

fn validate_title(title: &str) -> ServiceResult<String> {
    let title = title.trim();
    let len = title.chars().count();
    if len < MIN_TITLE_LEN {
        return Err(ServiceError::ValidationError(format!(
            "Title must be at least {} characters",
            MIN_TITLE_LEN
        )));
    }
    if len > MAX_TITLE_LEN {
        return Err(ServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> ServiceResult<()> {
    if content.trim().chars().count() < MIN_CONTENT_LEN {
        return Err(ServiceError::ValidationError(format!(
            "Content must be at least {} characters",
            MIN_CONTENT_LEN
        )));
    }
    Ok(())
}

fn validate_schedule(at: DateTime<Utc>, now: DateTime<Utc>) -> ServiceResult<()> {
    if at <= now {
        return Err(ServiceError::ValidationError(
            "Scheduled time must be in the future".to_string(),
        ));
    }
    Ok(())
}
