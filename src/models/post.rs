//! Post model
//!
//! This module provides:
//! - `Post` entity and its `PostStatus` lifecycle
//! - Read-side projections carrying derived engagement figures
//! - Input types for creating and updating posts
//! - Pagination types for list queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{Tag, User};

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    pub title: String,
    /// URL-friendly slug (unique across all posts)
    pub slug: String,
    pub content: String,
    /// Short summary; derived from content when not supplied
    pub excerpt: Option<String>,
    /// Owner of the post
    pub author_id: i64,
    /// Weak reference, cleared when the category is deleted
    pub category_id: Option<i64>,
    pub status: PostStatus,
    /// Media reference for the cover image
    pub featured_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new draft post; the ID is assigned by the database.
    pub fn new(title: String, slug: String, content: String, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            slug,
            content,
            excerpt: None,
            author_id,
            category_id: None,
            status: PostStatus::Draft,
            featured_image: None,
            published_at: None,
            scheduled_at: None,
            views_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Published posts are public; drafts and archived posts are visible
    /// to their author and to staff only.
    pub fn is_visible_to(&self, viewer: Option<&User>) -> bool {
        self.is_published() || viewer.is_some_and(|u| u.id == self.author_id || u.is_staff)
    }
}

/// Post publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Not visible to the public
    #[default]
    Draft,
    /// Visible to everyone
    Published,
    /// Hidden but retained
    Archived,
}

impl PostStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }

    /// Parse status from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            "archived" => Some(PostStatus::Archived),
            _ => None,
        }
    }

    /// Status reached by applying `action`, or `None` when the transition
    /// is not allowed from this status.
    ///
    /// | from \ action | publish   | unpublish | archive  |
    /// |---------------|-----------|-----------|----------|
    /// | draft         | published | -         | archived |
    /// | published     | -         | draft     | archived |
    /// | archived      | -         | -         | archived |
    pub fn apply(self, action: LifecycleAction) -> Option<PostStatus> {
        match (self, action) {
            (PostStatus::Draft, LifecycleAction::Publish) => Some(PostStatus::Published),
            (PostStatus::Published, LifecycleAction::Unpublish) => Some(PostStatus::Draft),
            (_, LifecycleAction::Archive) => Some(PostStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Author-initiated lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Publish,
    Unpublish,
    Archive,
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleAction::Publish => "publish",
            LifecycleAction::Unpublish => "unpublish",
            LifecycleAction::Archive => "archive",
        };
        f.write_str(name)
    }
}

/// Engagement figures derived from the ledger at read time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PostStats {
    pub likes_count: i64,
    /// Mean rating rounded to two decimals, 0 when unrated
    pub average_rating: f64,
    pub ratings_count: i64,
    /// Approved comments only
    pub comments_count: i64,
}

impl PostStats {
    /// Mean of `count` ratings summing to `sum`, rounded to two decimals.
    pub fn average(sum: i64, count: i64) -> f64 {
        if count <= 0 {
            return 0.0;
        }
        let mean = sum as f64 / count as f64;
        (mean * 100.0).round() / 100.0
    }
}

/// Post with author/category names and engagement figures, for listings
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub category_name: Option<String>,
    #[serde(flatten)]
    pub stats: PostStats,
}

/// Full post view, including what the current viewer has done with it
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub summary: PostSummary,
    pub tags: Vec<Tag>,
    /// Cover image resolved to a retrievable URL
    pub featured_image_url: Option<String>,
    pub user_has_liked: bool,
    pub user_rating: Option<i32>,
}

/// Input for creating a new post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    /// Explicit slug; derived from the title when absent or blank
    #[serde(default)]
    pub slug: Option<String>,
    /// Explicit excerpt; derived from the content when absent or blank
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_tags(mut self, tag_ids: Vec<i64>) -> Self {
        self.tag_ids = tag_ids;
        self
    }

    pub fn with_scheduled_at(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }
}

/// Input for updating an existing post. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    /// `Some(None)` clears the category
    #[serde(default, deserialize_with = "deserialize_some")]
    pub category_id: Option<Option<i64>>,
    /// Replaces the whole tag set when present
    pub tag_ids: Option<Vec<i64>>,
    pub featured_image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

impl UpdatePostInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Distinguishes an explicit `null` from a missing field.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Filters for post listings; every field is optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
}

impl PostFilter {
    /// Published posts only
    pub fn published() -> Self {
        Self {
            status: Some(PostStatus::Published),
            ..Default::default()
        }
    }

    pub fn by_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_tag(mut self, tag_id: i64) -> Self {
        self.tag_id = Some(tag_id);
        self
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters, clamping out-of-range values
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        (self.total.max(0) as u32).div_ceil(self.per_page)
    }

    /// Transform the items while keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_publish_only_from_draft() {
        assert_eq!(
            PostStatus::Draft.apply(LifecycleAction::Publish),
            Some(PostStatus::Published)
        );
        assert_eq!(PostStatus::Published.apply(LifecycleAction::Publish), None);
        assert_eq!(PostStatus::Archived.apply(LifecycleAction::Publish), None);
    }

    #[test]
    fn test_drafts_visible_to_author_and_staff_only() {
        let mut author = User::new("ada".into(), "ada@example.com".into(), "h".into(), false);
        author.id = 1;
        let mut reader = User::new("bob".into(), "bob@example.com".into(), "h".into(), false);
        reader.id = 2;
        let mut staff = User::new("root".into(), "root@example.com".into(), "h".into(), true);
        staff.id = 3;

        let mut post = Post::new("Title".into(), "title".into(), "body".into(), 1);
        assert!(post.is_visible_to(Some(&author)));
        assert!(post.is_visible_to(Some(&staff)));
        assert!(!post.is_visible_to(Some(&reader)));
        assert!(!post.is_visible_to(None));

        post.status = PostStatus::Published;
        assert!(post.is_visible_to(None));
    }

    #[test]
    fn test_unpublish_only_from_published() {
        assert_eq!(
            PostStatus::Published.apply(LifecycleAction::Unpublish),
            Some(PostStatus::Draft)
        );
        assert_eq!(PostStatus::Draft.apply(LifecycleAction::Unpublish), None);
        assert_eq!(PostStatus::Archived.apply(LifecycleAction::Unpublish), None);
    }

    #[test]
    fn test_average_rounding() {
        assert_eq!(PostStats::average(9, 2), 4.5);
        assert_eq!(PostStats::average(0, 0), 0.0);
        assert_eq!(PostStats::average(10, 3), 3.33);
        assert_eq!(PostStats::average(14, 3), 4.67);
    }

    #[test]
    fn test_update_input_distinguishes_null_category() {
        let cleared: UpdatePostInput = serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));

        let untouched: UpdatePostInput = serde_json::from_str(r#"{"title": "New title"}"#).unwrap();
        assert_eq!(untouched.category_id, None);

        let set: UpdatePostInput = serde_json::from_str(r#"{"category_id": 4}"#).unwrap();
        assert_eq!(set.category_id, Some(Some(4)));
    }

    #[test]
    fn test_list_params_clamp() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(params.offset(), 0);

        let params = ListParams::new(3, 20);
        assert_eq!(params.offset(), 40);
    }

    fn status_strategy() -> impl Strategy<Value = PostStatus> {
        prop_oneof![
            Just(PostStatus::Draft),
            Just(PostStatus::Published),
            Just(PostStatus::Archived),
        ]
    }

    fn action_strategy() -> impl Strategy<Value = LifecycleAction> {
        prop_oneof![
            Just(LifecycleAction::Publish),
            Just(LifecycleAction::Unpublish),
            Just(LifecycleAction::Archive),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Archive always succeeds and is absorbing for publish/unpublish.
        #[test]
        fn archive_always_allowed(from in status_strategy(), later in action_strategy()) {
            let archived = from.apply(LifecycleAction::Archive);
            prop_assert_eq!(archived, Some(PostStatus::Archived));

            let next = PostStatus::Archived.apply(later);
            if later == LifecycleAction::Archive {
                prop_assert_eq!(next, Some(PostStatus::Archived));
            } else {
                prop_assert_eq!(next, None);
            }
        }

        /// Repeating a publish never succeeds twice in a row.
        #[test]
        fn publish_is_not_repeatable(from in status_strategy()) {
            if let Some(next) = from.apply(LifecycleAction::Publish) {
                prop_assert_eq!(next.apply(LifecycleAction::Publish), None);
            }
        }

        /// The average always lies within the rating scale.
        #[test]
        fn average_within_scale(ratings in proptest::collection::vec(1i64..=5, 1..50)) {
            let sum: i64 = ratings.iter().sum();
            let avg = PostStats::average(sum, ratings.len() as i64);
            prop_assert!((1.0..=5.0).contains(&avg));
        }
    }
}
