//! Engagement ledger: likes and ratings
//!
//! Each (post, user) pair holds at most one like and one rating. The check
//! before inserting gives a clear error; the unique constraint catches the
//! race between two concurrent requests, which is reported the same way.

use crate::db::repositories::{EngagementRepository, PostRepository};
use crate::models::{Like, PostStats, Rating, RatingInput, RatingView, User, MAX_RATING, MIN_RATING};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::notification::{like_notification, rating_notification};
use crate::services::post::load_visible_post;
use anyhow::Context;
use std::sync::Arc;

/// Engagement service
pub struct EngagementService {
    engagement: Arc<dyn EngagementRepository>,
    posts: Arc<dyn PostRepository>,
}

impl EngagementService {
    pub fn new(engagement: Arc<dyn EngagementRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { engagement, posts }
    }

    /// Like a post. The author is notified unless they liked their own post.
    pub async fn like(&self, actor: &User, post_id: i64) -> ServiceResult<Like> {
        let post = load_visible_post(self.posts.as_ref(), post_id, Some(actor)).await?;
        let already = || ServiceError::AlreadyExists("You have already liked this post".to_string());

        if self
            .engagement
            .has_liked(post_id, actor.id)
            .await
            .context("Failed to check like")?
        {
            return Err(already());
        }

        let notify = like_notification(&post, actor);
        self.engagement
            .insert_like(post_id, actor.id, notify.as_slice())
            .await
            .context("Failed to insert like")?
            .ok_or_else(already)
    }

    pub async fn unlike(&self, actor: &User, post_id: i64) -> ServiceResult<()> {
        load_visible_post(self.posts.as_ref(), post_id, Some(actor)).await?;
        if !self
            .engagement
            .delete_like(post_id, actor.id)
            .await
            .context("Failed to delete like")?
        {
            return Err(ServiceError::NotFound(
                "You have not liked this post".to_string(),
            ));
        }
        Ok(())
    }

    /// Rate a post for the first time. Use `update_rating` to change it.
    pub async fn rate(
        &self,
        actor: &User,
        post_id: i64,
        input: RatingInput,
    ) -> ServiceResult<Rating> {
        validate_rating(&input)?;
        let post = load_visible_post(self.posts.as_ref(), post_id, Some(actor)).await?;
        let already =
            || ServiceError::AlreadyExists("You have already rated this post".to_string());

        if self
            .engagement
            .get_rating(post_id, actor.id)
            .await
            .context("Failed to check rating")?
            .is_some()
        {
            return Err(already());
        }

        let review = normalize_review(input.review.as_deref());
        let notify = rating_notification(&post, actor, input.rating);
        self.engagement
            .insert_rating(post_id, actor.id, input.rating, review, notify.as_slice())
            .await
            .context("Failed to insert rating")?
            .ok_or_else(already)
    }

    /// Change the actor's existing rating in place
    pub async fn update_rating(
        &self,
        actor: &User,
        post_id: i64,
        input: RatingInput,
    ) -> ServiceResult<Rating> {
        validate_rating(&input)?;
        load_visible_post(self.posts.as_ref(), post_id, Some(actor)).await?;

        let review = normalize_review(input.review.as_deref());
        self.engagement
            .update_rating(post_id, actor.id, input.rating, review)
            .await
            .context("Failed to update rating")?
            .ok_or_else(|| ServiceError::NotFound("You have not rated this post".to_string()))
    }

    pub async fn delete_rating(&self, actor: &User, post_id: i64) -> ServiceResult<()> {
        load_visible_post(self.posts.as_ref(), post_id, Some(actor)).await?;
        if !self
            .engagement
            .delete_rating(post_id, actor.id)
            .await
            .context("Failed to delete rating")?
        {
            return Err(ServiceError::NotFound(
                "You have not rated this post".to_string(),
            ));
        }
        Ok(())
    }

    /// Ratings of a post, newest first, with rater usernames
    pub async fn list_ratings(
        &self,
        post_id: i64,
        viewer: Option<&User>,
    ) -> ServiceResult<Vec<RatingView>> {
        load_visible_post(self.posts.as_ref(), post_id, viewer).await?;
        Ok(self
            .engagement
            .list_ratings(post_id)
            .await
            .context("Failed to list ratings")?)
    }

    /// Likes given by the actor, newest first
    pub async fn likes_by_user(&self, actor: &User) -> ServiceResult<Vec<Like>> {
        Ok(self
            .engagement
            .likes_by_user(actor.id)
            .await
            .context("Failed to list likes")?)
    }

    pub async fn has_liked(&self, post_id: i64, user: &User) -> ServiceResult<bool> {
        Ok(self
            .engagement
            .has_liked(post_id, user.id)
            .await
            .context("Failed to check like")?)
    }

    pub async fn user_rating(&self, post_id: i64, user: &User) -> ServiceResult<Option<Rating>> {
        Ok(self
            .engagement
            .get_rating(post_id, user.id)
            .await
            .context("Failed to get rating")?)
    }

    /// Likes, ratings and approved comments of a post, derived on each call
    pub async fn stats(&self, post_id: i64) -> ServiceResult<PostStats> {
        Ok(self
            .engagement
            .stats(post_id)
            .await
            .context("Failed to compute post stats")?)
    }
}

fn validate_rating(input: &RatingInput) -> ServiceResult<()> {
    if input.in_range() {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )))
    }
}

fn normalize_review(review: Option<&str>) -> Option<&str> {
    review.map(str::trim).filter(|r| !r.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        test_support::{insert_post, setup_pool},
        SqlxEngagementRepository, SqlxNotificationRepository, SqlxPostRepository,
        SqlxSubscriptionRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{ListParams, NotificationFilter, NotificationKind, PostStatus};
    use crate::services::notification::NotificationService;
    use crate::services::test_support::regular_user;
    use proptest::prelude::*;

    struct Fixture {
        pool: DynDatabasePool,
        service: EngagementService,
        notifications: Arc<NotificationService>,
        author: User,
        reader: User,
        other: User,
        post_id: i64,
        draft_id: i64,
    }

    async fn fixture() -> Fixture {
        let pool = setup_pool().await;
        let author = regular_user(&pool, "alice").await;
        let reader = regular_user(&pool, "bob").await;
        let other = regular_user(&pool, "carol").await;
        let post_id = insert_post(&pool, author.id, "hello", PostStatus::Published, None).await;
        let draft_id = insert_post(&pool, author.id, "draft", PostStatus::Draft, None).await;

        let notifications = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool.clone()),
        ));
        let service = EngagementService::new(
            SqlxEngagementRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
        );
        Fixture {
            pool,
            service,
            notifications,
            author,
            reader,
            other,
            post_id,
            draft_id,
        }
    }

    async fn inbox(f: &Fixture, user: &User) -> Vec<NotificationKind> {
        f.notifications
            .list(user, NotificationFilter::default(), ListParams::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|n| n.kind)
            .collect()
    }

    #[tokio::test]
    async fn test_like_twice_stores_one() {
        let f = fixture().await;
        f.service.like(&f.reader, f.post_id).await.unwrap();

        let again = f.service.like(&f.reader, f.post_id).await;
        assert!(matches!(again, Err(ServiceError::AlreadyExists(_))));

        f.service.like(&f.other, f.post_id).await.unwrap();
        let stats = f.service.stats(f.post_id).await.unwrap();
        assert_eq!(stats.likes_count, 2);
        assert_eq!(inbox(&f, &f.author).await.len(), 2);
    }

    #[tokio::test]
    async fn test_self_like_recorded_without_notification() {
        let f = fixture().await;
        f.service.like(&f.author, f.post_id).await.unwrap();

        assert!(f.service.has_liked(f.post_id, &f.author).await.unwrap());
        assert!(inbox(&f, &f.author).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_notification_keeps_like_and_rating_retryable() {
        let f = fixture().await;
        f.pool.execute("DROP TABLE notifications").await.unwrap();

        let like = f.service.like(&f.reader, f.post_id).await;
        assert!(matches!(like, Err(ServiceError::InternalError(_))));
        assert!(!f.service.has_liked(f.post_id, &f.reader).await.unwrap());

        let rating = f.service.rate(&f.reader, f.post_id, RatingInput::new(4)).await;
        assert!(matches!(rating, Err(ServiceError::InternalError(_))));
        assert!(f.service.user_rating(f.post_id, &f.reader).await.unwrap().is_none());

        // A retry is not mistaken for a duplicate
        let retry = f.service.like(&f.reader, f.post_id).await;
        assert!(matches!(retry, Err(ServiceError::InternalError(_))));
        assert_eq!(f.service.stats(f.post_id).await.unwrap().likes_count, 0);
    }

    #[tokio::test]
    async fn test_unlike() {
        let f = fixture().await;
        let missing = f.service.unlike(&f.reader, f.post_id).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        f.service.like(&f.reader, f.post_id).await.unwrap();
        f.service.unlike(&f.reader, f.post_id).await.unwrap();
        assert!(!f.service.has_liked(f.post_id, &f.reader).await.unwrap());
        assert!(f.service.likes_by_user(&f.reader).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_or_hidden_posts() {
        let f = fixture().await;
        assert!(matches!(
            f.service.like(&f.reader, 9999).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.like(&f.reader, f.draft_id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.rate(&f.reader, 9999, RatingInput::new(3)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_and_average() {
        let f = fixture().await;
        let stats = f.service.stats(f.post_id).await.unwrap();
        assert_eq!(stats.average_rating, 0.0);

        f.service
            .rate(&f.reader, f.post_id, RatingInput::new(4).with_review("Solid"))
            .await
            .unwrap();
        f.service
            .rate(&f.other, f.post_id, RatingInput::new(5))
            .await
            .unwrap();

        let stats = f.service.stats(f.post_id).await.unwrap();
        assert_eq!(stats.ratings_count, 2);
        assert_eq!(stats.average_rating, 4.5);

        let again = f.service.rate(&f.reader, f.post_id, RatingInput::new(1)).await;
        assert!(matches!(again, Err(ServiceError::AlreadyExists(_))));

        let ratings = f.service.list_ratings(f.post_id, None).await.unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(
            inbox(&f, &f.author).await,
            vec![NotificationKind::NewRating, NotificationKind::NewRating]
        );
    }

    #[tokio::test]
    async fn test_rating_out_of_range() {
        let f = fixture().await;
        for value in [0, 6, -1] {
            let result = f.service.rate(&f.reader, f.post_id, RatingInput::new(value)).await;
            assert!(matches!(result, Err(ServiceError::ValidationError(_))));
        }
        assert!(f.service.user_rating(f.post_id, &f.reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete_rating() {
        let f = fixture().await;
        let missing = f
            .service
            .update_rating(&f.reader, f.post_id, RatingInput::new(2))
            .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        f.service
            .rate(&f.reader, f.post_id, RatingInput::new(2))
            .await
            .unwrap();
        let updated = f
            .service
            .update_rating(&f.reader, f.post_id, RatingInput::new(5).with_review("  Better  "))
            .await
            .unwrap();
        assert_eq!(updated.rating, 5);
        assert_eq!(updated.review.as_deref(), Some("Better"));

        f.service.delete_rating(&f.reader, f.post_id).await.unwrap();
        assert!(matches!(
            f.service.delete_rating(&f.reader, f.post_id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    proptest! {
        #[test]
        fn rating_accepted_iff_in_range(value in -10i32..20) {
            let accepted = validate_rating(&RatingInput::new(value)).is_ok();
            prop_assert_eq!(accepted, (1..=5).contains(&value));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn likes_count_matches_distinct_likers(likers in proptest::collection::vec(0usize..3, 0..10)) {
            tokio_test::block_on(async {
                let f = fixture().await;
                let users = [&f.author, &f.reader, &f.other];
                let mut distinct = std::collections::HashSet::new();

                for &i in &likers {
                    let result = f.service.like(users[i], f.post_id).await;
                    if distinct.insert(i) {
                        prop_assert!(result.is_ok());
                    } else {
                        prop_assert!(matches!(result, Err(ServiceError::AlreadyExists(_))));
                    }
                }

                let stats = f.service.stats(f.post_id).await.unwrap();
                prop_assert_eq!(stats.likes_count, distinct.len() as i64);
                Ok(())
            })?;
        }
    }
}
