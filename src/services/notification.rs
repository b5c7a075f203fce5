//! Notification fan-out and inbox operations
//!
//! Fan-out runs inside the triggering request. The notifications are built
//! here and handed to the repository call that records the triggering
//! change, which stores both in one transaction: a publish, like, rating or
//! comment that fails to notify is not recorded either.
//!
//! A publish notifies every active author subscriber and every active
//! subscriber of the post's category; a user subscribed both ways receives
//! two notifications. Comments, likes and ratings notify the post author
//! unless the author is the actor.

use crate::db::repositories::{NotificationRepository, SubscriptionRepository};
use crate::models::{
    Category, ListParams, NewNotification, Notification, NotificationFilter, NotificationKind,
    PagedResult, Post, SubscriptionTarget, User,
};
use crate::services::error::{ServiceError, ServiceResult};
use anyhow::Context;
use std::sync::Arc;

/// Notification service
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            repo,
            subscriptions,
        }
    }

    /// Notifications for the current subscribers of a post being published
    pub async fn new_post_batch(
        &self,
        post: &Post,
        author: &User,
        category: Option<&Category>,
    ) -> ServiceResult<Vec<NewNotification>> {
        let mut batch = Vec::new();

        let message = format!("{} published a new post: '{}'", author.username, post.title);
        let author_target = SubscriptionTarget::Author {
            author_id: post.author_id,
        };
        for recipient in self.subscribers(&author_target).await? {
            batch.push(NewNotification::new(
                recipient,
                NotificationKind::NewPost,
                Some(post.id),
                Some(author.id),
                message.clone(),
            ));
        }

        if let Some(category) = category {
            let message = format!("New post in {}: '{}'", category.name, post.title);
            let category_target = SubscriptionTarget::Category {
                category_id: category.id,
            };
            for recipient in self.subscribers(&category_target).await? {
                batch.push(NewNotification::new(
                    recipient,
                    NotificationKind::NewPost,
                    Some(post.id),
                    Some(author.id),
                    message.clone(),
                ));
            }
        }

        Ok(batch)
    }

    /// The recipient's notifications, newest first
    pub async fn list(
        &self,
        recipient: &User,
        filter: NotificationFilter,
        params: ListParams,
    ) -> ServiceResult<PagedResult<Notification>> {
        let (items, total) = self
            .repo
            .list(recipient.id, &filter, &params)
            .await
            .context("Failed to list notifications")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Mark one of the recipient's notifications read. Marking an already
    /// read notification is a no-op.
    pub async fn mark_read(&self, recipient: &User, id: i64) -> ServiceResult<Notification> {
        let mut notification = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get notification")?
            .filter(|n| n.recipient_id == recipient.id)
            .ok_or_else(|| ServiceError::not_found("Notification", id))?;

        if !notification.is_read {
            self.repo
                .mark_read(id)
                .await
                .context("Failed to mark notification read")?;
            notification.is_read = true;
        }
        Ok(notification)
    }

    /// Mark all of the recipient's notifications read; returns how many changed
    pub async fn mark_all_read(&self, recipient: &User) -> ServiceResult<u64> {
        Ok(self
            .repo
            .mark_all_read(recipient.id)
            .await
            .context("Failed to mark notifications read")?)
    }

    pub async fn unread_count(&self, recipient: &User) -> ServiceResult<i64> {
        Ok(self
            .repo
            .unread_count(recipient.id)
            .await
            .context("Failed to count unread notifications")?)
    }

    async fn subscribers(&self, target: &SubscriptionTarget) -> ServiceResult<Vec<i64>> {
        Ok(self
            .subscriptions
            .active_subscribers(target)
            .await
            .context("Failed to load subscribers")?)
    }
}

/// Notice to the post author about a new comment; `None` for their own
pub fn comment_notification(post: &Post, commenter: &User) -> Option<NewNotification> {
    let message = format!(
        "{} commented on your post '{}'",
        commenter.username, post.title
    );
    author_notification(post, commenter, NotificationKind::NewComment, message)
}

/// Notice to the post author about a new like; `None` for their own
pub fn like_notification(post: &Post, liker: &User) -> Option<NewNotification> {
    let message = format!("{} liked your post '{}'", liker.username, post.title);
    author_notification(post, liker, NotificationKind::NewLike, message)
}

/// Notice to the post author about a new rating; `None` for their own
pub fn rating_notification(post: &Post, rater: &User, rating: i32) -> Option<NewNotification> {
    let message = format!(
        "{} rated your post '{}' - {} stars",
        rater.username, post.title, rating
    );
    author_notification(post, rater, NotificationKind::NewRating, message)
}

fn author_notification(
    post: &Post,
    actor: &User,
    kind: NotificationKind,
    message: String,
) -> Option<NewNotification> {
    (actor.id != post.author_id).then(|| {
        NewNotification::new(post.author_id, kind, Some(post.id), Some(actor.id), message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        test_support::{insert_category, insert_post, setup_pool},
        CategoryRepository, PostRepository, SqlxCategoryRepository, SqlxNotificationRepository,
        SqlxPostRepository, SqlxSubscriptionRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::PostStatus;
    use crate::services::test_support::regular_user;

    struct Fixture {
        pool: DynDatabasePool,
        service: NotificationService,
        repo: Arc<dyn NotificationRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        author: User,
        reader: User,
    }

    async fn fixture() -> Fixture {
        let pool = setup_pool().await;
        let author = regular_user(&pool, "alice").await;
        let reader = regular_user(&pool, "bob").await;
        let repo = SqlxNotificationRepository::boxed(pool.clone());
        let subscriptions = SqlxSubscriptionRepository::boxed(pool.clone());
        let service = NotificationService::new(repo.clone(), subscriptions.clone());
        Fixture {
            pool,
            service,
            repo,
            subscriptions,
            author,
            reader,
        }
    }

    async fn load_post(pool: &DynDatabasePool, id: i64) -> Post {
        SqlxPostRepository::new(pool.clone())
            .get_by_id(id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_post_batch_covers_both_subscription_kinds_without_dedup() {
        let f = fixture().await;
        let category_id = insert_category(&f.pool, "Rust").await;
        let category = SqlxCategoryRepository::new(f.pool.clone())
            .get_by_id(category_id)
            .await
            .unwrap()
            .unwrap();
        let post_id =
            insert_post(&f.pool, f.author.id, "hello", PostStatus::Published, Some(category_id))
                .await;
        let post = load_post(&f.pool, post_id).await;

        f.subscriptions
            .create(f.reader.id, &SubscriptionTarget::Author { author_id: f.author.id })
            .await
            .unwrap();
        f.subscriptions
            .create(f.reader.id, &SubscriptionTarget::Category { category_id })
            .await
            .unwrap();

        let batch = f
            .service
            .new_post_batch(&post, &f.author, Some(&category))
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|n| n.recipient_id == f.reader.id));
        assert!(batch.iter().all(|n| n.kind == NotificationKind::NewPost));
        assert!(batch.iter().all(|n| n.sender_id == Some(f.author.id)));

        let mut messages: Vec<_> = batch.iter().map(|n| n.message.clone()).collect();
        messages.sort();
        assert_eq!(
            messages,
            vec![
                "New post in Rust: 'Title of hello'".to_string(),
                "alice published a new post: 'Title of hello'".to_string(),
            ]
        );

        let without_category = f.service.new_post_batch(&post, &f.author, None).await.unwrap();
        assert_eq!(without_category.len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_subscribers_not_notified() {
        let f = fixture().await;
        let post_id = insert_post(&f.pool, f.author.id, "hello", PostStatus::Published, None).await;
        let post = load_post(&f.pool, post_id).await;

        let sub = f
            .subscriptions
            .create(f.reader.id, &SubscriptionTarget::Author { author_id: f.author.id })
            .await
            .unwrap()
            .unwrap();
        f.subscriptions.set_active(sub.id, false).await.unwrap();

        let batch = f.service.new_post_batch(&post, &f.author, None).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_engagement_notifications_skip_self() {
        let f = fixture().await;
        let post_id = insert_post(&f.pool, f.author.id, "hello", PostStatus::Published, None).await;
        let post = load_post(&f.pool, post_id).await;

        assert!(like_notification(&post, &f.author).is_none());
        assert!(rating_notification(&post, &f.author, 5).is_none());
        assert!(comment_notification(&post, &f.author).is_none());

        let notices = [
            comment_notification(&post, &f.reader).unwrap(),
            rating_notification(&post, &f.reader, 4).unwrap(),
            like_notification(&post, &f.reader).unwrap(),
        ];
        let messages: Vec<_> = notices.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "bob commented on your post 'Title of hello'",
                "bob rated your post 'Title of hello' - 4 stars",
                "bob liked your post 'Title of hello'",
            ]
        );
        assert!(notices.iter().all(|n| n.recipient_id == f.author.id));
        assert!(notices.iter().all(|n| n.sender_id == Some(f.reader.id)));
        assert!(notices.iter().all(|n| n.post_id == Some(post.id)));
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_owner_only() {
        let f = fixture().await;
        let post_id = insert_post(&f.pool, f.author.id, "hello", PostStatus::Published, None).await;
        let post = load_post(&f.pool, post_id).await;
        let batch: Vec<_> = [
            like_notification(&post, &f.reader),
            comment_notification(&post, &f.reader),
        ]
        .into_iter()
        .flatten()
        .collect();
        f.repo.insert_many(&batch).await.unwrap();

        let page = f
            .service
            .list(&f.author, NotificationFilter::default(), ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        let id = page.items[0].id;

        let stranger = f.service.mark_read(&f.reader, id).await;
        assert!(matches!(stranger, Err(ServiceError::NotFound(_))));

        assert!(f.service.mark_read(&f.author, id).await.unwrap().is_read);
        assert!(f.service.mark_read(&f.author, id).await.unwrap().is_read);
        assert_eq!(f.service.unread_count(&f.author).await.unwrap(), 1);

        assert_eq!(f.service.mark_all_read(&f.author).await.unwrap(), 1);
        assert_eq!(f.service.unread_count(&f.author).await.unwrap(), 0);
    }
}
