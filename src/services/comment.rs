//! Comment service
//!
//! Comments form two-level threads: top-level comments and direct replies.
//! Editing is reserved to the author; deletion to the author or staff;
//! approval toggling to staff.

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CommentPlacement, CommentThread, CommentView, CreateCommentInput, User};
use crate::services::error::{ensure_staff, ServiceError, ServiceResult};
use crate::services::notification::comment_notification;
use crate::services::post::load_visible_post;
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;

const MIN_CONTENT_LEN: usize = 3;

/// Comment service
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { comments, posts }
    }

    /// Comment on a post, optionally replying to one of its top-level
    /// comments. The post author is notified unless they wrote it.
    pub async fn create(
        &self,
        actor: &User,
        post_id: i64,
        input: CreateCommentInput,
    ) -> ServiceResult<Comment> {
        let content = validate_content(&input.content)?;
        let post = load_visible_post(self.posts.as_ref(), post_id, Some(actor)).await?;

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .comments
                .get_by_id(parent_id)
                .await
                .context("Failed to get parent comment")?
                .filter(|parent| parent.post_id == post_id)
                .ok_or_else(|| {
                    ServiceError::ValidationError(
                        "Parent comment does not belong to this post".to_string(),
                    )
                })?;
            if parent.placement.is_reply() {
                return Err(ServiceError::ValidationError(
                    "Replies cannot be nested".to_string(),
                ));
            }
        }

        let notify = comment_notification(&post, actor);
        Ok(self
            .comments
            .create(
                post_id,
                actor.id,
                CommentPlacement::from_parent(input.parent_id),
                &content,
                notify.as_slice(),
            )
            .await
            .context("Failed to create comment")?)
    }

    pub async fn update(&self, actor: &User, id: i64, content: &str) -> ServiceResult<Comment> {
        let content = validate_content(content)?;
        let comment = self.get(id).await?;
        if comment.author_id != actor.id {
            return Err(ServiceError::Forbidden(
                "Only the author may edit this comment".to_string(),
            ));
        }

        Ok(self
            .comments
            .update_content(id, &content)
            .await
            .context("Failed to update comment")?)
    }

    /// Delete a comment and, for a top-level comment, its replies
    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let comment = self.get(id).await?;
        if comment.author_id != actor.id && !actor.is_staff {
            return Err(ServiceError::Forbidden(
                "Only the author or staff may delete this comment".to_string(),
            ));
        }

        self.comments
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        Ok(())
    }

    pub async fn set_approved(
        &self,
        actor: &User,
        id: i64,
        approved: bool,
    ) -> ServiceResult<Comment> {
        ensure_staff(actor, "moderate comments")?;
        let comment = self
            .comments
            .set_approved(id, approved)
            .await
            .context("Failed to update comment approval")?
            .ok_or_else(|| ServiceError::not_found("Comment", id))?;
        tracing::info!(comment_id = id, approved, moderator = actor.id, "Comment moderated");
        Ok(comment)
    }

    /// Approved threads of a post: top-level comments newest first, each
    /// with its approved replies oldest first.
    pub async fn list_for_post(
        &self,
        post_id: i64,
        viewer: Option<&User>,
    ) -> ServiceResult<Vec<CommentThread>> {
        load_visible_post(self.posts.as_ref(), post_id, viewer).await?;
        let comments = self
            .comments
            .list_approved_for_post(post_id)
            .await
            .context("Failed to list comments")?;
        Ok(build_threads(comments))
    }

    /// The actor's comments across all posts, newest first
    pub async fn list_by_author(&self, actor: &User) -> ServiceResult<Vec<CommentView>> {
        Ok(self
            .comments
            .list_by_author(actor.id)
            .await
            .context("Failed to list comments")?)
    }

    async fn get(&self, id: i64) -> ServiceResult<Comment> {
        self.comments
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or_else(|| ServiceError::not_found("Comment", id))
    }
}

fn validate_content(content: &str) -> ServiceResult<String> {
    let content = content.trim();
    if content.chars().count() < MIN_CONTENT_LEN {
        return Err(ServiceError::ValidationError(format!(
            "Comment must be at least {} characters",
            MIN_CONTENT_LEN
        )));
    }
    Ok(content.to_string())
}

/// Group comments (oldest first) into threads. Replies to a comment that is
/// not in the list are dropped.
fn build_threads(comments: Vec<CommentView>) -> Vec<CommentThread> {
    let mut replies: HashMap<i64, Vec<CommentView>> = HashMap::new();
    let mut threads = Vec::new();

    for view in comments {
        match view.comment.placement {
            CommentPlacement::TopLevel => threads.push(CommentThread {
                comment: view,
                replies: Vec::new(),
            }),
            CommentPlacement::Reply { parent_id } => {
                replies.entry(parent_id).or_default().push(view)
            }
        }
    }

    threads.reverse();
    for thread in &mut threads {
        if let Some(children) = replies.remove(&thread.comment.comment.id) {
            thread.replies = children;
        }
    }
    threads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        test_support::{insert_post, setup_pool},
        SqlxCommentRepository, SqlxNotificationRepository, SqlxPostRepository,
        SqlxSubscriptionRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{ListParams, NotificationFilter, PostStatus};
    use crate::services::notification::NotificationService;
    use crate::services::test_support::{regular_user, staff_user};

    struct Fixture {
        pool: DynDatabasePool,
        service: CommentService,
        notifications: Arc<NotificationService>,
        author: User,
        reader: User,
        staff: User,
        post_id: i64,
        other_post_id: i64,
    }

    async fn fixture() -> Fixture {
        let pool = setup_pool().await;
        let staff = staff_user(&pool, "admin").await;
        let author = regular_user(&pool, "alice").await;
        let reader = regular_user(&pool, "bob").await;
        let post_id = insert_post(&pool, author.id, "hello", PostStatus::Published, None).await;
        let other_post_id =
            insert_post(&pool, author.id, "other", PostStatus::Published, None).await;

        let notifications = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool.clone()),
        ));
        let service = CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
        );
        Fixture {
            pool,
            service,
            notifications,
            author,
            reader,
            staff,
            post_id,
            other_post_id,
        }
    }

    #[tokio::test]
    async fn test_comment_notifies_author_but_not_self() {
        let f = fixture().await;
        f.service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Great read"))
            .await
            .unwrap();
        f.service
            .create(&f.author, f.post_id, CreateCommentInput::new("Thanks!"))
            .await
            .unwrap();

        let inbox = f
            .notifications
            .list(&f.author, NotificationFilter::default(), ListParams::default())
            .await
            .unwrap();
        assert_eq!(inbox.total, 1);
        assert_eq!(inbox.items[0].message, "bob commented on your post 'Title of hello'");
    }

    #[tokio::test]
    async fn test_failed_notification_discards_comment() {
        let f = fixture().await;
        f.pool.execute("DROP TABLE notifications").await.unwrap();

        let result = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Great read"))
            .await;
        assert!(matches!(result, Err(ServiceError::InternalError(_))));
        assert!(f.service.list_for_post(f.post_id, None).await.unwrap().is_empty());

        // The author's own comment needs no notification and still goes through
        f.service
            .create(&f.author, f.post_id, CreateCommentInput::new("Thanks!"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_content_validation() {
        let f = fixture().await;
        let short = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("  ok  "))
            .await;
        assert!(matches!(short, Err(ServiceError::ValidationError(_))));

        let missing = f
            .service
            .create(&f.reader, 9999, CreateCommentInput::new("Hello there"))
            .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reply_rules() {
        let f = fixture().await;
        let top = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Top level"))
            .await
            .unwrap();
        let reply = f
            .service
            .create(&f.author, f.post_id, CreateCommentInput::new("A reply").reply_to(top.id))
            .await
            .unwrap();
        assert_eq!(reply.placement, CommentPlacement::Reply { parent_id: top.id });

        let nested = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Nested").reply_to(reply.id))
            .await;
        assert!(matches!(nested, Err(ServiceError::ValidationError(_))));

        let cross_post = f
            .service
            .create(&f.reader, f.other_post_id, CreateCommentInput::new("Elsewhere").reply_to(top.id))
            .await;
        assert!(matches!(cross_post, Err(ServiceError::ValidationError(_))));

        let ghost_parent = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Orphan").reply_to(9999))
            .await;
        assert!(matches!(ghost_parent, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_threads_ordering() {
        let f = fixture().await;
        let first = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("First top"))
            .await
            .unwrap();
        let second = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Second top"))
            .await
            .unwrap();
        let reply_a = f
            .service
            .create(&f.author, f.post_id, CreateCommentInput::new("Reply A").reply_to(first.id))
            .await
            .unwrap();
        let reply_b = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Reply B").reply_to(first.id))
            .await
            .unwrap();

        let threads = f.service.list_for_post(f.post_id, None).await.unwrap();
        let tops: Vec<_> = threads.iter().map(|t| t.comment.comment.id).collect();
        assert_eq!(tops, vec![second.id, first.id]);

        let replies: Vec<_> = threads[1].replies.iter().map(|r| r.comment.id).collect();
        assert_eq!(replies, vec![reply_a.id, reply_b.id]);
        assert_eq!(threads[1].replies[0].author_username, "alice");
    }

    #[tokio::test]
    async fn test_edit_and_delete_permissions() {
        let f = fixture().await;
        let comment = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Original"))
            .await
            .unwrap();

        let denied = f.service.update(&f.author, comment.id, "Changed").await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
        let edited = f.service.update(&f.reader, comment.id, "Changed").await.unwrap();
        assert_eq!(edited.content, "Changed");

        let denied = f.service.delete(&f.author, comment.id).await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
        f.service.delete(&f.staff, comment.id).await.unwrap();
        assert!(matches!(
            f.service.delete(&f.reader, comment.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_moderation_hides_comment() {
        let f = fixture().await;
        let comment = f
            .service
            .create(&f.reader, f.post_id, CreateCommentInput::new("Borderline"))
            .await
            .unwrap();

        let denied = f.service.set_approved(&f.reader, comment.id, false).await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));

        let hidden = f.service.set_approved(&f.staff, comment.id, false).await.unwrap();
        assert!(!hidden.is_approved);
        assert!(f.service.list_for_post(f.post_id, None).await.unwrap().is_empty());
        assert_eq!(f.service.list_by_author(&f.reader).await.unwrap().len(), 1);
    }
}
