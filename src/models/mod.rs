//! Data models
//!
//! This module contains all data structures used throughout Quillnote.
//! Models represent:
//! - Database entities (Post, Category, Tag, Comment, Like, Rating,
//!   Subscription, Notification, Profile, User, Session)
//! - Read-side projections with derived engagement figures
//! - API request types

mod category;
mod comment;
mod engagement;
mod notification;
mod post;
mod profile;
mod session;
mod subscription;
mod tag;
mod user;

pub use category::{Category, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput};
pub use comment::{Comment, CommentPlacement, CommentThread, CommentView, CreateCommentInput};
pub use engagement::{Like, Rating, RatingInput, RatingView, MAX_RATING, MIN_RATING};
pub use notification::{
    NewNotification, Notification, NotificationFilter, NotificationKind, MAX_MESSAGE_LEN,
};
pub use post::{
    CreatePostInput, LifecycleAction, ListParams, PagedResult, Post, PostDetail, PostFilter,
    PostStats, PostStatus, PostSummary, UpdatePostInput,
};
pub use profile::{Profile, ProfileView, UpdateProfileInput};
pub use session::Session;
pub use subscription::{Subscription, SubscriptionKind, SubscriptionTarget};
pub use tag::{Tag, TagWithCount};
pub use user::{PublicUser, User};
