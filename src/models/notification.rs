//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest stored notification message, in characters
pub const MAX_MESSAGE_LEN: usize = 255;

/// Event that produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewPost,
    NewComment,
    NewLike,
    NewRating,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewPost => "new_post",
            NotificationKind::NewComment => "new_comment",
            NotificationKind::NewLike => "new_like",
            NotificationKind::NewRating => "new_rating",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new_post" => Some(NotificationKind::NewPost),
            "new_comment" => Some(NotificationKind::NewComment),
            "new_like" => Some(NotificationKind::NewLike),
            "new_rating" => Some(NotificationKind::NewRating),
            _ => None,
        }
    }
}

/// Notification entity, owned by its recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub kind: NotificationKind,
    pub post_id: Option<i64>,
    /// Cleared when the sender's account is deleted
    pub sender_id: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub kind: NotificationKind,
    pub post_id: Option<i64>,
    pub sender_id: Option<i64>,
    pub message: String,
}

impl NewNotification {
    /// Build a notification, truncating the message to the stored width.
    pub fn new(
        recipient_id: i64,
        kind: NotificationKind,
        post_id: Option<i64>,
        sender_id: Option<i64>,
        message: impl Into<String>,
    ) -> Self {
        let message: String = message.into();
        let message = if message.chars().count() > MAX_MESSAGE_LEN {
            message.chars().take(MAX_MESSAGE_LEN).collect()
        } else {
            message
        };
        Self {
            recipient_id,
            kind,
            post_id,
            sender_id,
            message,
        }
    }
}

/// Filters for listing a user's notifications
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub kind: Option<NotificationKind>,
}
