//! Comment model
//!
//! Threads are at most two levels deep: a comment either sits at the top
//! level of a post or replies to a top-level comment of the same post.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a comment sits in its post's thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum CommentPlacement {
    TopLevel,
    Reply { parent_id: i64 },
}

impl CommentPlacement {
    pub fn from_parent(parent_id: Option<i64>) -> Self {
        match parent_id {
            Some(parent_id) => CommentPlacement::Reply { parent_id },
            None => CommentPlacement::TopLevel,
        }
    }

    pub fn parent_id(&self) -> Option<i64> {
        match self {
            CommentPlacement::TopLevel => None,
            CommentPlacement::Reply { parent_id } => Some(*parent_id),
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, CommentPlacement::Reply { .. })
    }
}

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    #[serde(flatten)]
    pub placement: CommentPlacement,
    pub content: String,
    /// Unapproved comments are hidden from threads and counts
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment with its author's username for display
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
}

/// Top-level comment with its approved replies, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

/// Input for creating a comment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentInput {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl CreateCommentInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            parent_id: None,
        }
    }

    pub fn reply_to(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_serializes_inline() {
        let now = Utc::now();
        let comment = Comment {
            id: 7,
            post_id: 1,
            author_id: 2,
            placement: CommentPlacement::Reply { parent_id: 3 },
            content: "Nice post".to_string(),
            is_approved: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["placement"], "reply");
        assert_eq!(json["parent_id"], 3);

        let top = Comment {
            placement: CommentPlacement::TopLevel,
            ..comment
        };
        let json = serde_json::to_value(&top).unwrap();
        assert_eq!(json["placement"], "top_level");
        assert!(json.get("parent_id").is_none());
    }

    #[test]
    fn test_from_parent() {
        assert_eq!(CommentPlacement::from_parent(None), CommentPlacement::TopLevel);
        assert_eq!(
            CommentPlacement::from_parent(Some(4)).parent_id(),
            Some(4)
        );
    }
}
