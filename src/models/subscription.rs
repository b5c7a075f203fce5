//! Subscription model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a subscription follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Author,
    Category,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Author => "author",
            SubscriptionKind::Category => "category",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "author" => Some(SubscriptionKind::Author),
            "category" => Some(SubscriptionKind::Category),
            _ => None,
        }
    }
}

/// Subscription target. Exactly one of author or category is ever set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SubscriptionTarget {
    Author { author_id: i64 },
    Category { category_id: i64 },
}

impl SubscriptionTarget {
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            SubscriptionTarget::Author { .. } => SubscriptionKind::Author,
            SubscriptionTarget::Category { .. } => SubscriptionKind::Category,
        }
    }

    pub fn author_id(&self) -> Option<i64> {
        match self {
            SubscriptionTarget::Author { author_id } => Some(*author_id),
            SubscriptionTarget::Category { .. } => None,
        }
    }

    pub fn category_id(&self) -> Option<i64> {
        match self {
            SubscriptionTarget::Category { category_id } => Some(*category_id),
            SubscriptionTarget::Author { .. } => None,
        }
    }

    /// Rebuild a target from its stored columns. Returns `None` when the
    /// columns do not match the kind.
    pub fn from_parts(
        kind: &str,
        author_id: Option<i64>,
        category_id: Option<i64>,
    ) -> Option<Self> {
        match (SubscriptionKind::from_str(kind)?, author_id, category_id) {
            (SubscriptionKind::Author, Some(author_id), None) => {
                Some(SubscriptionTarget::Author { author_id })
            }
            (SubscriptionKind::Category, None, Some(category_id)) => {
                Some(SubscriptionTarget::Category { category_id })
            }
            _ => None,
        }
    }
}

/// A user's standing interest in an author or category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub subscriber_id: i64,
    #[serde(flatten)]
    pub target: SubscriptionTarget,
    /// Cleared by unsubscribe; the row is kept
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
