//! Engagement ledger models: likes and ratings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest accepted rating
pub const MIN_RATING: i32 = 1;
/// Highest accepted rating
pub const MAX_RATING: i32 = 5;

/// A user's like on a post; at most one per (post, user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A user's 1..=5 rating of a post; at most one per (post, user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rating with the rater's username for display
#[derive(Debug, Clone, Serialize)]
pub struct RatingView {
    #[serde(flatten)]
    pub rating: Rating,
    pub username: String,
}

/// Input for rating a post or changing an existing rating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingInput {
    pub rating: i32,
    #[serde(default)]
    pub review: Option<String>,
}

impl RatingInput {
    pub fn new(rating: i32) -> Self {
        Self { rating, review: None }
    }

    pub fn with_review(mut self, review: impl Into<String>) -> Self {
        self.review = Some(review.into());
        self
    }

    pub fn in_range(&self) -> bool {
        (MIN_RATING..=MAX_RATING).contains(&self.rating)
    }
}
