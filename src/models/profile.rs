//! Profile model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One-to-one extension of a user with public biographical details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
    /// Media reference for the profile picture
    pub picture: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileInput {
    pub bio: Option<String>,
    pub picture: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl UpdateProfileInput {
    pub fn has_changes(&self) -> bool {
        self.bio.is_some()
            || self.picture.is_some()
            || self.website.is_some()
            || self.location.is_some()
            || self.birth_date.is_some()
    }
}

/// Profile as returned to clients, with the picture resolved to a URL.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub username: String,
    pub avatar_url: String,
}
