//! User model
//!
//! Identity is a thin collaborator for the platform: the engagement core
//! only needs a stable id, a display name for notification messages and
//! the staff flag used by moderation checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Staff users may moderate comments and manage categories
    pub is_staff: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User.
    ///
    /// The password must already be hashed with
    /// `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, is_staff: bool) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            is_staff,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set first and last name
    pub fn with_names(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    /// "First Last" when a name is known, otherwise the username
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Public view of a user, as shown on author pages.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Number of published posts by this user
    pub posts_count: i64,
    pub created_at: DateTime<Utc>,
}

impl PublicUser {
    pub fn new(user: User, posts_count: i64) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            posts_count,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_username() {
        let user = User::new("ada".into(), "ada@example.com".into(), "hash".into(), false);
        assert_eq!(user.display_name(), "ada");

        let user = user.with_names("Ada", "Lovelace");
        assert_eq!(user.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("ada".into(), "ada@example.com".into(), "secret".into(), false);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }
}
