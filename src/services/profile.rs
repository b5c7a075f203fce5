//! Profile service
//!
//! Profiles are created at registration, and lazily for accounts that
//! predate that rule. Picture references resolve through the media base URL,
//! with a Gravatar fallback derived from the email address.

use crate::config::MediaConfig;
use crate::db::repositories::{ProfileRepository, UserRepository};
use crate::models::{Profile, ProfileView, UpdateProfileInput, User};
use crate::services::error::{ServiceError, ServiceResult};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const GRAVATAR_BASE: &str = "https://www.gravatar.com/avatar/";

/// Profile service
pub struct ProfileService {
    profile_repo: Arc<dyn ProfileRepository>,
    user_repo: Arc<dyn UserRepository>,
    media: MediaConfig,
}

impl ProfileService {
    pub fn new(
        profile_repo: Arc<dyn ProfileRepository>,
        user_repo: Arc<dyn UserRepository>,
        media: MediaConfig,
    ) -> Self {
        Self {
            profile_repo,
            user_repo,
            media,
        }
    }

    /// Profile of `user_id`, created on first access
    pub async fn get_or_create(&self, user_id: i64) -> ServiceResult<ProfileView> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;

        let profile = self.load_profile(user.id).await?;
        Ok(self.view(profile, &user))
    }

    /// Update the actor's own profile. Empty strings clear optional fields.
    pub async fn update(
        &self,
        actor: &User,
        input: UpdateProfileInput,
    ) -> ServiceResult<ProfileView> {
        let mut profile = self.load_profile(actor.id).await?;
        if !input.has_changes() {
            return Ok(self.view(profile, actor));
        }

        if let Some(website) = input.website {
            let website = website.trim().to_string();
            if !website.is_empty() && !is_http_url(&website) {
                return Err(ServiceError::ValidationError(
                    "Website must be an http:// or https:// URL".to_string(),
                ));
            }
            profile.website = non_empty(website);
        }
        if let Some(bio) = input.bio {
            profile.bio = bio;
        }
        if let Some(picture) = input.picture {
            profile.picture = non_empty(picture.trim().to_string());
        }
        if let Some(location) = input.location {
            profile.location = non_empty(location.trim().to_string());
        }
        if let Some(birth_date) = input.birth_date {
            if birth_date > Utc::now().date_naive() {
                return Err(ServiceError::ValidationError(
                    "Birth date cannot be in the future".to_string(),
                ));
            }
            profile.birth_date = Some(birth_date);
        }

        let updated = self
            .profile_repo
            .update(&profile)
            .await
            .context("Failed to update profile")?;
        Ok(self.view(updated, actor))
    }

    /// URL of a user's avatar
    pub fn avatar_url(&self, profile: &Profile, user: &User) -> String {
        match profile.picture.as_deref() {
            Some(picture) => self.media.resolve(picture),
            None => gravatar_url(&user.email),
        }
    }

    async fn load_profile(&self, user_id: i64) -> ServiceResult<Profile> {
        if let Some(profile) = self
            .profile_repo
            .get_by_user(user_id)
            .await
            .context("Failed to get profile")?
        {
            return Ok(profile);
        }
        tracing::debug!(user_id, "Creating missing profile");
        Ok(self
            .profile_repo
            .create_for_user(user_id)
            .await
            .context("Failed to create profile")?)
    }

    fn view(&self, profile: Profile, user: &User) -> ProfileView {
        let avatar_url = self.avatar_url(&profile, user);
        ProfileView {
            profile,
            username: user.username.clone(),
            avatar_url,
        }
    }
}

fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.len() > scheme.len() && value.to_ascii_lowercase().starts_with(scheme))
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Gravatar identicon URL for an email address
pub fn gravatar_url(email: &str) -> String {
    let digest = md5::compute(email.trim().to_lowercase().as_bytes());
    format!("{}{:x}?d=identicon", GRAVATAR_BASE, digest)
}
