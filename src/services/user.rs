//! User service
//!
//! Thin identity collaborator for the engagement core:
//! - Registration (the first user becomes staff, a profile is created)
//! - Login by username or email, returning a session token
//! - Logout and session validation

use crate::db::repositories::{ProfileRepository, SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in days
const DEFAULT_SESSION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Invalid registration input
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Session not found")]
    SessionNotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for registration and sessions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            profile_repo,
            session_days: DEFAULT_SESSION_DAYS,
        }
    }

    /// Override the session lifetime
    pub fn with_session_days(mut self, days: i64) -> Self {
        self.session_days = days;
        self
    }

    /// Register a new user.
    ///
    /// The first user in the system is made staff. A blank profile is
    /// created alongside the account.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        validate_register_input(&input)?;

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let is_staff = self.user_repo.count().await.context("Failed to count users")? == 0;
        let password_hash = hash_password(&input.password)?;

        let user = User::new(username, email, password_hash, is_staff).with_names(
            input.first_name.unwrap_or_default(),
            input.last_name.unwrap_or_default(),
        );
        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        self.profile_repo
            .create_for_user(created.id)
            .await
            .context("Failed to create profile")?;

        tracing::info!(user_id = created.id, is_staff, "Registered user {}", created.username);
        Ok(created)
    }

    /// Check credentials and open a new session.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let login = input.username_or_email.trim();
        let user = match self
            .user_repo
            .get_by_username(login)
            .await
            .context("Failed to get user by username")?
        {
            Some(user) => user,
            None => self
                .user_repo
                .get_by_email(login)
                .await
                .context("Failed to get user by email")?
                .ok_or_else(invalid)?,
        };

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "Rejected login with wrong password");
            return Err(invalid());
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.session_days),
            created_at: now,
        };
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(session)
    }

    /// Delete a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions are removed and reported as `SessionExpired`.
    pub async fn validate_session(&self, token: &str) -> Result<User, UserServiceError> {
        let session = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
            .ok_or(UserServiceError::SessionNotFound)?;

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Err(UserServiceError::SessionExpired);
        }

        self.user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get session user")?
            .ok_or(UserServiceError::SessionNotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Remove every expired session; returns how many were deleted
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }
}

fn validate_register_input(input: &RegisterInput) -> Result<(), UserServiceError> {
    let invalid = |msg: &str| Err(UserServiceError::ValidationError(msg.to_string()));

    if input.username.trim().is_empty() {
        return invalid("Username cannot be empty");
    }
    if input.email.trim().is_empty() {
        return invalid("Email cannot be empty");
    }
    if !input.email.contains('@') {
        return invalid("Invalid email format");
    }
    if input.password.is_empty() {
        return invalid("Password cannot be empty");
    }
    Ok(())
}

/// Input for user registration
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        test_support::setup_pool, SqlxProfileRepository, SqlxSessionRepository,
        SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;

    async fn setup_service() -> (DynDatabasePool, UserService) {
        let pool = setup_pool().await;
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxProfileRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_first_user_is_staff() {
        let (_pool, service) = setup_service().await;

        let first = service
            .register(RegisterInput::new("admin", "admin@example.com", "secret"))
            .await
            .unwrap();
        let second = service
            .register(RegisterInput::new("reader", "reader@example.com", "secret"))
            .await
            .unwrap();

        assert!(first.is_staff);
        assert!(!second.is_staff);
    }

    #[tokio::test]
    async fn test_register_creates_profile() {
        let (pool, service) = setup_service().await;
        let user = service
            .register(RegisterInput::new("ada", "ada@example.com", "secret"))
            .await
            .unwrap();

        let profiles = SqlxProfileRepository::new(pool);
        assert!(profiles.get_by_user(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let (_pool, service) = setup_service().await;
        service
            .register(RegisterInput::new("ada", "ada@example.com", "secret"))
            .await
            .unwrap();

        let dup_name = service
            .register(RegisterInput::new("ada", "other@example.com", "secret"))
            .await;
        assert!(matches!(dup_name, Err(UserServiceError::UserExists(_))));

        let dup_email = service
            .register(RegisterInput::new("bob", "ada@example.com", "secret"))
            .await;
        assert!(matches!(dup_email, Err(UserServiceError::UserExists(_))));

        let bad_email = service
            .register(RegisterInput::new("carol", "not-an-email", "secret"))
            .await;
        assert!(matches!(bad_email, Err(UserServiceError::ValidationError(_))));

        let empty = service.register(RegisterInput::new("  ", "x@example.com", "secret")).await;
        assert!(matches!(empty, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let (_pool, service) = setup_service().await;
        let user = service
            .register(RegisterInput::new("ada", "ada@example.com", "secret"))
            .await
            .unwrap();

        let by_name = service.login(LoginInput::new("ada", "secret")).await.unwrap();
        let by_email = service
            .login(LoginInput::new("ada@example.com", "secret"))
            .await
            .unwrap();
        assert_eq!(by_name.user_id, user.id);
        assert_eq!(by_email.user_id, user.id);
        assert_ne!(by_name.id, by_email.id);

        let wrong = service.login(LoginInput::new("ada", "nope")).await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));
        let unknown = service.login(LoginInput::new("nobody", "secret")).await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_validate_and_logout() {
        let (_pool, service) = setup_service().await;
        let user = service
            .register(RegisterInput::new("ada", "ada@example.com", "secret"))
            .await
            .unwrap();
        let session = service.login(LoginInput::new("ada", "secret")).await.unwrap();

        let resolved = service.validate_session(&session.id).await.unwrap();
        assert_eq!(resolved.id, user.id);

        service.logout(&session.id).await.unwrap();
        let result = service.validate_session(&session.id).await;
        assert!(matches!(result, Err(UserServiceError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup_service().await;
        let service = service.with_session_days(-1);
        service
            .register(RegisterInput::new("ada", "ada@example.com", "secret"))
            .await
            .unwrap();
        let session = service.login(LoginInput::new("ada", "secret")).await.unwrap();

        let result = service.validate_session(&session.id).await;
        assert!(matches!(result, Err(UserServiceError::SessionExpired)));

        let sessions = SqlxSessionRepository::new(pool);
        assert!(sessions.get_by_id(&session.id).await.unwrap().is_none());
    }
}
