//! Error type shared by the engagement services

use crate::models::User;

/// Error types for service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Input failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Actor may not perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced record does not exist (or is not visible to the actor)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness rule would be broken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Post lifecycle transition not allowed from the current status
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Request is well-formed but makes no sense, e.g. subscribing to oneself
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// No authenticated user
    #[error("Authentication required")]
    Unauthenticated,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ServiceError {
    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fail with `Forbidden` unless `actor` is staff
pub(crate) fn ensure_staff(actor: &User, action: &str) -> ServiceResult<()> {
    if actor.is_staff {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!("Only staff may {}", action)))
    }
}
