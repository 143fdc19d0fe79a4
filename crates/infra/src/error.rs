use thiserror::Error;

use billtrack_auth::{Decision, EvaluationError, LookupError};
use billtrack_core::DomainError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure of a gated application operation.
///
/// `Denied` carries the full decision so callers can pick a redirect from the
/// tier and reason; the other variants are infrastructure or domain failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("denied: {}", .0.reason())]
    Denied(Decision),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("backing store failed: {0}")]
    Store(LookupError),

    #[error("a campaign must keep at least one manager")]
    LastManager,
}

/// Failure reported by a repository write or read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("row already exists")]
    Duplicate,

    #[error("row not found")]
    Missing,

    /// The change would leave a campaign without a manager; nothing was written.
    #[error("last manager of the campaign")]
    LastManager,

    #[error(transparent)]
    Backend(#[from] LookupError),
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Duplicate => ServiceError::Domain(DomainError::conflict("already exists")),
            RepositoryError::Missing => ServiceError::Domain(DomainError::not_found()),
            RepositoryError::LastManager => ServiceError::LastManager,
            RepositoryError::Backend(e) => ServiceError::Store(e),
        }
    }
}

pub(crate) fn backend(e: sqlx::Error) -> LookupError {
    LookupError::unavailable(e.to_string())
}

pub(crate) fn poisoned(table: &str) -> LookupError {
    LookupError::unavailable(format!("{table} table lock poisoned"))
}

/// Turn a decision into `Ok(())` or a `Denied` error.
pub(crate) fn require(decision: Decision) -> ServiceResult<()> {
    if decision.allowed {
        Ok(())
    } else {
        Err(ServiceError::Denied(decision))
    }
}
