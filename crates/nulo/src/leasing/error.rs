use serde::Serialize;
use tracing::{error, warn};

use super::domain::ApplicationStatus;
use super::repository::RepositoryError;

/// Stable machine-readable error code handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    ProfileIncomplete,
    DuplicateApplication,
    DuplicateFavorite,
    InvalidTransition,
    StorageUnavailable,
    Internal,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ProfileIncomplete => "profile_incomplete",
            ErrorKind::DuplicateApplication => "duplicate_application",
            ErrorKind::DuplicateFavorite => "duplicate_favorite",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Typed outcome of every leasing operation. Messages are safe to show to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeasingError {
    #[error("could not validate credentials")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("you must complete your profile (100%) before applying for properties (currently {completion}%)")]
    ProfileIncomplete { completion: u8 },
    #[error("you have already applied for this property")]
    DuplicateApplication,
    #[error("property already in favorites")]
    DuplicateFavorite,
    #[error("application is already {current}")]
    InvalidTransition { current: ApplicationStatus },
    #[error("service temporarily unavailable, please retry")]
    StorageUnavailable,
    #[error("internal error")]
    Internal,
}

impl LeasingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeasingError::Unauthenticated => ErrorKind::Unauthenticated,
            LeasingError::Forbidden(_) => ErrorKind::Forbidden,
            LeasingError::NotFound { .. } => ErrorKind::NotFound,
            LeasingError::ProfileIncomplete { .. } => ErrorKind::ProfileIncomplete,
            LeasingError::DuplicateApplication => ErrorKind::DuplicateApplication,
            LeasingError::DuplicateFavorite => ErrorKind::DuplicateFavorite,
            LeasingError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            LeasingError::StorageUnavailable => ErrorKind::StorageUnavailable,
            LeasingError::Internal => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LeasingError::StorageUnavailable)
    }

    /// Map a storage failure at a service seam. `entity` names what was being looked up
    /// when the store reports `NotFound`. Conflicts are context specific and handled by
    /// callers before reaching this point; any that slip through are internal.
    pub fn from_repository(err: RepositoryError, entity: &'static str) -> Self {
        match err {
            RepositoryError::NotFound => LeasingError::NotFound { entity },
            RepositoryError::StaleState { current } => LeasingError::InvalidTransition { current },
            RepositoryError::Unavailable(reason) => {
                warn!(%reason, entity, "storage unavailable after retries");
                LeasingError::StorageUnavailable
            }
            RepositoryError::Conflict => {
                error!(entity, "unexpected storage conflict");
                LeasingError::Internal
            }
            RepositoryError::Corrupted(detail) => {
                error!(%detail, entity, "storage reported corrupted state");
                LeasingError::Internal
            }
        }
    }

    /// Log an unexpected fault in full and hand back the generic error.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(%detail, "internal leasing failure");
        LeasingError::Internal
    }
}
