//! Core error taxonomy.
//!
//! These errors are transport agnostic. Callers map them to HTTP statuses,
//! CLI exits, or any other surface. Each error carries a single-sentence
//! message identifying the failed operation or precondition.

use serde::{Deserialize, Serialize};

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A unique-key insertion was attempted twice.
    ConstraintViolation,
    /// A guarded transition found its precondition false.
    StaleState,
    /// An external collaborator (gateway, store) failed or timed out.
    ExternalUnavailable,
    /// The requested entity does not exist.
    NotFound,
    /// Banned user or role mismatch.
    PermissionDenied,
}

/// Error raised by core services.
///
/// Guard failures (`StaleState`) are never auto-retried; duplicate-key
/// failures (`ConstraintViolation`) become idempotent no-ops where the
/// existing row is in a compatible state; `ExternalUnavailable` is handled by
/// reconciliation sweeps, never by speculative success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Attempted to insert a duplicate unique key.
    #[error("{message}")]
    ConstraintViolation {
        /// Human-readable description of the duplicate key.
        message: String,
    },
    /// A guarded transition found the precondition false.
    #[error("{message}")]
    StaleState {
        /// The precondition that did not hold.
        message: String,
    },
    /// Gateway or persistence I/O failed or timed out.
    #[error("{message}")]
    ExternalUnavailable {
        /// Description of the unavailable collaborator.
        message: String,
    },
    /// Entity lookup miss.
    #[error("{message}")]
    NotFound {
        /// Description of the missing entity.
        message: String,
    },
    /// Banned user or role mismatch.
    #[error("{message}")]
    PermissionDenied {
        /// Why the caller is not permitted.
        message: String,
    },
}

impl CoreError {
    /// Convenience constructor for [`CoreError::ConstraintViolation`].
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`CoreError::StaleState`].
    pub fn stale_state(message: impl Into<String>) -> Self {
        Self::StaleState {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`CoreError::ExternalUnavailable`].
    pub fn external_unavailable(message: impl Into<String>) -> Self {
        Self::ExternalUnavailable {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`CoreError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`CoreError::PermissionDenied`].
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConstraintViolation { .. } => ErrorCode::ConstraintViolation,
            Self::StaleState { .. } => ErrorCode::StaleState,
            Self::ExternalUnavailable { .. } => ErrorCode::ExternalUnavailable,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            Self::ConstraintViolation { message }
            | Self::StaleState { message }
            | Self::ExternalUnavailable { message }
            | Self::NotFound { message }
            | Self::PermissionDenied { message } => message.as_str(),
        }
    }
}

/// Convenient core result alias.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
#[path = "error/tests.rs"]
mod tests;
