//! Outbound ports of the allocation core.
//!
//! One file per port. Every port is an `async_trait` object-safe trait with
//! a mockall mock under test builds. Adapters live under
//! [`crate::outbound`]; the in-memory entity store implements every
//! repository port with serializable semantics.

pub mod application_repository;
pub mod commission_repository;
pub mod notification_repository;
pub mod payment_gateway;
pub mod payment_repository;
pub mod rating_repository;
pub mod task_repository;
pub mod user_repository;

pub use self::application_repository::{ApplicationRepository, NewApplication};
pub use self::commission_repository::{
    CommissionRepository, NewCommission, SettleCommission, SettlementOutcome,
};
pub use self::notification_repository::NotificationRepository;
pub use self::payment_gateway::{
    CreateSourceRequest, FixturePaymentGateway, GatewayError, GatewayIntent, GatewayIntentStatus,
    GatewaySource, PaymentGateway,
};
pub use self::payment_repository::{NewPayment, PaymentRepository};
pub use self::rating_repository::RatingRepository;
pub use self::task_repository::{AssignTask, TaskRepository};
pub use self::user_repository::UserRepository;

#[cfg(test)]
pub use self::application_repository::MockApplicationRepository;
#[cfg(test)]
pub use self::commission_repository::MockCommissionRepository;
#[cfg(test)]
pub use self::notification_repository::MockNotificationRepository;
#[cfg(test)]
pub use self::payment_gateway::MockPaymentGateway;
#[cfg(test)]
pub use self::payment_repository::MockPaymentRepository;
#[cfg(test)]
pub use self::rating_repository::MockRatingRepository;
#[cfg(test)]
pub use self::task_repository::MockTaskRepository;
#[cfg(test)]
pub use self::user_repository::MockUserRepository;

use crate::domain::error::CoreError;

/// Errors raised by entity-store adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A unique key was violated.
    #[error("store conflict: {message}")]
    Conflict {
        /// The duplicated key.
        message: String,
    },
    /// The entity does not exist.
    #[error("entity not found: {message}")]
    Missing {
        /// The missing entity.
        message: String,
    },
    /// A status precondition did not hold.
    #[error("stale state: {message}")]
    Stale {
        /// The failed precondition.
        message: String,
    },
    /// The store is unreachable.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// What failed.
        message: String,
    },
}

impl StoreError {
    /// Convenience constructor for [`StoreError::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`StoreError::Missing`].
    pub fn missing(message: impl Into<String>) -> Self {
        Self::Missing {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`StoreError::Stale`].
    pub fn stale(message: impl Into<String>) -> Self {
        Self::Stale {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`StoreError::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { message } => Self::ConstraintViolation { message },
            StoreError::Missing { message } => Self::NotFound { message },
            StoreError::Stale { message } => Self::StaleState { message },
            StoreError::Unavailable { message } => Self::ExternalUnavailable { message },
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use super::*;
    use crate::domain::error::ErrorCode;

    #[test]
    fn store_errors_map_onto_the_core_taxonomy() {
        let cases = [
            (StoreError::conflict("dup"), ErrorCode::ConstraintViolation),
            (StoreError::missing("task"), ErrorCode::NotFound),
            (StoreError::stale("not open"), ErrorCode::StaleState),
            (
                StoreError::unavailable("io"),
                ErrorCode::ExternalUnavailable,
            ),
        ];
        for (error, code) in cases {
            assert_eq!(CoreError::from(error).code(), code);
        }
    }
}
