//! Port for payment persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::payment::{Payment, PaymentId, PaymentMethod, PaymentStatus};
use crate::domain::task::TaskId;
use crate::domain::user::UserId;

use super::StoreError;

/// Command inserting a new payment with a precomputed commission split.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    /// The task being paid for.
    pub task_id: TaskId,
    /// Paying user.
    pub payer_id: UserId,
    /// Receiving user.
    pub receiver_id: UserId,
    /// Gross amount.
    pub amount: Decimal,
    /// Commission share; `amount == commission + net` must hold exactly.
    pub commission_amount: Decimal,
    /// Net share.
    pub net_amount: Decimal,
    /// Payment method.
    pub method: PaymentMethod,
    /// Initial status.
    pub status: PaymentStatus,
    /// Gateway idempotency key, when already known.
    pub gateway_payment_id: Option<String>,
    /// Creation instant.
    pub now: DateTime<Utc>,
}

/// Port for payment persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a payment.
    ///
    /// Fails with [`StoreError::Conflict`] when a payment for the same
    /// `(task, payer, receiver)` triple exists, or when the gateway id is
    /// already used by another payment.
    async fn insert(&self, command: NewPayment) -> Result<Payment, StoreError>;

    /// Find a payment by id.
    async fn find(&self, payment_id: PaymentId) -> Result<Option<Payment>, StoreError>;

    /// Find a payment by its gateway idempotency key.
    async fn find_by_gateway_id(
        &self,
        gateway_payment_id: String,
    ) -> Result<Option<Payment>, StoreError>;

    /// Payments recorded for a task, oldest first.
    async fn list_for_task(&self, task_id: TaskId) -> Result<Vec<Payment>, StoreError>;

    /// Advance a payment's status, stamping `confirmed_at` on confirmation.
    async fn mark_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Payment, StoreError>;

    /// Attach a gateway id to an existing payment.
    ///
    /// Fails with [`StoreError::Conflict`] when another payment already
    /// carries the id.
    async fn attach_gateway_id(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: String,
    ) -> Result<Payment, StoreError>;

    /// Gateway-routed payments still pending that were created at or before
    /// `created_by` and have consumed fewer than `max_attempts`
    /// reconciliation attempts.
    async fn list_awaiting_reconciliation(
        &self,
        created_by: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Vec<Payment>, StoreError>;

    /// Count one reconciliation attempt against a payment.
    async fn record_reconcile_attempt(&self, payment_id: PaymentId) -> Result<Payment, StoreError>;
}
