//! Port for the per-task commission record and the system wallet.
//!
//! Settlement is a single port operation because it spans three rows: the
//! commission itself, the task's chat-unlock flag, and the wallet counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::payment::{PaymentMethod, SystemCommission, SystemWallet};
use crate::domain::task::TaskId;
use crate::domain::user::UserId;

use super::StoreError;

/// Command creating the commission record for a freshly posted task.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCommission {
    /// The task this fee unlocks.
    pub task_id: TaskId,
    /// Paying poster.
    pub payer_id: UserId,
    /// Fee amount.
    pub amount: Decimal,
    /// How the fee will be paid.
    pub method: PaymentMethod,
    /// Creation instant.
    pub now: DateTime<Utc>,
}

/// Command settling a commission.
#[derive(Debug, Clone, PartialEq)]
pub struct SettleCommission {
    /// The task whose commission settles.
    pub task_id: TaskId,
    /// Gateway idempotency key, absent for COD settlements.
    pub gateway_payment_id: Option<String>,
    /// Settlement instant.
    pub now: DateTime<Utc>,
}

/// Result of a settlement attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// The commission settled in this call; the wallet was credited.
    Settled(SystemCommission),
    /// The commission had already settled; nothing changed.
    AlreadySettled(SystemCommission),
}

/// Port for commission persistence and wallet accounting.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommissionRepository: Send + Sync {
    /// Create the commission record. Fails with [`StoreError::Conflict`]
    /// when the task already has one.
    async fn create(&self, command: NewCommission) -> Result<SystemCommission, StoreError>;

    /// Find the commission record for a task.
    async fn find_for_task(&self, task_id: TaskId) -> Result<Option<SystemCommission>, StoreError>;

    /// Find a commission by its gateway idempotency key.
    async fn find_by_gateway_id(
        &self,
        gateway_payment_id: String,
    ) -> Result<Option<SystemCommission>, StoreError>;

    /// Attach a gateway id (checkout source) to a pending commission.
    async fn attach_gateway_id(
        &self,
        task_id: TaskId,
        gateway_payment_id: String,
    ) -> Result<SystemCommission, StoreError>;

    /// Settle a commission.
    ///
    /// In one transaction: mark the record paid, set the task's
    /// `commission_deducted` flag, and credit the wallet
    /// (`total_revenue += amount`, `total_transactions += 1`). Settling an
    /// already-paid commission changes nothing and reports
    /// [`SettlementOutcome::AlreadySettled`].
    async fn settle(&self, command: SettleCommission) -> Result<SettlementOutcome, StoreError>;

    /// Record a gateway-side failure on a pending commission.
    async fn mark_failed(&self, task_id: TaskId) -> Result<SystemCommission, StoreError>;

    /// Current wallet totals.
    async fn wallet(&self) -> Result<SystemWallet, StoreError>;
}
