//! Payments, the per-task system commission, and the system wallet.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::task::TaskId;
use crate::domain::user::UserId;

/// Opaque payment identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Wrap an existing identifier.
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery, confirmed manually by the payer.
    Cod,
    /// GCash wallet through the gateway.
    Gcash,
    /// PayMaya wallet through the gateway.
    Paymaya,
    /// Direct bank transfer.
    BankTransfer,
    /// Generic gateway checkout.
    Gateway,
}

/// Payment lifecycle status.
///
/// Gateway-side failures park the row in `Failed`; reconciliation may move
/// it forward once the gateway reports a final status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created, not yet routed.
    Pending,
    /// Waiting on the gateway.
    PendingPayment,
    /// Waiting on manual confirmation (COD).
    PendingConfirmation,
    /// Settled.
    Confirmed,
    /// Under dispute.
    Disputed,
    /// Returned to the payer.
    Refunded,
    /// Rejected by the gateway.
    Failed,
}

/// A transfer from payer to receiver for a task.
///
/// At most one payment per `(task, payer, receiver)`; `gateway_payment_id`
/// is globally unique when present and de-duplicates gateway callbacks.
/// `amount == commission_amount + net_amount` exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier.
    pub id: PaymentId,
    /// The task being paid for.
    pub task_id: TaskId,
    /// Paying user.
    pub payer_id: UserId,
    /// Receiving user.
    pub receiver_id: UserId,
    /// Gross amount.
    pub amount: Decimal,
    /// Commission retained by the system.
    pub commission_amount: Decimal,
    /// Net amount owed to the receiver.
    pub net_amount: Decimal,
    /// Payment method.
    pub method: PaymentMethod,
    /// Lifecycle status.
    pub status: PaymentStatus,
    /// Gateway idempotency key, unique across all payments when present.
    pub gateway_payment_id: Option<String>,
    /// Reconciliation attempts consumed so far.
    pub reconcile_attempts: u32,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Settlement instant.
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Settlement state of the per-task commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Awaiting payment.
    Pending,
    /// Settled; chat is unlocked.
    Paid,
    /// Rejected by the gateway.
    Failed,
}

/// One-to-one record of the poster-paid unlock fee for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemCommission {
    /// The task this fee unlocks.
    pub task_id: TaskId,
    /// Paying poster.
    pub payer_id: UserId,
    /// Fee amount.
    pub amount: Decimal,
    /// How the fee is being paid.
    pub method: PaymentMethod,
    /// Settlement state.
    pub status: CommissionStatus,
    /// Gateway idempotency key, globally unique when present.
    pub gateway_payment_id: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Settlement instant.
    pub paid_at: Option<DateTime<Utc>>,
}

/// Running total of settled commissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemWallet {
    /// Sum of settled commission amounts plus the opening balance.
    pub total_revenue: Decimal,
    /// Count of settlement events.
    pub total_transactions: u64,
}

impl Default for SystemWallet {
    fn default() -> Self {
        Self {
            total_revenue: Decimal::ZERO,
            total_transactions: 0,
        }
    }
}
