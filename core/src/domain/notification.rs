//! Typed notification events delivered to users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::task::TaskId;
use crate::domain::user::UserId;

/// Opaque notification identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NotificationId(Uuid);

impl NotificationId {
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

/// Notification event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A doer was allocated to a task.
    TaskAssigned,
    /// A task was marked completed.
    TaskCompleted,
    /// A doer applied to a task.
    ApplicationReceived,
    /// An application won the auction.
    ApplicationAccepted,
    /// A deadline is approaching.
    DeadlineReminder,
    /// An allocated task passed its deadline.
    TaskOverdue,
    /// An open task passed its deadline unallocated.
    TaskExpired,
    /// An unallocated task was removed after the grace period.
    TaskAutoDeleted,
    /// The chat-unlock commission settled.
    CommissionPaid,
    /// A task payment settled.
    PaymentConfirmed,
    /// The user received a rating.
    RatingReceived,
    /// Anything else.
    SystemMessage,
}

/// One notification delivered to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier.
    pub id: NotificationId,
    /// Recipient.
    pub user_id: UserId,
    /// Event type.
    pub kind: NotificationKind,
    /// Short headline.
    pub title: String,
    /// Full message body.
    pub body: String,
    /// Task this event concerns, if any.
    pub related_task: Option<TaskId>,
    /// Key used to de-duplicate repeat emissions.
    pub dedup_key: Option<String>,
    /// Whether the recipient has read it.
    pub is_read: bool,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}
