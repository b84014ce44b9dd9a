//! Tasks: the unit of work posted, allocated, and completed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;

/// Opaque task identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TaskId(Uuid);

impl TaskId {
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

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Task category; everything except `Microtask` is skilled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Simple errands without a skill requirement.
    Microtask,
    /// Typing and transcription work.
    Typing,
    /// Presentation design.
    Powerpoint,
    /// Graphics design.
    Graphics,
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepting applications.
    Open,
    /// Allocated to a doer.
    InProgress,
    /// Finished by its doer.
    Completed,
    /// Withdrawn by the poster or an admin.
    Cancelled,
    /// Passed its deadline without ever being allocated.
    Expired,
}

impl TaskStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }
}

/// How a task came to be allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    /// Winner of the application auction.
    Auction,
    /// Pushed by the core to the best-scoring doer.
    Push,
}

/// Audit record of one (task, doer) allocation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// The allocated task.
    pub task_id: TaskId,
    /// The chosen doer.
    pub doer_id: UserId,
    /// How the allocation was made.
    pub method: AssignmentMethod,
    /// When the allocation happened.
    pub assigned_at: DateTime<Utc>,
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Owning poster.
    pub poster_id: UserId,
    /// Allocated doer; `None` exactly while `Open`.
    pub doer_id: Option<UserId>,
    /// Short human-readable title.
    pub title: String,
    /// Work category.
    pub category: Category,
    /// Agreed gross price.
    pub price: Decimal,
    /// Hard completion deadline.
    pub deadline: DateTime<Utc>,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Poster-declared urgency in [1, 5].
    pub priority_level: u8,
    /// Campus tag used for locality scoring.
    pub campus_location: Option<String>,
    /// Soft doer preference; the auction still runs.
    pub preferred_doer: Option<UserId>,
    /// Preferred execution window start.
    pub time_window_start: Option<DateTime<Utc>>,
    /// Preferred execution window end.
    pub time_window_end: Option<DateTime<Utc>>,
    /// Whether execution outside the window is acceptable.
    pub flexible_timing: bool,
    /// True once the poster has paid the chat-unlock commission.
    pub commission_deducted: bool,
    /// Earliest `created_at` among pending applications, if any.
    pub first_application_time: Option<DateTime<Utc>>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Allocation instant; set exactly when status leaves `Open`.
    pub accepted_at: Option<DateTime<Utc>>,
    /// Completion instant; set exactly when status is `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Validation failures for [`TaskDraft`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskValidationError {
    /// Price below the configured minimum.
    #[error("price {price} is below the minimum of {minimum}")]
    PriceBelowMinimum {
        /// Offered price.
        price: Decimal,
        /// Configured floor.
        minimum: Decimal,
    },
    /// Deadline not in the future.
    #[error("deadline must be after the creation time")]
    DeadlineNotInFuture,
    /// Window end precedes window start.
    #[error("time window end precedes its start")]
    WindowInverted,
    /// Priority outside [1, 5].
    #[error("priority level {0} is outside 1..=5")]
    PriorityOutOfRange(u8),
}

/// Unvalidated input for creating a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    /// Owning poster.
    pub poster_id: UserId,
    /// Short human-readable title.
    pub title: String,
    /// Work category.
    pub category: Category,
    /// Agreed gross price.
    pub price: Decimal,
    /// Hard completion deadline.
    pub deadline: DateTime<Utc>,
    /// Poster-declared urgency in [1, 5]; 3 is normal.
    pub priority_level: u8,
    /// Campus tag used for locality scoring.
    pub campus_location: Option<String>,
    /// Soft doer preference.
    pub preferred_doer: Option<UserId>,
    /// Preferred execution window start.
    pub time_window_start: Option<DateTime<Utc>>,
    /// Preferred execution window end.
    pub time_window_end: Option<DateTime<Utc>>,
    /// Whether execution outside the window is acceptable.
    pub flexible_timing: bool,
}

impl Task {
    /// Validate a draft into an open task created at `now`.
    pub fn new(
        draft: TaskDraft,
        minimum_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Self, TaskValidationError> {
        if draft.price < minimum_price {
            return Err(TaskValidationError::PriceBelowMinimum {
                price: draft.price,
                minimum: minimum_price,
            });
        }
        if draft.deadline <= now {
            return Err(TaskValidationError::DeadlineNotInFuture);
        }
        if let (Some(start), Some(end)) = (draft.time_window_start, draft.time_window_end) {
            if end < start {
                return Err(TaskValidationError::WindowInverted);
            }
        }
        if !(1..=5).contains(&draft.priority_level) {
            return Err(TaskValidationError::PriorityOutOfRange(draft.priority_level));
        }

        Ok(Self {
            id: TaskId::random(),
            poster_id: draft.poster_id,
            doer_id: None,
            title: draft.title,
            category: draft.category,
            price: draft.price,
            deadline: draft.deadline,
            status: TaskStatus::Open,
            priority_level: draft.priority_level,
            campus_location: draft.campus_location,
            preferred_doer: draft.preferred_doer,
            time_window_start: draft.time_window_start,
            time_window_end: draft.time_window_end,
            flexible_timing: draft.flexible_timing,
            commission_deducted: false,
            first_application_time: None,
            created_at: now,
            accepted_at: None,
            completed_at: None,
        })
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }
}
