//! Port for task persistence and guarded status transitions.
//!
//! Transitions that touch more than one row (`assign`) are single port
//! operations so adapters can make them atomic: the open→in_progress
//! compare-and-set, the assignment audit row, and the winning application's
//! acceptance either all commit or none do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::application::ApplicationId;
use crate::domain::task::{Assignment, AssignmentMethod, Task, TaskId, TaskStatus};
use crate::domain::user::UserId;

use super::StoreError;

/// Command performing the atomic open→in_progress transition.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignTask {
    /// Task to allocate; must still be `Open`.
    pub task_id: TaskId,
    /// Chosen doer.
    pub doer_id: UserId,
    /// Winning application to mark accepted, when allocated by auction.
    pub application_id: Option<ApplicationId>,
    /// How the allocation was made.
    pub method: AssignmentMethod,
    /// Allocation instant, recorded as `accepted_at`.
    pub now: DateTime<Utc>,
}

/// Port for task persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Persist a new task. Fails with [`StoreError::Conflict`] on a
    /// duplicate id.
    async fn insert(&self, task: Task) -> Result<(), StoreError>;

    /// Find a task by id.
    async fn find(&self, task_id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Atomically allocate an open task to a doer.
    ///
    /// Compare-and-sets `status = Open`, sets `doer`/`accepted_at`, inserts
    /// the [`Assignment`] audit row, and marks the winning application
    /// accepted (losing applications are left pending). Fails with
    /// [`StoreError::Stale`] when the task is no longer open, so two
    /// concurrent resolvers produce exactly one winner.
    async fn assign(&self, command: AssignTask) -> Result<Task, StoreError>;

    /// Transition in_progress→completed, stamping `completed_at`.
    async fn complete(&self, task_id: TaskId, now: DateTime<Utc>) -> Result<Task, StoreError>;

    /// Transition any non-cancelled state to cancelled.
    async fn cancel(&self, task_id: TaskId, now: DateTime<Utc>) -> Result<Task, StoreError>;

    /// Transition open→expired for a task that was never allocated.
    async fn expire(&self, task_id: TaskId) -> Result<Task, StoreError>;

    /// Remove a task row entirely (grace-period auto-delete).
    async fn delete(&self, task_id: TaskId) -> Result<(), StoreError>;

    /// All open tasks.
    async fn list_open(&self) -> Result<Vec<Task>, StoreError>;

    /// Open tasks whose first pending application arrived at or before
    /// `first_applied_by` (i.e. whose auction window has elapsed).
    async fn list_auction_candidates(
        &self,
        first_applied_by: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError>;

    /// Open, applicant-less tasks at or above `min_priority` created at or
    /// before `created_by`.
    async fn list_push_candidates(
        &self,
        min_priority: u8,
        created_by: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError>;

    /// Tasks in `statuses` whose deadline falls in `(from, to]`.
    async fn list_with_deadline_between(
        &self,
        statuses: Vec<TaskStatus>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError>;

    /// Tasks in `statuses` whose deadline is strictly before `now`.
    async fn list_overdue(
        &self,
        statuses: Vec<TaskStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError>;

    /// Never-allocated tasks whose deadline is strictly before `cutoff`
    /// (grace-period deletion candidates).
    async fn list_unallocated_past_deadline(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError>;

    /// Number of completed tasks executed by `doer_id`.
    async fn completed_count(&self, doer_id: UserId) -> Result<u32, StoreError>;

    /// Assignment audit rows for a task, oldest first.
    async fn assignments_for_task(&self, task_id: TaskId) -> Result<Vec<Assignment>, StoreError>;
}
