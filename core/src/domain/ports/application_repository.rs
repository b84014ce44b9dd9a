//! Port for application persistence.
//!
//! Insertion stamps the doer's fairness snapshots and the task's
//! `first_application_time` in the same transaction as the row itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::application::Application;
use crate::domain::task::TaskId;
use crate::domain::user::UserId;

use super::StoreError;

/// Command inserting a new application.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    /// The task applied to; must still be open.
    pub task_id: TaskId,
    /// The applying doer.
    pub doer_id: UserId,
    /// Why the doer is a good fit.
    pub cover_letter: String,
    /// When the doer proposes to finish.
    pub proposed_timeline: Option<String>,
    /// Submission instant.
    pub now: DateTime<Utc>,
}

/// Port for application persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Insert an application.
    ///
    /// Atomically with the row: snapshot the doer's current rating,
    /// completed-task count, and newbie flag, and stamp the task's
    /// `first_application_time` when this is its first pending application.
    /// Fails with [`StoreError::Conflict`] when the doer already applied to
    /// this task.
    async fn insert(&self, command: NewApplication) -> Result<Application, StoreError>;

    /// Find the application of `doer_id` for `task_id`.
    async fn find(
        &self,
        task_id: TaskId,
        doer_id: UserId,
    ) -> Result<Option<Application>, StoreError>;

    /// Pending applications for a task, oldest first.
    async fn list_pending_for_task(&self, task_id: TaskId) -> Result<Vec<Application>, StoreError>;

    /// Withdraw a pending application.
    ///
    /// Recomputes the task's `first_application_time` as the earliest
    /// remaining pending application (or clears it) in the same transaction.
    /// Fails with [`StoreError::Stale`] when the application is not pending.
    async fn withdraw(&self, task_id: TaskId, doer_id: UserId) -> Result<Application, StoreError>;
}
