//! Allocation state machine.
//!
//! Drives a task from `open` through allocation (auction win or push
//! assignment), completion, cancellation, and expiry. Every transition is
//! guarded; guard failures surface [`CoreError::StaleState`] and are never
//! retried automatically. The open→in_progress transition itself is a
//! compare-and-set inside the store, so concurrent resolvers and
//! push-assigners produce exactly one winner.

use std::sync::Arc;

use mockable::Clock;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::config::CoreConfig;
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::money::CommissionSplit;
use crate::domain::notification::NotificationKind;
use crate::domain::notifications::{EmitNotification, NotificationService};
use crate::domain::ports::{
    ApplicationRepository, AssignTask, CommissionRepository, NewCommission, TaskRepository,
    UserRepository,
};
use crate::domain::payment::PaymentMethod;
use crate::domain::prioritization::{self, DoerContext, ScoreBreakdown};
use crate::domain::task::{AssignmentMethod, Task, TaskDraft, TaskId, TaskStatus};
use crate::domain::user::{Role, User, UserId};

/// Drives task lifecycle transitions and push assignment.
pub struct AllocationService {
    tasks: Arc<dyn TaskRepository>,
    applications: Arc<dyn ApplicationRepository>,
    users: Arc<dyn UserRepository>,
    commissions: Arc<dyn CommissionRepository>,
    notifier: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl AllocationService {
    /// Build the service over its ports.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        applications: Arc<dyn ApplicationRepository>,
        users: Arc<dyn UserRepository>,
        commissions: Arc<dyn CommissionRepository>,
        notifier: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Self {
        Self {
            tasks,
            applications,
            users,
            commissions,
            notifier,
            clock,
            config,
        }
    }

    /// Create an open task and its pending commission record.
    pub async fn create_task(&self, draft: TaskDraft) -> CoreResult<Task> {
        let poster = self.load_user(draft.poster_id).await?;
        if poster.is_banned {
            return Err(CoreError::permission_denied("banned users cannot post tasks"));
        }
        if poster.role == Role::Doer {
            return Err(CoreError::permission_denied("doers cannot post tasks"));
        }

        let now = self.clock.utc();
        let task = Task::new(draft, self.config.minimum_price, now)
            .map_err(|err| CoreError::constraint_violation(err.to_string()))?;
        self.tasks.insert(task.clone()).await?;

        let split = CommissionSplit::of(task.price, self.config.commission_rate);
        self.commissions
            .create(NewCommission {
                task_id: task.id,
                payer_id: task.poster_id,
                amount: split.commission,
                method: PaymentMethod::Gateway,
                now,
            })
            .await?;

        info!(task = %task.id, poster = %task.poster_id, "task created");
        self.notifier
            .emit(EmitNotification::plain(
                task.poster_id,
                NotificationKind::SystemMessage,
                "Task created",
                format!(
                    "Task \"{}\" created. Chat unlocks once the commission is paid.",
                    task.title
                ),
                Some(task.id),
            ))
            .await?;

        Ok(task)
    }

    /// Mark a task completed.
    ///
    /// Only the assigned doer may complete, and only after the commission
    /// has settled. Completing an already-completed task is an idempotent
    /// success.
    pub async fn complete(&self, task_id: TaskId, caller: UserId) -> CoreResult<Task> {
        let task = self.load_task(task_id).await?;
        if task.status == TaskStatus::Completed {
            return Ok(task);
        }
        if task.status != TaskStatus::InProgress {
            return Err(CoreError::stale_state("task is not in progress"));
        }
        if task.doer_id != Some(caller) {
            return Err(CoreError::permission_denied(
                "only the assigned doer can complete a task",
            ));
        }
        let doer = self.load_user(caller).await?;
        if doer.is_banned {
            return Err(CoreError::permission_denied("banned users cannot complete tasks"));
        }
        if !task.commission_deducted {
            return Err(CoreError::stale_state(
                "commission must be settled before completion",
            ));
        }

        let completed = self.tasks.complete(task_id, self.clock.utc()).await?;
        info!(task = %task_id, doer = %caller, "task completed");
        self.notifier
            .emit(EmitNotification::plain(
                completed.poster_id,
                NotificationKind::TaskCompleted,
                "Task completed",
                format!("\"{}\" was marked completed by its doer.", completed.title),
                Some(task_id),
            ))
            .await?;
        Ok(completed)
    }

    /// Cancel a task. Permitted for its poster and for admins, from any
    /// state that is not already cancelled.
    pub async fn cancel(&self, task_id: TaskId, caller: UserId) -> CoreResult<Task> {
        let task = self.load_task(task_id).await?;
        let user = self.load_user(caller).await?;
        if user.is_banned {
            return Err(CoreError::permission_denied("banned users cannot cancel tasks"));
        }
        if user.role != Role::Admin && task.poster_id != caller {
            return Err(CoreError::permission_denied(
                "only the poster or an admin can cancel a task",
            ));
        }

        let cancelled = self.tasks.cancel(task_id, self.clock.utc()).await?;
        info!(task = %task_id, by = %caller, "task cancelled");
        if let Some(doer_id) = cancelled.doer_id {
            self.notifier
                .emit(EmitNotification::plain(
                    doer_id,
                    NotificationKind::SystemMessage,
                    "Task cancelled",
                    format!("\"{}\" was cancelled.", cancelled.title),
                    Some(task_id),
                ))
                .await?;
        }
        Ok(cancelled)
    }

    /// Push-assign an urgent, applicant-less task to the best-scoring doer.
    ///
    /// Returns `Ok(None)` when no eligible doer exists; the next sweep
    /// cadence retries.
    pub async fn push_assign(&self, task_id: TaskId) -> CoreResult<Option<Task>> {
        let task = self.load_task(task_id).await?;
        if task.status != TaskStatus::Open {
            return Err(CoreError::stale_state("task is no longer open"));
        }
        if task.priority_level < self.config.push_priority_threshold {
            return Err(CoreError::stale_state(
                "task priority is below the push threshold",
            ));
        }
        let now = self.clock.utc();
        if now - task.created_at <= self.config.push_staleness() {
            return Err(CoreError::stale_state("task is not yet stale enough to push"));
        }
        let pending = self.applications.list_pending_for_task(task_id).await?;
        if !pending.is_empty() {
            return Err(CoreError::stale_state(
                "task has applications; the auction resolves it",
            ));
        }

        let Some(doer) = self.best_push_candidate(&task, now).await? else {
            info!(task = %task_id, "no eligible doer for push assignment");
            return Ok(None);
        };

        let assigned = self
            .tasks
            .assign(AssignTask {
                task_id,
                doer_id: doer.id,
                application_id: None,
                method: AssignmentMethod::Push,
                now,
            })
            .await?;

        info!(task = %task_id, doer = %doer.id, "task push-assigned");
        self.notifier
            .emit(EmitNotification::plain(
                doer.id,
                NotificationKind::TaskAssigned,
                "Task assigned to you",
                format!("You have been assigned to \"{}\".", assigned.title),
                Some(task_id),
            ))
            .await?;
        Ok(Some(assigned))
    }

    /// Push-assign every eligible stale urgent task.
    ///
    /// Driven by the auction-resolver sweep after auction resolution.
    /// Returns the number of tasks allocated.
    pub async fn push_due(&self) -> CoreResult<u32> {
        let created_by = self.clock.utc() - self.config.push_staleness();
        let candidates = self
            .tasks
            .list_push_candidates(self.config.push_priority_threshold, created_by)
            .await?;

        let mut pushed = 0_u32;
        for task in candidates {
            match self.push_assign(task.id).await {
                Ok(Some(_)) => pushed += 1,
                Ok(None) => {}
                Err(CoreError::StaleState { .. }) => {}
                Err(error) => {
                    warn!(task = %task.id, %error, "push assignment failed");
                }
            }
        }
        Ok(pushed)
    }

    /// Open tasks ranked for a doer, best first.
    pub async fn ranked_open_tasks(
        &self,
        doer_id: UserId,
    ) -> CoreResult<Vec<(Task, ScoreBreakdown)>> {
        let doer = self.load_user(doer_id).await?;
        let context = DoerContext::from(&doer);
        let now = self.clock.utc();

        let mut scored = Vec::new();
        for task in self.tasks.list_open().await? {
            let poster_rating = self.poster_rating(task.poster_id).await?;
            let breakdown = prioritization::score(&task, &context, poster_rating, now);
            scored.push((task, breakdown));
        }
        Ok(prioritization::rank(scored))
    }

    /// Per-factor score breakdown of one task for one doer.
    pub async fn score_breakdown(
        &self,
        task_id: TaskId,
        doer_id: UserId,
    ) -> CoreResult<ScoreBreakdown> {
        let task = self.load_task(task_id).await?;
        let doer = self.load_user(doer_id).await?;
        let poster_rating = self.poster_rating(task.poster_id).await?;
        Ok(prioritization::score(
            &task,
            &DoerContext::from(&doer),
            poster_rating,
            self.clock.utc(),
        ))
    }

    async fn best_push_candidate(
        &self,
        task: &Task,
        now: chrono::DateTime<chrono::Utc>,
    ) -> CoreResult<Option<User>> {
        let poster_rating = self.poster_rating(task.poster_id).await?;
        let candidates = self.users.list_active_doers().await?;

        let mut best: Option<(Decimal, User)> = None;
        for candidate in candidates {
            if candidate.id == task.poster_id || !candidate.admits_category(task.category) {
                continue;
            }
            let breakdown =
                prioritization::score(task, &DoerContext::from(&candidate), poster_rating, now);
            let better = match &best {
                None => true,
                Some((best_score, best_user)) => {
                    breakdown.total > *best_score
                        || (breakdown.total == *best_score && candidate.id < best_user.id)
                }
            };
            if better {
                best = Some((breakdown.total, candidate));
            }
        }
        Ok(best.map(|(_, user)| user))
    }

    async fn poster_rating(&self, poster_id: UserId) -> CoreResult<Option<Decimal>> {
        Ok(self
            .users
            .find(poster_id)
            .await?
            .and_then(|poster| poster.rating()))
    }

    async fn load_task(&self, task_id: TaskId) -> CoreResult<Task> {
        self.tasks
            .find(task_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no task {task_id}")))
    }

    async fn load_user(&self, user_id: UserId) -> CoreResult<User> {
        self.users
            .find(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no user {user_id}")))
    }
}

#[cfg(test)]
#[path = "allocation_tests.rs"]
mod tests;
