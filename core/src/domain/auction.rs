//! Application auction: bounded-window bidding and winner selection.
//!
//! Doers apply freely while a task is open; the first application starts the
//! auction window. Once the window has elapsed the resolver picks the
//! highest-ranked application, where the ranking deliberately compensates
//! inexperienced doers (see [`Application::ranking_score`]).

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::application::{Application, ApplicationStatus};
use crate::domain::config::CoreConfig;
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::notification::NotificationKind;
use crate::domain::notifications::{EmitNotification, NotificationService};
use crate::domain::ports::{
    ApplicationRepository, AssignTask, NewApplication, TaskRepository, UserRepository,
};
use crate::domain::task::{AssignmentMethod, Task, TaskId, TaskStatus};
use crate::domain::user::{Role, UserId};

/// A doer's request to bid on a task.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitApplication {
    /// The task to bid on.
    pub task_id: TaskId,
    /// The bidding doer.
    pub doer_id: UserId,
    /// Why the doer is a good fit.
    pub cover_letter: String,
    /// When the doer proposes to finish.
    pub proposed_timeline: Option<String>,
}

/// Accepts applications and resolves auctions after the bounded window.
pub struct AuctionService {
    tasks: Arc<dyn TaskRepository>,
    applications: Arc<dyn ApplicationRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl AuctionService {
    /// Build the service over its ports.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        applications: Arc<dyn ApplicationRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Self {
        Self {
            tasks,
            applications,
            users,
            notifier,
            clock,
            config,
        }
    }

    /// Submit an application for an open task.
    ///
    /// The store stamps the doer's fairness snapshots and, for the first
    /// application, the task's auction-window start. A second application by
    /// the same doer fails with `ConstraintViolation` and leaves the
    /// existing row untouched.
    pub async fn submit(&self, request: SubmitApplication) -> CoreResult<Application> {
        let task = self.load_task(request.task_id).await?;
        if task.status != TaskStatus::Open {
            return Err(CoreError::stale_state(
                "task is no longer accepting applications",
            ));
        }

        let doer = self
            .users
            .find(request.doer_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no user {}", request.doer_id)))?;
        if doer.is_banned {
            return Err(CoreError::permission_denied("banned users cannot apply"));
        }
        if doer.role != Role::Doer {
            return Err(CoreError::permission_denied("only doers can apply to tasks"));
        }
        if task.poster_id == request.doer_id {
            return Err(CoreError::permission_denied(
                "posters cannot apply to their own task",
            ));
        }

        let application = self
            .applications
            .insert(NewApplication {
                task_id: request.task_id,
                doer_id: request.doer_id,
                cover_letter: request.cover_letter,
                proposed_timeline: request.proposed_timeline,
                now: self.clock.utc(),
            })
            .await?;

        info!(task = %task.id, doer = %request.doer_id, "application submitted");
        self.notifier
            .emit(EmitNotification::plain(
                task.poster_id,
                NotificationKind::ApplicationReceived,
                "New task application",
                format!("A doer applied for \"{}\".", task.title),
                Some(task.id),
            ))
            .await?;

        Ok(application)
    }

    /// Select the auction winner for a task, if its window has elapsed.
    ///
    /// Returns `Ok(None)` while the window is still open or no pending
    /// application exists. On success the task is atomically transitioned to
    /// in_progress with the winner as its doer; losing applications stay
    /// pending.
    pub async fn resolve(&self, task_id: TaskId) -> CoreResult<Option<Application>> {
        let task = self.load_task(task_id).await?;
        if task.status != TaskStatus::Open {
            return Err(CoreError::stale_state("task is no longer open"));
        }

        let pending = self.applications.list_pending_for_task(task_id).await?;
        let Some(window_started) = task
            .first_application_time
            .or_else(|| pending.iter().map(|a| a.created_at).min())
        else {
            return Ok(None);
        };

        let now = self.clock.utc();
        if now - window_started < self.config.auction_window() {
            return Ok(None);
        }

        let Some(winner) = self.pick_winner(&pending) else {
            return Ok(None);
        };
        let mut winner = winner.clone();

        let task = self
            .tasks
            .assign(AssignTask {
                task_id,
                doer_id: winner.doer_id,
                application_id: Some(winner.id),
                method: AssignmentMethod::Auction,
                now,
            })
            .await?;
        winner.status = ApplicationStatus::Accepted;

        info!(
            task = %task.id,
            doer = %winner.doer_id,
            score = %winner.ranking_score(&self.config),
            applicants = pending.len(),
            "auction resolved",
        );
        self.notifier
            .emit(EmitNotification::plain(
                winner.doer_id,
                NotificationKind::TaskAssigned,
                "You were chosen for a task",
                format!("Your application for \"{}\" was selected.", task.title),
                Some(task.id),
            ))
            .await?;

        Ok(Some(winner))
    }

    /// Withdraw a pending application while the task is still open.
    ///
    /// If the withdrawn bid was the earliest pending one, the store
    /// recomputes the task's auction-window start from the remaining bids.
    pub async fn withdraw(&self, task_id: TaskId, doer_id: UserId) -> CoreResult<Application> {
        let task = self.load_task(task_id).await?;
        if task.status != TaskStatus::Open {
            return Err(CoreError::stale_state("task is no longer open"));
        }

        let application = self.applications.withdraw(task_id, doer_id).await?;
        debug!(task = %task_id, doer = %doer_id, "application withdrawn");
        Ok(application)
    }

    /// Resolve every open task whose auction window has elapsed.
    ///
    /// Driven by the auction-resolver sweep. A task lost to a concurrent
    /// resolver is skipped; other failures are logged and do not abort the
    /// sweep. Returns the number of tasks allocated.
    pub async fn resolve_due(&self) -> CoreResult<u32> {
        let cutoff = self.clock.utc() - self.config.auction_window();
        let candidates = self.tasks.list_auction_candidates(cutoff).await?;

        let mut resolved = 0_u32;
        for task in candidates {
            match self.resolve(task.id).await {
                Ok(Some(_)) => resolved += 1,
                Ok(None) => {}
                Err(CoreError::StaleState { .. }) => {
                    debug!(task = %task.id, "auction already resolved elsewhere");
                }
                Err(error) => {
                    warn!(task = %task.id, %error, "auction resolution failed");
                }
            }
        }
        Ok(resolved)
    }

    fn pick_winner<'a>(&self, pending: &'a [Application]) -> Option<&'a Application> {
        pending.iter().max_by(|a, b| {
            a.ranking_score(&self.config)
                .cmp(&b.ranking_score(&self.config))
                // Earlier submission and smaller doer id win ties.
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.doer_id.cmp(&a.doer_id))
        })
    }

    async fn load_task(&self, task_id: TaskId) -> CoreResult<Task> {
        self.tasks
            .find(task_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no task {task_id}")))
    }
}

#[cfg(test)]
#[path = "auction_tests.rs"]
mod tests;
