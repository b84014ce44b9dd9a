//! Deadline lifecycle: tiered reminders, overdue escalation, expiry, and
//! grace-period auto-deletion.
//!
//! Reminder tiers escalate as the deadline approaches; per-recipient
//! throttles keep each tier from spamming, and a task never receives a
//! lower-tier reminder after a higher tier has fired for the same deadline.

use std::sync::Arc;

use chrono::TimeDelta;
use mockable::Clock;
use tracing::{info, warn};

use crate::domain::config::CoreConfig;
use crate::domain::error::CoreResult;
use crate::domain::notification::NotificationKind;
use crate::domain::notifications::{EmitNotification, NotificationService};
use crate::domain::ports::{TaskRepository, UserRepository};
use crate::domain::task::{Task, TaskId, TaskStatus};
use crate::domain::user::UserId;

/// Reminder escalation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderTier {
    /// Due within 24 hours.
    Standard,
    /// Due within 2 hours.
    Urgent,
    /// Due within 20 minutes.
    Critical,
}

impl ReminderTier {
    /// Pick the tier for the remaining time, if any applies.
    pub fn for_remaining(remaining: TimeDelta) -> Option<Self> {
        if remaining <= TimeDelta::zero() {
            return None;
        }
        if remaining <= TimeDelta::minutes(20) {
            Some(Self::Critical)
        } else if remaining <= TimeDelta::hours(2) {
            Some(Self::Urgent)
        } else if remaining <= TimeDelta::hours(24) {
            Some(Self::Standard)
        } else {
            None
        }
    }

    /// Per-recipient repeat throttle for this tier.
    pub fn throttle(self) -> TimeDelta {
        match self {
            Self::Standard => TimeDelta::hours(24),
            Self::Urgent => TimeDelta::minutes(20),
            Self::Critical => TimeDelta::minutes(2),
        }
    }

    /// Tiers that outrank this one.
    fn higher(self) -> &'static [Self] {
        match self {
            Self::Standard => &[Self::Urgent, Self::Critical],
            Self::Urgent => &[Self::Critical],
            Self::Critical => &[],
        }
    }

    fn key_fragment(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Urgent => "urgent",
            Self::Critical => "critical",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Standard => "Task due tomorrow",
            Self::Urgent => "Task due soon",
            Self::Critical => "Task deadline imminent",
        }
    }
}

fn reminder_key(tier: ReminderTier, task_id: TaskId) -> String {
    format!("deadline:{}:{task_id}", tier.key_fragment())
}

/// Runs the deadline sweeps.
pub struct DeadlineAgent {
    tasks: Arc<dyn TaskRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl DeadlineAgent {
    /// Build the agent over its ports.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Self {
        Self {
            tasks,
            users,
            notifier,
            clock,
            config,
        }
    }

    /// Send tiered reminders for tasks approaching their deadline.
    ///
    /// Returns the number of reminder notifications emitted.
    pub async fn run_reminders(&self) -> CoreResult<u32> {
        let now = self.clock.utc();
        let due_soon = self
            .tasks
            .list_with_deadline_between(
                vec![TaskStatus::Open, TaskStatus::InProgress],
                now,
                now + TimeDelta::hours(24),
            )
            .await?;

        let mut emitted = 0_u32;
        for task in due_soon {
            let Some(tier) = ReminderTier::for_remaining(task.deadline - now) else {
                continue;
            };
            for recipient in self.recipients(&task) {
                if self.higher_tier_already_sent(recipient, tier, task.id).await? {
                    continue;
                }
                let sent = self
                    .notifier
                    .emit(
                        EmitNotification::plain(
                            recipient,
                            NotificationKind::DeadlineReminder,
                            tier.title(),
                            format!(
                                "\"{}\" is due at {}.",
                                task.title,
                                task.deadline.format("%Y-%m-%d %H:%M UTC"),
                            ),
                            Some(task.id),
                        )
                        .deduped(reminder_key(tier, task.id), Some(tier.throttle())),
                    )
                    .await?;
                if sent {
                    emitted += 1;
                }
            }
        }
        if emitted > 0 {
            info!(emitted, "sent deadline reminders");
        }
        Ok(emitted)
    }

    /// Escalate overdue tasks.
    ///
    /// Allocated tasks past their deadline notify the poster, the doer, and
    /// every admin, each exactly once. Open tasks past their deadline
    /// transition to `expired` and notify the poster once.
    pub async fn run_overdue(&self) -> CoreResult<u32> {
        let now = self.clock.utc();
        let mut handled = 0_u32;

        for task in self
            .tasks
            .list_overdue(vec![TaskStatus::InProgress], now)
            .await?
        {
            let mut recipients = self.recipients(&task);
            for admin in self.users.list_admins().await? {
                recipients.push(admin.id);
            }
            for recipient in recipients {
                self.notifier
                    .emit(
                        EmitNotification::plain(
                            recipient,
                            NotificationKind::TaskOverdue,
                            "Task overdue",
                            format!("\"{}\" has passed its deadline.", task.title),
                            Some(task.id),
                        )
                        .deduped(format!("overdue:{}", task.id), None),
                    )
                    .await?;
            }
            handled += 1;
        }

        for task in self.tasks.list_overdue(vec![TaskStatus::Open], now).await? {
            match self.tasks.expire(task.id).await {
                Ok(expired) => {
                    self.notifier
                        .emit(
                            EmitNotification::plain(
                                expired.poster_id,
                                NotificationKind::TaskExpired,
                                "Task expired",
                                format!(
                                    "\"{}\" passed its deadline without a doer.",
                                    expired.title
                                ),
                                Some(expired.id),
                            )
                            .deduped(format!("expired:{}", expired.id), None),
                        )
                        .await?;
                    handled += 1;
                }
                Err(error) => {
                    warn!(task = %task.id, %error, "could not expire overdue task");
                }
            }
        }

        Ok(handled)
    }

    /// Delete never-allocated tasks whose deadline is older than the grace
    /// period, notifying each poster.
    ///
    /// Cancelled and completed tasks are never touched. Returns the number
    /// of tasks deleted.
    pub async fn run_auto_delete(&self) -> CoreResult<u32> {
        let now = self.clock.utc();
        let cutoff = now - self.config.grace_period();
        let stale = self.tasks.list_unallocated_past_deadline(cutoff).await?;

        let mut deleted = 0_u32;
        for task in stale {
            if let Err(error) = self.tasks.delete(task.id).await {
                warn!(task = %task.id, %error, "auto-delete failed");
                continue;
            }
            info!(task = %task.id, "auto-deleted expired task");
            self.notifier
                .emit(EmitNotification::plain(
                    task.poster_id,
                    NotificationKind::TaskAutoDeleted,
                    "Task removed",
                    format!(
                        "\"{}\" was removed {} hours after its deadline passed.",
                        task.title,
                        self.config.grace_period().num_hours(),
                    ),
                    Some(task.id),
                ))
                .await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn higher_tier_already_sent(
        &self,
        recipient: UserId,
        tier: ReminderTier,
        task_id: TaskId,
    ) -> CoreResult<bool> {
        for higher in tier.higher() {
            if self
                .notifier
                .last_emitted(recipient, reminder_key(*higher, task_id))
                .await?
                .is_some()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn recipients(&self, task: &Task) -> Vec<UserId> {
        let mut recipients = vec![task.poster_id];
        if let Some(doer_id) = task.doer_id {
            recipients.push(doer_id);
        }
        recipients
    }
}

#[cfg(test)]
#[path = "deadline_agent_tests.rs"]
mod tests;
