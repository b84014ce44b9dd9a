//! Periodic sweep driver.
//!
//! Each sweep runs on its own cadence in its own tokio task. Concurrent
//! runs of one sweep coalesce to at most one in-flight instance, every run
//! executes under a hard time budget, and all sweeps are idempotent: state
//! guards and dedup windows make a doubled run a no-op.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::domain::allocation::AllocationService;
use crate::domain::auction::AuctionService;
use crate::domain::commission::CommissionService;
use crate::domain::config::CoreConfig;
use crate::domain::deadline_agent::DeadlineAgent;
use crate::domain::error::CoreResult;
use crate::domain::notifications::NotificationService;

/// One periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// Tiered deadline reminders.
    Reminders,
    /// Overdue escalation and expired-open handling.
    Overdue,
    /// Grace-period auto-deletion.
    AutoDelete,
    /// Auction resolution and push assignment.
    Auction,
    /// Gateway status refresh for stuck payments.
    Reconciliation,
    /// Notification retention pruning.
    Retention,
}

impl Sweep {
    /// Every sweep, in scheduling order.
    pub const ALL: [Self; 6] = [
        Self::Reminders,
        Self::Overdue,
        Self::AutoDelete,
        Self::Auction,
        Self::Reconciliation,
        Self::Retention,
    ];

    fn index(self) -> usize {
        match self {
            Self::Reminders => 0,
            Self::Overdue => 1,
            Self::AutoDelete => 2,
            Self::Auction => 3,
            Self::Reconciliation => 4,
            Self::Retention => 5,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Reminders => "deadline_reminders",
            Self::Overdue => "overdue_escalation",
            Self::AutoDelete => "auto_delete_expired",
            Self::Auction => "auction_resolver",
            Self::Reconciliation => "payment_reconciliation",
            Self::Retention => "notification_retention",
        }
    }
}

/// Sweep cadences and the per-run time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    /// Deadline reminder cadence.
    pub reminders: Duration,
    /// Overdue escalation cadence.
    pub overdue: Duration,
    /// Auto-delete cadence.
    pub auto_delete: Duration,
    /// Auction resolver cadence.
    pub auction: Duration,
    /// Payment reconciliation cadence.
    pub reconciliation: Duration,
    /// Notification retention cadence.
    pub retention: Duration,
    /// Hard budget for one run; a stuck sweep is abandoned and the next
    /// cadence retries from persistent state.
    pub budget: Duration,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            reminders: Duration::from_secs(2 * 60),
            overdue: Duration::from_secs(60 * 60),
            auto_delete: Duration::from_secs(60 * 60),
            auction: Duration::from_secs(60),
            reconciliation: Duration::from_secs(30 * 60),
            retention: Duration::from_secs(24 * 60 * 60),
            budget: Duration::from_secs(30 * 60),
        }
    }
}

/// What one guarded sweep run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The run finished; carries the number of entities it acted on.
    Completed(u32),
    /// Another run of the same sweep was in flight; this one was skipped.
    Coalesced,
    /// The run exceeded the budget and was abandoned.
    TimedOut,
    /// The run failed; the next cadence retries.
    Failed,
}

/// Owns the sweep loop tasks and dispatches each sweep to its service.
pub struct SweepDriver {
    auction: Arc<AuctionService>,
    allocation: Arc<AllocationService>,
    deadline: Arc<DeadlineAgent>,
    commission: Arc<CommissionService>,
    notifier: Arc<NotificationService>,
    config: CoreConfig,
    schedule: SweepSchedule,
    locks: [Mutex<()>; 6],
}

impl SweepDriver {
    /// Build the driver over the sweep services.
    pub fn new(
        auction: Arc<AuctionService>,
        allocation: Arc<AllocationService>,
        deadline: Arc<DeadlineAgent>,
        commission: Arc<CommissionService>,
        notifier: Arc<NotificationService>,
        config: CoreConfig,
        schedule: SweepSchedule,
    ) -> Self {
        Self {
            auction,
            allocation,
            deadline,
            commission,
            notifier,
            config,
            schedule,
            locks: Default::default(),
        }
    }

    /// Spawn one loop task per sweep. The handles live until aborted.
    pub fn spawn_all(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        Sweep::ALL
            .into_iter()
            .map(|sweep| {
                let driver = Arc::clone(self);
                tokio::spawn(async move { driver.run_loop(sweep).await })
            })
            .collect()
    }

    /// Run one sweep now, honouring coalescing and the time budget.
    pub async fn run_guarded(&self, sweep: Sweep) -> SweepOutcome {
        let Ok(_guard) = self.lock_for(sweep).try_lock() else {
            debug!(sweep = sweep.name(), "sweep already in flight; coalesced");
            return SweepOutcome::Coalesced;
        };

        match tokio::time::timeout(self.schedule.budget, self.run(sweep)).await {
            Err(_) => {
                warn!(sweep = sweep.name(), "sweep exceeded its budget; abandoned");
                SweepOutcome::TimedOut
            }
            Ok(Err(error)) => {
                warn!(sweep = sweep.name(), %error, "sweep failed");
                SweepOutcome::Failed
            }
            Ok(Ok(acted_on)) => {
                debug!(sweep = sweep.name(), acted_on, "sweep completed");
                SweepOutcome::Completed(acted_on)
            }
        }
    }

    async fn run_loop(&self, sweep: Sweep) {
        let mut interval = tokio::time::interval(self.period(sweep));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.run_guarded(sweep).await;
        }
    }

    async fn run(&self, sweep: Sweep) -> CoreResult<u32> {
        match sweep {
            Sweep::Reminders => self.deadline.run_reminders().await,
            Sweep::Overdue => self.deadline.run_overdue().await,
            Sweep::AutoDelete => self.deadline.run_auto_delete().await,
            Sweep::Auction => {
                let resolved = self.auction.resolve_due().await?;
                let pushed = self.allocation.push_due().await?;
                Ok(resolved + pushed)
            }
            Sweep::Reconciliation => self.commission.reconcile().await,
            Sweep::Retention => {
                let pruned = self
                    .notifier
                    .prune_expired(self.config.notification_retention())
                    .await?;
                Ok(u32::try_from(pruned).unwrap_or(u32::MAX))
            }
        }
    }

    fn period(&self, sweep: Sweep) -> Duration {
        match sweep {
            Sweep::Reminders => self.schedule.reminders,
            Sweep::Overdue => self.schedule.overdue,
            Sweep::AutoDelete => self.schedule.auto_delete,
            Sweep::Auction => self.schedule.auction,
            Sweep::Reconciliation => self.schedule.reconciliation,
            Sweep::Retention => self.schedule.retention,
        }
    }

    fn lock_for(&self, sweep: Sweep) -> &Mutex<()> {
        &self.locks[sweep.index()]
    }
}
