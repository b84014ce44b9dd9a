//! Serializable in-memory entity store.
//!
//! Reference adapter for every repository port. All rows live behind one
//! mutex, so each port operation — including the multi-row transactions
//! (assign, settle, rating insert) — executes atomically and the
//! compare-and-set guards hold under concurrency. Unique keys are enforced
//! exactly as the relational schema would: one application per (task, doer),
//! one payment per (task, payer, receiver), globally unique gateway ids
//! across payments and commissions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::application::{Application, ApplicationId, ApplicationStatus};
use crate::domain::config::CoreConfig;
use crate::domain::money::round_half_even;
use crate::domain::notification::{Notification, NotificationId};
use crate::domain::payment::{
    CommissionStatus, Payment, PaymentId, PaymentStatus, SystemCommission, SystemWallet,
};
use crate::domain::ports::{
    ApplicationRepository, AssignTask, CommissionRepository, NewApplication, NewCommission,
    NewPayment, NotificationRepository, PaymentRepository, RatingRepository, SettleCommission,
    SettlementOutcome, StoreError, TaskRepository, UserRepository,
};
use crate::domain::rating::Rating;
use crate::domain::task::{Assignment, Task, TaskId, TaskStatus};
use crate::domain::user::{Role, User, UserId};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    tasks: HashMap<TaskId, Task>,
    applications: Vec<Application>,
    assignments: Vec<Assignment>,
    payments: Vec<Payment>,
    commissions: HashMap<TaskId, SystemCommission>,
    ratings: Vec<Rating>,
    notifications: Vec<Notification>,
    wallet: SystemWallet,
}

/// In-memory entity store.
pub struct MemoryStore {
    config: CoreConfig,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Build an empty store. The configuration supplies the newbie
    /// threshold stamped into application snapshots.
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Seed an application row directly, bypassing snapshotting.
    ///
    /// Test fixtures use this to stage auctions with prescribed snapshots.
    pub fn seed_application(&self, application: Application) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner
            .applications
            .iter()
            .any(|a| a.task_id == application.task_id && a.doer_id == application.doer_id)
        {
            return Err(StoreError::conflict("application already exists"));
        }
        if application.status == ApplicationStatus::Pending {
            if let Some(task) = inner.tasks.get_mut(&application.task_id) {
                let earliest = match task.first_application_time {
                    Some(existing) => existing.min(application.created_at),
                    None => application.created_at,
                };
                task.first_application_time = Some(earliest);
            }
        }
        inner.applications.push(application);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::unavailable("store mutex poisoned"))
    }
}

impl Inner {
    fn gateway_id_in_use(&self, gateway_id: &str) -> bool {
        self.payments
            .iter()
            .any(|p| p.gateway_payment_id.as_deref() == Some(gateway_id))
            || self
                .commissions
                .values()
                .any(|c| c.gateway_payment_id.as_deref() == Some(gateway_id))
    }

    fn pending_applications(&self, task_id: TaskId) -> impl Iterator<Item = &Application> {
        self.applications
            .iter()
            .filter(move |a| a.task_id == task_id && a.status == ApplicationStatus::Pending)
    }

    fn refresh_first_application_time(&mut self, task_id: TaskId) {
        let earliest = self.pending_applications(task_id).map(|a| a.created_at).min();
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.first_application_time = earliest;
        }
    }

    fn task_mut(&mut self, task_id: TaskId) -> Result<&mut Task, StoreError> {
        self.tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::missing(format!("task {task_id}")))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::conflict(format!("user {}", user.id)));
        }
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn find(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn list_active_doers(&self) -> Result<Vec<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.role == Role::Doer && !u.is_banned)
            .cloned()
            .collect())
    }

    async fn list_admins(&self) -> Result<Vec<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.role == Role::Admin && !u.is_banned)
            .cloned()
            .collect())
    }

    async fn set_rating_cache(
        &self,
        user_id: UserId,
        avg_rating: Decimal,
        total_ratings: u32,
    ) -> Result<User, StoreError> {
        let mut inner = self.lock()?;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::missing(format!("user {user_id}")))?;
        user.avg_rating = avg_rating;
        user.total_ratings = total_ratings;
        Ok(user.clone())
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn insert(&self, task: Task) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.tasks.contains_key(&task.id) {
            return Err(StoreError::conflict(format!("task {}", task.id)));
        }
        inner.tasks.insert(task.id, task);
        Ok(())
    }

    async fn find(&self, task_id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.lock()?.tasks.get(&task_id).cloned())
    }

    async fn assign(&self, command: AssignTask) -> Result<Task, StoreError> {
        let mut inner = self.lock()?;

        // Validate every precondition before touching any row, so a failed
        // compare-and-set leaves no side effects.
        let task = inner
            .tasks
            .get(&command.task_id)
            .ok_or_else(|| StoreError::missing(format!("task {}", command.task_id)))?;
        if task.status != TaskStatus::Open {
            return Err(StoreError::stale("task is not open"));
        }
        if inner
            .assignments
            .iter()
            .any(|a| a.task_id == command.task_id && a.doer_id == command.doer_id)
        {
            return Err(StoreError::conflict("assignment already exists"));
        }
        if let Some(application_id) = command.application_id {
            let application = inner
                .applications
                .iter()
                .find(|a| a.id == application_id && a.task_id == command.task_id)
                .ok_or_else(|| StoreError::missing(format!("application {application_id}")))?;
            if application.status != ApplicationStatus::Pending {
                return Err(StoreError::stale("application is not pending"));
            }
        }

        if let Some(application_id) = command.application_id {
            if let Some(application) = inner
                .applications
                .iter_mut()
                .find(|a| a.id == application_id)
            {
                application.status = ApplicationStatus::Accepted;
            }
        }
        let task = inner.task_mut(command.task_id)?;
        task.status = TaskStatus::InProgress;
        task.doer_id = Some(command.doer_id);
        task.accepted_at = Some(command.now);
        let snapshot = task.clone();

        inner.assignments.push(Assignment {
            task_id: command.task_id,
            doer_id: command.doer_id,
            method: command.method,
            assigned_at: command.now,
        });
        Ok(snapshot)
    }

    async fn complete(&self, task_id: TaskId, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let mut inner = self.lock()?;
        let task = inner.task_mut(task_id)?;
        if task.status != TaskStatus::InProgress {
            return Err(StoreError::stale("task is not in progress"));
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        Ok(task.clone())
    }

    async fn cancel(&self, task_id: TaskId, _now: DateTime<Utc>) -> Result<Task, StoreError> {
        let mut inner = self.lock()?;
        let task = inner.task_mut(task_id)?;
        if task.status == TaskStatus::Cancelled {
            return Err(StoreError::stale("task is already cancelled"));
        }
        task.status = TaskStatus::Cancelled;
        Ok(task.clone())
    }

    async fn expire(&self, task_id: TaskId) -> Result<Task, StoreError> {
        let mut inner = self.lock()?;
        let task = inner.task_mut(task_id)?;
        if task.status != TaskStatus::Open {
            return Err(StoreError::stale("task is not open"));
        }
        task.status = TaskStatus::Expired;
        Ok(task.clone())
    }

    async fn delete(&self, task_id: TaskId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.tasks.remove(&task_id).is_none() {
            return Err(StoreError::missing(format!("task {task_id}")));
        }
        inner.applications.retain(|a| a.task_id != task_id);
        inner.assignments.retain(|a| a.task_id != task_id);
        inner.commissions.remove(&task_id);
        Ok(())
    }

    async fn list_open(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Open)
            .cloned()
            .collect())
    }

    async fn list_auction_candidates(
        &self,
        first_applied_by: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Open
                    && t.first_application_time
                        .is_some_and(|first| first <= first_applied_by)
            })
            .cloned()
            .collect())
    }

    async fn list_push_candidates(
        &self,
        min_priority: u8,
        created_by: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Open
                    && t.priority_level >= min_priority
                    && t.created_at <= created_by
                    && inner.pending_applications(t.id).next().is_none()
            })
            .cloned()
            .collect())
    }

    async fn list_with_deadline_between(
        &self,
        statuses: Vec<TaskStatus>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|t| statuses.contains(&t.status) && t.deadline > from && t.deadline <= to)
            .cloned()
            .collect())
    }

    async fn list_overdue(
        &self,
        statuses: Vec<TaskStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|t| statuses.contains(&t.status) && t.deadline < now)
            .cloned()
            .collect())
    }

    async fn list_unallocated_past_deadline(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|t| {
                t.doer_id.is_none()
                    && matches!(t.status, TaskStatus::Open | TaskStatus::Expired)
                    && t.deadline < cutoff
            })
            .cloned()
            .collect())
    }

    async fn completed_count(&self, doer_id: UserId) -> Result<u32, StoreError> {
        let count = self
            .lock()?
            .tasks
            .values()
            .filter(|t| t.doer_id == Some(doer_id) && t.status == TaskStatus::Completed)
            .count();
        u32::try_from(count).map_err(|_| StoreError::unavailable("task count overflow"))
    }

    async fn assignments_for_task(&self, task_id: TaskId) -> Result<Vec<Assignment>, StoreError> {
        let mut assignments: Vec<Assignment> = self
            .lock()?
            .assignments
            .iter()
            .filter(|a| a.task_id == task_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.assigned_at);
        Ok(assignments)
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn insert(&self, command: NewApplication) -> Result<Application, StoreError> {
        let mut inner = self.lock()?;

        if inner
            .applications
            .iter()
            .any(|a| a.task_id == command.task_id && a.doer_id == command.doer_id)
        {
            return Err(StoreError::conflict("application already exists"));
        }
        let doer = inner
            .users
            .get(&command.doer_id)
            .ok_or_else(|| StoreError::missing(format!("user {}", command.doer_id)))?;
        let rating_snapshot = doer.avg_rating;

        let completed = inner
            .tasks
            .values()
            .filter(|t| t.doer_id == Some(command.doer_id) && t.status == TaskStatus::Completed)
            .count();
        let completed = u32::try_from(completed)
            .map_err(|_| StoreError::unavailable("task count overflow"))?;

        let had_pending = inner.pending_applications(command.task_id).next().is_some();
        let task = inner.task_mut(command.task_id)?;
        if task.status != TaskStatus::Open {
            return Err(StoreError::stale("task is not open"));
        }
        if !had_pending {
            task.first_application_time = Some(command.now);
        }

        let application = Application {
            id: ApplicationId::random(),
            task_id: command.task_id,
            doer_id: command.doer_id,
            cover_letter: command.cover_letter,
            proposed_timeline: command.proposed_timeline,
            status: ApplicationStatus::Pending,
            doer_rating_snapshot: rating_snapshot,
            doer_completed_tasks_snapshot: completed,
            doer_is_newbie: completed < self.config.newbie_threshold,
            created_at: command.now,
        };
        inner.applications.push(application.clone());
        Ok(application)
    }

    async fn find(
        &self,
        task_id: TaskId,
        doer_id: UserId,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .lock()?
            .applications
            .iter()
            .find(|a| a.task_id == task_id && a.doer_id == doer_id)
            .cloned())
    }

    async fn list_pending_for_task(&self, task_id: TaskId) -> Result<Vec<Application>, StoreError> {
        let mut pending: Vec<Application> =
            self.lock()?.pending_applications(task_id).cloned().collect();
        pending.sort_by_key(|a| a.created_at);
        Ok(pending)
    }

    async fn withdraw(&self, task_id: TaskId, doer_id: UserId) -> Result<Application, StoreError> {
        let mut inner = self.lock()?;
        let application = inner
            .applications
            .iter_mut()
            .find(|a| a.task_id == task_id && a.doer_id == doer_id)
            .ok_or_else(|| StoreError::missing("application"))?;
        if application.status != ApplicationStatus::Pending {
            return Err(StoreError::stale("application is not pending"));
        }
        application.status = ApplicationStatus::Withdrawn;
        let withdrawn = application.clone();
        inner.refresh_first_application_time(task_id);
        Ok(withdrawn)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert(&self, command: NewPayment) -> Result<Payment, StoreError> {
        let mut inner = self.lock()?;
        if inner.payments.iter().any(|p| {
            p.task_id == command.task_id
                && p.payer_id == command.payer_id
                && p.receiver_id == command.receiver_id
        }) {
            return Err(StoreError::conflict(
                "payment already exists for this task, payer, and receiver",
            ));
        }
        if let Some(gateway_id) = &command.gateway_payment_id {
            if inner.gateway_id_in_use(gateway_id) {
                return Err(StoreError::conflict(format!("gateway id {gateway_id}")));
            }
        }

        let payment = Payment {
            id: PaymentId::random(),
            task_id: command.task_id,
            payer_id: command.payer_id,
            receiver_id: command.receiver_id,
            amount: command.amount,
            commission_amount: command.commission_amount,
            net_amount: command.net_amount,
            method: command.method,
            status: command.status,
            gateway_payment_id: command.gateway_payment_id,
            reconcile_attempts: 0,
            created_at: command.now,
            confirmed_at: None,
        };
        inner.payments.push(payment.clone());
        Ok(payment)
    }

    async fn find(&self, payment_id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .lock()?
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned())
    }

    async fn find_by_gateway_id(
        &self,
        gateway_payment_id: String,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .lock()?
            .payments
            .iter()
            .find(|p| p.gateway_payment_id.as_deref() == Some(gateway_payment_id.as_str()))
            .cloned())
    }

    async fn list_for_task(&self, task_id: TaskId) -> Result<Vec<Payment>, StoreError> {
        let mut payments: Vec<Payment> = self
            .lock()?
            .payments
            .iter()
            .filter(|p| p.task_id == task_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn mark_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Payment, StoreError> {
        let mut inner = self.lock()?;
        let payment = inner
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| StoreError::missing(format!("payment {payment_id}")))?;
        payment.status = status;
        if status == PaymentStatus::Confirmed {
            payment.confirmed_at = Some(now);
        }
        Ok(payment.clone())
    }

    async fn attach_gateway_id(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: String,
    ) -> Result<Payment, StoreError> {
        let mut inner = self.lock()?;
        if inner.gateway_id_in_use(&gateway_payment_id) {
            return Err(StoreError::conflict(format!(
                "gateway id {gateway_payment_id}"
            )));
        }
        let payment = inner
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| StoreError::missing(format!("payment {payment_id}")))?;
        payment.gateway_payment_id = Some(gateway_payment_id);
        Ok(payment.clone())
    }

    async fn list_awaiting_reconciliation(
        &self,
        created_by: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .lock()?
            .payments
            .iter()
            .filter(|p| {
                matches!(
                    p.status,
                    PaymentStatus::Pending | PaymentStatus::PendingPayment
                ) && p.gateway_payment_id.is_some()
                    && p.created_at <= created_by
                    && p.reconcile_attempts < max_attempts
            })
            .cloned()
            .collect())
    }

    async fn record_reconcile_attempt(&self, payment_id: PaymentId) -> Result<Payment, StoreError> {
        let mut inner = self.lock()?;
        let payment = inner
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| StoreError::missing(format!("payment {payment_id}")))?;
        payment.reconcile_attempts += 1;
        Ok(payment.clone())
    }
}

#[async_trait]
impl CommissionRepository for MemoryStore {
    async fn create(&self, command: NewCommission) -> Result<SystemCommission, StoreError> {
        let mut inner = self.lock()?;
        if !inner.tasks.contains_key(&command.task_id) {
            return Err(StoreError::missing(format!("task {}", command.task_id)));
        }
        if inner.commissions.contains_key(&command.task_id) {
            return Err(StoreError::conflict("commission already exists for task"));
        }
        let commission = SystemCommission {
            task_id: command.task_id,
            payer_id: command.payer_id,
            amount: command.amount,
            method: command.method,
            status: CommissionStatus::Pending,
            gateway_payment_id: None,
            created_at: command.now,
            paid_at: None,
        };
        inner.commissions.insert(command.task_id, commission.clone());
        Ok(commission)
    }

    async fn find_for_task(&self, task_id: TaskId) -> Result<Option<SystemCommission>, StoreError> {
        Ok(self.lock()?.commissions.get(&task_id).cloned())
    }

    async fn find_by_gateway_id(
        &self,
        gateway_payment_id: String,
    ) -> Result<Option<SystemCommission>, StoreError> {
        Ok(self
            .lock()?
            .commissions
            .values()
            .find(|c| c.gateway_payment_id.as_deref() == Some(gateway_payment_id.as_str()))
            .cloned())
    }

    async fn attach_gateway_id(
        &self,
        task_id: TaskId,
        gateway_payment_id: String,
    ) -> Result<SystemCommission, StoreError> {
        let mut inner = self.lock()?;
        if inner.gateway_id_in_use(&gateway_payment_id) {
            return Err(StoreError::conflict(format!(
                "gateway id {gateway_payment_id}"
            )));
        }
        let commission = inner
            .commissions
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::missing(format!("commission for task {task_id}")))?;
        commission.gateway_payment_id = Some(gateway_payment_id);
        Ok(commission.clone())
    }

    async fn settle(&self, command: SettleCommission) -> Result<SettlementOutcome, StoreError> {
        let mut inner = self.lock()?;
        let commission = inner
            .commissions
            .get(&command.task_id)
            .ok_or_else(|| StoreError::missing(format!("commission for task {}", command.task_id)))?
            .clone();
        if commission.status == CommissionStatus::Paid {
            return Ok(SettlementOutcome::AlreadySettled(commission));
        }

        // All three rows move together: commission, task flag, wallet.
        let task = inner.task_mut(command.task_id)?;
        task.commission_deducted = true;

        let amount = commission.amount;
        inner.wallet.total_revenue += amount;
        inner.wallet.total_transactions += 1;

        let commission = inner
            .commissions
            .get_mut(&command.task_id)
            .ok_or_else(|| StoreError::missing(format!("commission for task {}", command.task_id)))?;
        commission.status = CommissionStatus::Paid;
        commission.paid_at = Some(command.now);
        if let Some(gateway_id) = command.gateway_payment_id {
            commission.gateway_payment_id = Some(gateway_id);
        }
        Ok(SettlementOutcome::Settled(commission.clone()))
    }

    async fn mark_failed(&self, task_id: TaskId) -> Result<SystemCommission, StoreError> {
        let mut inner = self.lock()?;
        let commission = inner
            .commissions
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::missing(format!("commission for task {task_id}")))?;
        if commission.status == CommissionStatus::Paid {
            return Err(StoreError::stale("commission already settled"));
        }
        commission.status = CommissionStatus::Failed;
        Ok(commission.clone())
    }

    async fn wallet(&self) -> Result<SystemWallet, StoreError> {
        Ok(self.lock()?.wallet.clone())
    }
}

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn insert(&self, rating: Rating) -> Result<Rating, StoreError> {
        let mut inner = self.lock()?;
        if inner.ratings.iter().any(|r| {
            r.task_id == rating.task_id
                && r.rater_id == rating.rater_id
                && r.rated_id == rating.rated_id
        }) {
            return Err(StoreError::conflict("rating already exists"));
        }

        // Rating row and cache update commit together.
        let user = inner
            .users
            .get_mut(&rating.rated_id)
            .ok_or_else(|| StoreError::missing(format!("user {}", rating.rated_id)))?;
        let total_score =
            user.avg_rating * Decimal::from(user.total_ratings) + Decimal::from(rating.score);
        user.total_ratings += 1;
        user.avg_rating = round_half_even(total_score / Decimal::from(user.total_ratings));

        inner.ratings.push(rating.clone());
        Ok(rating)
    }

    async fn list_for_rated(&self, rated_id: UserId) -> Result<Vec<Rating>, StoreError> {
        Ok(self
            .lock()?
            .ratings
            .iter()
            .filter(|r| r.rated_id == rated_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: Notification) -> Result<(), StoreError> {
        self.lock()?.notifications.push(notification);
        Ok(())
    }

    async fn last_emitted(
        &self,
        user_id: UserId,
        dedup_key: String,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && n.dedup_key.as_deref() == Some(dedup_key.as_str()))
            .map(|n| n.created_at)
            .max())
    }

    async fn count_unread(&self, user_id: UserId) -> Result<u64, StoreError> {
        let count = self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count();
        Ok(count as u64)
    }

    async fn list_recent(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut recent: Vec<Notification> = self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn mark_read(
        &self,
        user_id: UserId,
        ids: Vec<NotificationId>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let mut changed = 0_u64;
        for notification in inner
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read && ids.contains(&n.id))
        {
            notification.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let mut changed = 0_u64;
        for notification in inner
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.notifications.len();
        inner.notifications.retain(|n| n.created_at >= cutoff);
        Ok((before - inner.notifications.len()) as u64)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
