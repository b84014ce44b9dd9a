//! Commission accounting and the chat gate.
//!
//! A task's chat stays locked until the poster settles the commission.
//! Settlement arrives either through a verified gateway webhook or through a
//! confirmed cash receipt, and is idempotent: replaying a webhook or
//! re-confirming a receipt changes nothing. Gross amounts always split into
//! net + commission exactly (see [`CommissionSplit`]).

use std::sync::Arc;

use chrono::TimeDelta;
use mockable::Clock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::config::CoreConfig;
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::money::CommissionSplit;
use crate::domain::notification::NotificationKind;
use crate::domain::notifications::{EmitNotification, NotificationService};
use crate::domain::payment::{Payment, PaymentId, PaymentMethod, PaymentStatus};
use crate::domain::ports::{
    CommissionRepository, CreateSourceRequest, GatewayIntentStatus, GatewaySource, NewPayment,
    PaymentGateway, PaymentRepository, SettleCommission, SettlementOutcome, TaskRepository,
    UserRepository,
};
use crate::domain::task::{Task, TaskId, TaskStatus};
use crate::domain::user::{Role, UserId};

/// Result of a chat-access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAccess {
    /// The user is neither the poster nor the doer of this task.
    NotAuthorized,
    /// The commission is unsettled; chat unlocks once `amount` is paid.
    PaymentRequired {
        /// Outstanding commission amount.
        amount: Decimal,
    },
    /// Messaging is permitted.
    Allowed,
}

impl ChatAccess {
    /// Whether messaging is permitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// What a verified webhook event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A commission settled and the wallet was credited.
    CommissionSettled,
    /// A task payment was confirmed.
    PaymentConfirmed,
    /// The event had already been processed; nothing changed.
    AlreadyProcessed,
    /// The gateway reported failure; the row was marked failed.
    MarkedFailed,
    /// The event references nothing this core tracks.
    Ignored,
}

/// A verified gateway webhook event.
///
/// Signature verification happens in the gateway adapter before this type
/// exists; the service trusts its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Gateway payment / source id.
    pub gateway_payment_id: String,
    /// Reported status.
    pub status: GatewayIntentStatus,
}

/// How long a gateway-routed payment may sit before reconciliation picks it
/// up.
fn reconcile_min_age() -> TimeDelta {
    TimeDelta::hours(1)
}

/// Commission settlement, payment recording, and the chat gate.
pub struct CommissionService {
    tasks: Arc<dyn TaskRepository>,
    payments: Arc<dyn PaymentRepository>,
    commissions: Arc<dyn CommissionRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<NotificationService>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl CommissionService {
    /// Build the service over its ports.
    #[expect(clippy::too_many_arguments, reason = "port bundle wiring")]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        payments: Arc<dyn PaymentRepository>,
        commissions: Arc<dyn CommissionRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<NotificationService>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Self {
        Self {
            tasks,
            payments,
            commissions,
            users,
            notifier,
            gateway,
            clock,
            config,
        }
    }

    /// Whether `user_id` may use the chat of `task_id`.
    ///
    /// Messaging is restricted to the poster and the doer, and locked until
    /// the commission settles.
    pub async fn check_chat_access(
        &self,
        task_id: TaskId,
        user_id: UserId,
    ) -> CoreResult<ChatAccess> {
        let task = self.load_task(task_id).await?;
        let participant = task.poster_id == user_id || task.doer_id == Some(user_id);
        if !participant {
            return Ok(ChatAccess::NotAuthorized);
        }
        if !task.commission_deducted {
            return Ok(ChatAccess::PaymentRequired {
                amount: self.commission_amount(&task),
            });
        }
        Ok(ChatAccess::Allowed)
    }

    /// Create a gateway checkout for the commission and remember its source
    /// id for webhook correlation.
    pub async fn initiate_commission_checkout(
        &self,
        task_id: TaskId,
        caller: UserId,
        source_type: String,
        redirect_success: String,
        redirect_failed: String,
    ) -> CoreResult<GatewaySource> {
        let task = self.load_task(task_id).await?;
        self.ensure_acting_poster(&task, caller).await?;
        if task.commission_deducted {
            return Err(CoreError::stale_state("commission is already settled"));
        }
        let commission = self
            .commissions
            .find_for_task(task_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no commission for task {task_id}")))?;

        let source = self
            .gateway
            .create_source(CreateSourceRequest {
                amount_centavos: to_centavos(commission.amount)?,
                currency: "PHP".to_owned(),
                source_type,
                description: format!("Commission for task {task_id}"),
                redirect_success,
                redirect_failed,
            })
            .await
            .map_err(|err| CoreError::external_unavailable(err.to_string()))?;

        self.commissions
            .attach_gateway_id(task_id, source.id.clone())
            .await?;
        info!(task = %task_id, source = %source.id, "commission checkout created");
        Ok(source)
    }

    /// Apply a verified gateway webhook event.
    ///
    /// Idempotent for any replay count: a `gateway_payment_id` that already
    /// settled reports [`WebhookOutcome::AlreadyProcessed`] and changes no
    /// state.
    pub async fn handle_webhook(&self, event: WebhookEvent) -> CoreResult<WebhookOutcome> {
        match event.status {
            GatewayIntentStatus::Succeeded => self.apply_success(&event.gateway_payment_id).await,
            GatewayIntentStatus::Failed => self.apply_failure(&event.gateway_payment_id).await,
            GatewayIntentStatus::Pending | GatewayIntentStatus::Unknown => {
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Settle a task's commission.
    ///
    /// On first settlement: marks the commission paid, unlocks chat,
    /// credits the wallet, and notifies poster and doer. Re-settling is a
    /// no-op reporting the existing state.
    pub async fn settle_commission(
        &self,
        task_id: TaskId,
        gateway_payment_id: Option<String>,
    ) -> CoreResult<SettlementOutcome> {
        let outcome = self
            .commissions
            .settle(SettleCommission {
                task_id,
                gateway_payment_id,
                now: self.clock.utc(),
            })
            .await?;

        if let SettlementOutcome::Settled(commission) = &outcome {
            info!(task = %task_id, amount = %commission.amount, "commission settled");
            let task = self.load_task(task_id).await?;
            let mut recipients = vec![task.poster_id];
            recipients.extend(task.doer_id);
            for recipient in recipients {
                self.notifier
                    .emit(
                        EmitNotification::plain(
                            recipient,
                            NotificationKind::CommissionPaid,
                            "Commission paid",
                            format!("Chat is now unlocked for \"{}\".", task.title),
                            Some(task_id),
                        )
                        .deduped(format!("commission-paid:{task_id}"), None),
                    )
                    .await?;
            }
        }
        Ok(outcome)
    }

    /// Poster confirms the commission was handed over in cash.
    pub async fn confirm_cod_commission(
        &self,
        task_id: TaskId,
        caller: UserId,
    ) -> CoreResult<SettlementOutcome> {
        let task = self.load_task(task_id).await?;
        self.ensure_acting_poster(&task, caller).await?;
        self.settle_commission(task_id, None).await
    }

    /// Record the completion payment for an in-progress task.
    ///
    /// COD payments await manual confirmation; gateway payments await the
    /// webhook or reconciliation. The split is computed here so the
    /// invariant `amount == commission + net` holds on the stored row.
    pub async fn record_completion_payment(
        &self,
        task_id: TaskId,
        caller: UserId,
        method: PaymentMethod,
    ) -> CoreResult<Payment> {
        let task = self.load_task(task_id).await?;
        self.ensure_acting_poster(&task, caller).await?;
        if task.status != TaskStatus::InProgress {
            return Err(CoreError::stale_state("task is not in progress"));
        }
        let receiver = task
            .doer_id
            .ok_or_else(|| CoreError::stale_state("task has no doer to pay"))?;

        let split = CommissionSplit::of(task.price, self.config.commission_rate);
        let status = match method {
            PaymentMethod::Cod => PaymentStatus::PendingConfirmation,
            _ => PaymentStatus::PendingPayment,
        };
        let payment = self
            .payments
            .insert(NewPayment {
                task_id,
                payer_id: task.poster_id,
                receiver_id: receiver,
                amount: split.gross,
                commission_amount: split.commission,
                net_amount: split.net,
                method,
                status,
                gateway_payment_id: None,
                now: self.clock.utc(),
            })
            .await?;

        info!(task = %task_id, payment = %payment.id, ?method, "completion payment recorded");
        self.notifier
            .emit(EmitNotification::plain(
                receiver,
                NotificationKind::SystemMessage,
                "Payment on its way",
                format!("The poster initiated payment for \"{}\".", task.title),
                Some(task_id),
            ))
            .await?;
        Ok(payment)
    }

    /// Create a gateway checkout for a pending completion payment.
    pub async fn initiate_payment_checkout(
        &self,
        payment_id: PaymentId,
        caller: UserId,
        source_type: String,
        redirect_success: String,
        redirect_failed: String,
    ) -> CoreResult<GatewaySource> {
        let payment = self.load_payment(payment_id).await?;
        if payment.payer_id != caller {
            return Err(CoreError::permission_denied("only the payer can open checkout"));
        }
        self.ensure_not_banned(caller).await?;
        if payment.status != PaymentStatus::PendingPayment {
            return Err(CoreError::stale_state("payment is not awaiting the gateway"));
        }

        let source = self
            .gateway
            .create_source(CreateSourceRequest {
                amount_centavos: to_centavos(payment.amount)?,
                currency: "PHP".to_owned(),
                source_type,
                description: format!("Task payment {payment_id}"),
                redirect_success,
                redirect_failed,
            })
            .await
            .map_err(|err| CoreError::external_unavailable(err.to_string()))?;

        self.payments
            .attach_gateway_id(payment_id, source.id.clone())
            .await?;
        Ok(source)
    }

    /// Payer confirms a COD payment was handed over.
    ///
    /// Re-confirming an already-confirmed payment is an idempotent success.
    pub async fn confirm_cod_payment(
        &self,
        payment_id: PaymentId,
        caller: UserId,
    ) -> CoreResult<Payment> {
        let payment = self.load_payment(payment_id).await?;
        if payment.payer_id != caller {
            return Err(CoreError::permission_denied("only the payer can confirm receipt"));
        }
        if payment.status == PaymentStatus::Confirmed {
            return Ok(payment);
        }
        self.ensure_not_banned(caller).await?;
        if payment.method != PaymentMethod::Cod {
            return Err(CoreError::stale_state("payment is not cash on delivery"));
        }
        if payment.status != PaymentStatus::PendingConfirmation {
            return Err(CoreError::stale_state("payment is not awaiting confirmation"));
        }

        let confirmed = self
            .payments
            .mark_status(payment_id, PaymentStatus::Confirmed, self.clock.utc())
            .await?;
        self.notify_payment_confirmed(&confirmed).await?;
        Ok(confirmed)
    }

    /// Refresh stuck gateway payments against the gateway.
    ///
    /// Only payments older than an hour are polled, each a bounded number
    /// of times; status advances only on a confirmed gateway answer.
    /// Returns the number of payments whose status moved.
    pub async fn reconcile(&self) -> CoreResult<u32> {
        let now = self.clock.utc();
        let stuck = self
            .payments
            .list_awaiting_reconciliation(now - reconcile_min_age(), self.config.reconcile_max_attempts)
            .await?;

        let mut advanced = 0_u32;
        for payment in stuck {
            let Some(gateway_id) = payment.gateway_payment_id.clone() else {
                continue;
            };
            self.payments.record_reconcile_attempt(payment.id).await?;

            let intent = match self.gateway.retrieve_intent(gateway_id).await {
                Ok(intent) => intent,
                Err(error) => {
                    warn!(payment = %payment.id, %error, "reconciliation probe failed");
                    continue;
                }
            };
            match intent.status {
                GatewayIntentStatus::Succeeded => {
                    let confirmed = self
                        .payments
                        .mark_status(payment.id, PaymentStatus::Confirmed, self.clock.utc())
                        .await?;
                    self.notify_payment_confirmed(&confirmed).await?;
                    advanced += 1;
                }
                GatewayIntentStatus::Failed => {
                    self.payments
                        .mark_status(payment.id, PaymentStatus::Failed, self.clock.utc())
                        .await?;
                    advanced += 1;
                }
                GatewayIntentStatus::Pending | GatewayIntentStatus::Unknown => {}
            }
        }
        if advanced > 0 {
            info!(advanced, "payment reconciliation advanced payments");
        }
        Ok(advanced)
    }

    async fn apply_success(&self, gateway_id: &str) -> CoreResult<WebhookOutcome> {
        if let Some(commission) = self
            .commissions
            .find_by_gateway_id(gateway_id.to_owned())
            .await?
        {
            let outcome = self
                .settle_commission(commission.task_id, Some(gateway_id.to_owned()))
                .await?;
            return Ok(match outcome {
                SettlementOutcome::Settled(_) => WebhookOutcome::CommissionSettled,
                SettlementOutcome::AlreadySettled(_) => WebhookOutcome::AlreadyProcessed,
            });
        }

        if let Some(payment) = self
            .payments
            .find_by_gateway_id(gateway_id.to_owned())
            .await?
        {
            if payment.status == PaymentStatus::Confirmed {
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
            let confirmed = self
                .payments
                .mark_status(payment.id, PaymentStatus::Confirmed, self.clock.utc())
                .await?;
            self.notify_payment_confirmed(&confirmed).await?;
            return Ok(WebhookOutcome::PaymentConfirmed);
        }

        Ok(WebhookOutcome::Ignored)
    }

    async fn apply_failure(&self, gateway_id: &str) -> CoreResult<WebhookOutcome> {
        if let Some(commission) = self
            .commissions
            .find_by_gateway_id(gateway_id.to_owned())
            .await?
        {
            self.commissions.mark_failed(commission.task_id).await?;
            return Ok(WebhookOutcome::MarkedFailed);
        }
        if let Some(payment) = self
            .payments
            .find_by_gateway_id(gateway_id.to_owned())
            .await?
        {
            if payment.status == PaymentStatus::Confirmed {
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
            self.payments
                .mark_status(payment.id, PaymentStatus::Failed, self.clock.utc())
                .await?;
            return Ok(WebhookOutcome::MarkedFailed);
        }
        Ok(WebhookOutcome::Ignored)
    }

    async fn notify_payment_confirmed(&self, payment: &Payment) -> CoreResult<()> {
        self.notifier
            .emit(
                EmitNotification::plain(
                    payment.receiver_id,
                    NotificationKind::PaymentConfirmed,
                    "Payment confirmed",
                    format!("A payment of {} was confirmed.", payment.net_amount),
                    Some(payment.task_id),
                )
                .deduped(format!("payment-confirmed:{}", payment.id), None),
            )
            .await?;
        Ok(())
    }

    fn commission_amount(&self, task: &Task) -> Decimal {
        CommissionSplit::of(task.price, self.config.commission_rate).commission
    }

    async fn ensure_acting_poster(&self, task: &Task, caller: UserId) -> CoreResult<()> {
        let user = self
            .users
            .find(caller)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no user {caller}")))?;
        if user.is_banned {
            return Err(CoreError::permission_denied("banned users cannot act on tasks"));
        }
        if user.role != Role::Admin && task.poster_id != caller {
            return Err(CoreError::permission_denied(
                "only the poster can act on this task's payments",
            ));
        }
        Ok(())
    }

    async fn ensure_not_banned(&self, caller: UserId) -> CoreResult<()> {
        let user = self
            .users
            .find(caller)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no user {caller}")))?;
        if user.is_banned {
            return Err(CoreError::permission_denied("banned users cannot act on payments"));
        }
        Ok(())
    }

    async fn load_task(&self, task_id: TaskId) -> CoreResult<Task> {
        self.tasks
            .find(task_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no task {task_id}")))
    }

    async fn load_payment(&self, payment_id: PaymentId) -> CoreResult<Payment> {
        self.payments
            .find(payment_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no payment {payment_id}")))
    }
}

fn to_centavos(amount: Decimal) -> CoreResult<i64> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| CoreError::constraint_violation("amount overflows the gateway unit"))
}

#[cfg(test)]
#[path = "commission_tests.rs"]
mod tests;
