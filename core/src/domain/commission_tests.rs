//! Tests for commission settlement and the chat gate.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;

use super::*;
use crate::domain::payment::{CommissionStatus, SystemCommission};
use crate::domain::ports::{
    MockCommissionRepository, MockNotificationRepository, MockPaymentGateway,
    MockPaymentRepository, MockTaskRepository, MockUserRepository,
};
use crate::domain::task::{Category, TaskDraft};
use crate::domain::user::User;
use crate::test_support::MutableClock;

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid")
}

fn in_progress_task(price: Decimal, now: DateTime<Utc>) -> Task {
    let mut task = Task::new(
        TaskDraft {
            poster_id: UserId::random(),
            title: "Encode survey results".to_owned(),
            category: Category::Typing,
            price,
            deadline: now + chrono::TimeDelta::hours(24),
            priority_level: 3,
            campus_location: None,
            preferred_doer: None,
            time_window_start: None,
            time_window_end: None,
            flexible_timing: false,
        },
        dec!(10),
        now - chrono::TimeDelta::hours(1),
    )
    .expect("valid task");
    task.status = TaskStatus::InProgress;
    task.doer_id = Some(UserId::random());
    task.accepted_at = Some(now - chrono::TimeDelta::minutes(30));
    task
}

fn commission_row(task: &Task, status: CommissionStatus) -> SystemCommission {
    SystemCommission {
        task_id: task.id,
        payer_id: task.poster_id,
        amount: dec!(10.00),
        method: PaymentMethod::Gateway,
        status,
        gateway_payment_id: Some("g1".to_owned()),
        created_at: task.created_at,
        paid_at: None,
    }
}

struct Fixture {
    tasks: MockTaskRepository,
    payments: MockPaymentRepository,
    commissions: MockCommissionRepository,
    users: MockUserRepository,
    notifications: MockNotificationRepository,
    gateway: MockPaymentGateway,
    clock: std::sync::Arc<MutableClock>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            tasks: MockTaskRepository::new(),
            payments: MockPaymentRepository::new(),
            commissions: MockCommissionRepository::new(),
            users: MockUserRepository::new(),
            notifications: MockNotificationRepository::new(),
            gateway: MockPaymentGateway::new(),
            clock: std::sync::Arc::new(MutableClock::new(fixed_now())),
        }
    }

    fn allow_notifications(&mut self) {
        self.notifications.expect_insert().returning(|_| Ok(()));
        self.notifications
            .expect_last_emitted()
            .returning(|_, _| Ok(None));
    }

    fn service(self) -> CommissionService {
        let notifier = Arc::new(NotificationService::new(
            Arc::new(self.notifications),
            self.clock.clone(),
        ));
        CommissionService::new(
            Arc::new(self.tasks),
            Arc::new(self.payments),
            Arc::new(self.commissions),
            Arc::new(self.users),
            notifier,
            Arc::new(self.gateway),
            self.clock,
            CoreConfig::default(),
        )
    }
}

/// Chat gate: outsider, unpaid participant, and paid participant.
#[tokio::test]
async fn chat_access_follows_the_gate() {
    let now = fixed_now();
    let task = in_progress_task(dec!(100), now);
    let poster_id = task.poster_id;
    let task_id = task.id;

    let mut fixture = Fixture::new();
    let found = task.clone();
    fixture
        .tasks
        .expect_find()
        .returning(move |_| Ok(Some(found.clone())));

    let service = fixture.service();

    let outsider = service
        .check_chat_access(task_id, UserId::random())
        .await
        .expect("check succeeds");
    assert_eq!(outsider, ChatAccess::NotAuthorized);

    let unpaid = service
        .check_chat_access(task_id, poster_id)
        .await
        .expect("check succeeds");
    assert_eq!(
        unpaid,
        ChatAccess::PaymentRequired {
            amount: dec!(10.00)
        }
    );
    assert!(!unpaid.is_allowed());
}

#[tokio::test]
async fn chat_access_allows_participants_after_settlement() {
    let now = fixed_now();
    let mut task = in_progress_task(dec!(100), now);
    task.commission_deducted = true;
    let doer_id = task.doer_id.expect("doer set");
    let task_id = task.id;

    let mut fixture = Fixture::new();
    fixture
        .tasks
        .expect_find()
        .return_once(move |_| Ok(Some(task)));

    let service = fixture.service();
    let access = service
        .check_chat_access(task_id, doer_id)
        .await
        .expect("check succeeds");
    assert!(access.is_allowed());
}

/// A succeeded webhook settles the commission and notifies both parties;
/// replaying it is a no-op.
#[tokio::test]
async fn webhook_settlement_is_idempotent() {
    let now = fixed_now();
    let task = in_progress_task(dec!(100), now);
    let task_id = task.id;
    let poster_id = task.poster_id;
    let doer_id = task.doer_id.expect("doer set");

    let mut fixture = Fixture::new();
    let pending = commission_row(&task, CommissionStatus::Pending);
    let paid = SystemCommission {
        status: CommissionStatus::Paid,
        paid_at: Some(now),
        ..pending.clone()
    };

    // First delivery settles; the second finds the commission already paid.
    let mut deliveries = 0_u32;
    let pending_for_find = pending.clone();
    fixture
        .commissions
        .expect_find_by_gateway_id()
        .returning(move |_| Ok(Some(pending_for_find.clone())));
    let paid_for_settle = paid.clone();
    fixture
        .commissions
        .expect_settle()
        .times(2)
        .returning(move |command| {
            assert_eq!(command.task_id, task_id);
            assert_eq!(command.gateway_payment_id.as_deref(), Some("g1"));
            deliveries += 1;
            if deliveries == 1 {
                Ok(SettlementOutcome::Settled(paid_for_settle.clone()))
            } else {
                Ok(SettlementOutcome::AlreadySettled(paid_for_settle.clone()))
            }
        });
    let found = task.clone();
    fixture
        .tasks
        .expect_find()
        .returning(move |_| Ok(Some(found.clone())));
    fixture
        .notifications
        .expect_last_emitted()
        .returning(|_, _| Ok(None));
    let mut recipients = Vec::new();
    fixture
        .notifications
        .expect_insert()
        .withf(|n| n.kind == NotificationKind::CommissionPaid)
        .times(2)
        .returning(move |n| {
            recipients.push(n.user_id);
            Ok(())
        });

    let service = fixture.service();
    let event = WebhookEvent {
        gateway_payment_id: "g1".to_owned(),
        status: GatewayIntentStatus::Succeeded,
    };

    let first = service
        .handle_webhook(event.clone())
        .await
        .expect("webhook succeeds");
    assert_eq!(first, WebhookOutcome::CommissionSettled);

    let second = service
        .handle_webhook(event)
        .await
        .expect("replay succeeds");
    assert_eq!(second, WebhookOutcome::AlreadyProcessed);
    let _ = (poster_id, doer_id);
}

#[tokio::test]
async fn webhook_for_unknown_id_is_ignored() {
    let mut fixture = Fixture::new();
    fixture
        .commissions
        .expect_find_by_gateway_id()
        .return_once(|_| Ok(None));
    fixture
        .payments
        .expect_find_by_gateway_id()
        .return_once(|_| Ok(None));

    let service = fixture.service();
    let outcome = service
        .handle_webhook(WebhookEvent {
            gateway_payment_id: "unknown".to_owned(),
            status: GatewayIntentStatus::Succeeded,
        })
        .await
        .expect("webhook succeeds");
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn failed_webhook_marks_the_commission_failed() {
    let now = fixed_now();
    let task = in_progress_task(dec!(100), now);
    let task_id = task.id;

    let mut fixture = Fixture::new();
    let pending = commission_row(&task, CommissionStatus::Pending);
    fixture
        .commissions
        .expect_find_by_gateway_id()
        .return_once(move |_| Ok(Some(pending)));
    fixture
        .commissions
        .expect_mark_failed()
        .withf(move |id| *id == task_id)
        .times(1)
        .return_once(move |_| Ok(commission_row(&in_progress_task(dec!(100), fixed_now()), CommissionStatus::Failed)));

    let service = fixture.service();
    let outcome = service
        .handle_webhook(WebhookEvent {
            gateway_payment_id: "g1".to_owned(),
            status: GatewayIntentStatus::Failed,
        })
        .await
        .expect("webhook succeeds");
    assert_eq!(outcome, WebhookOutcome::MarkedFailed);
}

#[tokio::test]
async fn record_completion_payment_splits_exactly() {
    let now = fixed_now();
    let task = in_progress_task(dec!(333.33), now);
    let poster_id = task.poster_id;
    let doer_id = task.doer_id.expect("doer set");
    let task_id = task.id;

    let mut fixture = Fixture::new();
    let found = task.clone();
    fixture
        .tasks
        .expect_find()
        .return_once(move |_| Ok(Some(found)));
    fixture.users.expect_find().return_once(move |_| {
        Ok(Some(User {
            id: poster_id,
            role: Role::Poster,
            doer_type: None,
            avg_rating: dec!(0),
            total_ratings: 0,
            campus_location: None,
            is_banned: false,
        }))
    });
    fixture
        .payments
        .expect_insert()
        .withf(move |command| {
            command.amount == dec!(333.33)
                && command.commission_amount == dec!(33.33)
                && command.net_amount == dec!(300.00)
                && command.amount == command.commission_amount + command.net_amount
                && command.status == PaymentStatus::PendingConfirmation
                && command.receiver_id == doer_id
        })
        .times(1)
        .return_once(move |command| {
            Ok(Payment {
                id: PaymentId::random(),
                task_id: command.task_id,
                payer_id: command.payer_id,
                receiver_id: command.receiver_id,
                amount: command.amount,
                commission_amount: command.commission_amount,
                net_amount: command.net_amount,
                method: command.method,
                status: command.status,
                gateway_payment_id: None,
                reconcile_attempts: 0,
                created_at: command.now,
                confirmed_at: None,
            })
        });
    fixture.allow_notifications();

    let service = fixture.service();
    let payment = service
        .record_completion_payment(task_id, poster_id, PaymentMethod::Cod)
        .await
        .expect("payment recorded");
    assert_eq!(payment.amount, payment.commission_amount + payment.net_amount);
}

#[tokio::test]
async fn reconcile_confirms_succeeded_intents_only() {
    let now = fixed_now();
    let task = in_progress_task(dec!(100), now);
    let doer_id = task.doer_id.expect("doer set");

    let stuck = Payment {
        id: PaymentId::random(),
        task_id: task.id,
        payer_id: task.poster_id,
        receiver_id: doer_id,
        amount: dec!(100),
        commission_amount: dec!(10.00),
        net_amount: dec!(90.00),
        method: PaymentMethod::Gcash,
        status: PaymentStatus::PendingPayment,
        gateway_payment_id: Some("g-stuck".to_owned()),
        reconcile_attempts: 1,
        created_at: now - chrono::TimeDelta::hours(2),
        confirmed_at: None,
    };
    let stuck_id = stuck.id;

    let mut fixture = Fixture::new();
    let listed = stuck.clone();
    fixture
        .payments
        .expect_list_awaiting_reconciliation()
        .return_once(move |_, _| Ok(vec![listed]));
    let attempted = stuck.clone();
    fixture
        .payments
        .expect_record_reconcile_attempt()
        .times(1)
        .return_once(move |_| Ok(attempted));
    fixture
        .gateway
        .expect_retrieve_intent()
        .withf(|id| id == "g-stuck")
        .times(1)
        .return_once(|id| {
            Ok(crate::domain::ports::GatewayIntent {
                id,
                status: GatewayIntentStatus::Succeeded,
                amount_centavos: 10_000,
                currency: "PHP".to_owned(),
            })
        });
    fixture
        .payments
        .expect_mark_status()
        .withf(move |id, status, _| *id == stuck_id && *status == PaymentStatus::Confirmed)
        .times(1)
        .return_once(move |_, status, confirmed_at| {
            let mut confirmed = stuck;
            confirmed.status = status;
            confirmed.confirmed_at = Some(confirmed_at);
            Ok(confirmed)
        });
    fixture.allow_notifications();

    let service = fixture.service();
    let advanced = service.reconcile().await.expect("reconcile succeeds");
    assert_eq!(advanced, 1);
}

#[tokio::test]
async fn reconcile_leaves_rows_alone_when_the_gateway_is_down() {
    let now = fixed_now();
    let task = in_progress_task(dec!(100), now);

    let stuck = Payment {
        id: PaymentId::random(),
        task_id: task.id,
        payer_id: task.poster_id,
        receiver_id: task.doer_id.expect("doer set"),
        amount: dec!(100),
        commission_amount: dec!(10.00),
        net_amount: dec!(90.00),
        method: PaymentMethod::Gcash,
        status: PaymentStatus::PendingPayment,
        gateway_payment_id: Some("g-down".to_owned()),
        reconcile_attempts: 0,
        created_at: now - chrono::TimeDelta::hours(2),
        confirmed_at: None,
    };

    let mut fixture = Fixture::new();
    let listed = stuck.clone();
    fixture
        .payments
        .expect_list_awaiting_reconciliation()
        .return_once(move |_, _| Ok(vec![listed]));
    fixture
        .payments
        .expect_record_reconcile_attempt()
        .return_once(move |_| Ok(stuck));
    fixture
        .gateway
        .expect_retrieve_intent()
        .return_once(|_| Err(crate::domain::ports::GatewayError::unavailable("timeout")));
    fixture.payments.expect_mark_status().times(0);

    let service = fixture.service();
    let advanced = service.reconcile().await.expect("reconcile tolerates outages");
    assert_eq!(advanced, 0);
}

#[tokio::test]
async fn confirm_cod_payment_is_idempotent() {
    let now = fixed_now();
    let task = in_progress_task(dec!(100), now);
    let poster_id = task.poster_id;

    let confirmed = Payment {
        id: PaymentId::random(),
        task_id: task.id,
        payer_id: poster_id,
        receiver_id: task.doer_id.expect("doer set"),
        amount: dec!(100),
        commission_amount: dec!(10.00),
        net_amount: dec!(90.00),
        method: PaymentMethod::Cod,
        status: PaymentStatus::Confirmed,
        gateway_payment_id: None,
        reconcile_attempts: 0,
        created_at: now - chrono::TimeDelta::hours(1),
        confirmed_at: Some(now - chrono::TimeDelta::minutes(30)),
    };
    let payment_id = confirmed.id;

    let mut fixture = Fixture::new();
    fixture
        .payments
        .expect_find()
        .return_once(move |_| Ok(Some(confirmed)));
    fixture.payments.expect_mark_status().times(0);

    let service = fixture.service();
    let outcome = service
        .confirm_cod_payment(payment_id, poster_id)
        .await
        .expect("repeat confirmation succeeds");
    assert_eq!(outcome.status, PaymentStatus::Confirmed);
}
