//! Tests for the in-memory entity store.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rust_decimal_macros::dec;

use super::*;
use crate::domain::payment::PaymentMethod;
use crate::domain::task::{AssignmentMethod, Category, TaskDraft};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid")
}

fn store() -> MemoryStore {
    MemoryStore::new(CoreConfig::default())
}

fn user(role: Role) -> User {
    User {
        id: UserId::random(),
        role,
        doer_type: Some(crate::domain::user::DoerType::Both),
        avg_rating: dec!(0),
        total_ratings: 0,
        campus_location: None,
        is_banned: false,
    }
}

async fn seeded_task(store: &MemoryStore, poster_id: UserId, now: DateTime<Utc>) -> Task {
    let task = Task::new(
        TaskDraft {
            poster_id,
            title: "Collect exam permits".to_owned(),
            category: Category::Microtask,
            price: dec!(150),
            deadline: now + TimeDelta::hours(24),
            priority_level: 3,
            campus_location: None,
            preferred_doer: None,
            time_window_start: None,
            time_window_end: None,
            flexible_timing: false,
        },
        dec!(10),
        now,
    )
    .expect("valid task");
    TaskRepository::insert(store, task.clone())
        .await
        .expect("task inserted");
    task
}

#[tokio::test]
async fn application_insert_stamps_snapshots_and_window_start() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let mut doer = user(Role::Doer);
    doer.avg_rating = dec!(4.5);
    doer.total_ratings = 3;
    let doer_id = doer.id;
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, doer).await.expect("doer");
    let task = seeded_task(&store, poster.id, now).await;

    let application = ApplicationRepository::insert(
        &store,
        NewApplication {
            task_id: task.id,
            doer_id,
            cover_letter: "on it".to_owned(),
            proposed_timeline: None,
            now,
        },
    )
    .await
    .expect("application inserted");

    assert_eq!(application.doer_rating_snapshot, dec!(4.5));
    assert_eq!(application.doer_completed_tasks_snapshot, 0);
    assert!(application.doer_is_newbie);

    let stamped = TaskRepository::find(&store, task.id)
        .await
        .expect("find succeeds")
        .expect("task exists");
    assert_eq!(stamped.first_application_time, Some(now));
}

#[tokio::test]
async fn duplicate_application_is_a_conflict() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let doer = user(Role::Doer);
    let doer_id = doer.id;
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, doer).await.expect("doer");
    let task = seeded_task(&store, poster.id, now).await;

    let command = NewApplication {
        task_id: task.id,
        doer_id,
        cover_letter: String::new(),
        proposed_timeline: None,
        now,
    };
    ApplicationRepository::insert(&store, command.clone())
        .await
        .expect("first insert");
    let error = ApplicationRepository::insert(&store, command)
        .await
        .expect_err("second insert conflicts");
    assert!(matches!(error, StoreError::Conflict { .. }));
}

#[tokio::test]
async fn second_application_keeps_the_window_start() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let first_doer = user(Role::Doer);
    let second_doer = user(Role::Doer);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, first_doer.clone()).await.expect("doer 1");
    UserRepository::insert(&store, second_doer.clone()).await.expect("doer 2");
    let task = seeded_task(&store, poster.id, now).await;

    ApplicationRepository::insert(
        &store,
        NewApplication {
            task_id: task.id,
            doer_id: first_doer.id,
            cover_letter: String::new(),
            proposed_timeline: None,
            now,
        },
    )
    .await
    .expect("first application");
    ApplicationRepository::insert(
        &store,
        NewApplication {
            task_id: task.id,
            doer_id: second_doer.id,
            cover_letter: String::new(),
            proposed_timeline: None,
            now: now + TimeDelta::seconds(45),
        },
    )
    .await
    .expect("second application");

    let stamped = TaskRepository::find(&store, task.id)
        .await
        .expect("find succeeds")
        .expect("task exists");
    assert_eq!(stamped.first_application_time, Some(now));
}

#[tokio::test]
async fn withdrawing_the_earliest_pending_recomputes_the_window_start() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let first_doer = user(Role::Doer);
    let second_doer = user(Role::Doer);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, first_doer.clone()).await.expect("doer 1");
    UserRepository::insert(&store, second_doer.clone()).await.expect("doer 2");
    let task = seeded_task(&store, poster.id, now).await;

    for (doer_id, at) in [
        (first_doer.id, now),
        (second_doer.id, now + TimeDelta::seconds(30)),
    ] {
        ApplicationRepository::insert(
            &store,
            NewApplication {
                task_id: task.id,
                doer_id,
                cover_letter: String::new(),
                proposed_timeline: None,
                now: at,
            },
        )
        .await
        .expect("application inserted");
    }

    ApplicationRepository::withdraw(&store, task.id, first_doer.id)
        .await
        .expect("withdraw succeeds");
    let stamped = TaskRepository::find(&store, task.id)
        .await
        .expect("find succeeds")
        .expect("task exists");
    assert_eq!(
        stamped.first_application_time,
        Some(now + TimeDelta::seconds(30))
    );

    ApplicationRepository::withdraw(&store, task.id, second_doer.id)
        .await
        .expect("withdraw succeeds");
    let stamped = TaskRepository::find(&store, task.id)
        .await
        .expect("find succeeds")
        .expect("task exists");
    assert_eq!(stamped.first_application_time, None);
}

#[tokio::test]
async fn assign_is_a_compare_and_set_on_open() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let doer = user(Role::Doer);
    let rival = user(Role::Doer);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, doer.clone()).await.expect("doer");
    UserRepository::insert(&store, rival.clone()).await.expect("rival");
    let task = seeded_task(&store, poster.id, now).await;

    let assigned = TaskRepository::assign(
        &store,
        AssignTask {
            task_id: task.id,
            doer_id: doer.id,
            application_id: None,
            method: AssignmentMethod::Push,
            now,
        },
    )
    .await
    .expect("first assign wins");
    assert_eq!(assigned.status, TaskStatus::InProgress);
    assert_eq!(assigned.doer_id, Some(doer.id));
    assert_eq!(assigned.accepted_at, Some(now));

    // A concurrent resolver arriving second loses the compare-and-set.
    let error = TaskRepository::assign(
        &store,
        AssignTask {
            task_id: task.id,
            doer_id: rival.id,
            application_id: None,
            method: AssignmentMethod::Auction,
            now,
        },
    )
    .await
    .expect_err("second assign loses");
    assert!(matches!(error, StoreError::Stale { .. }));

    let audit = TaskRepository::assignments_for_task(&store, task.id)
        .await
        .expect("audit listed");
    assert_eq!(audit.len(), 1);
}

#[tokio::test]
async fn payment_triple_and_gateway_id_are_unique() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let doer = user(Role::Doer);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, doer.clone()).await.expect("doer");
    let task = seeded_task(&store, poster.id, now).await;

    let command = NewPayment {
        task_id: task.id,
        payer_id: poster.id,
        receiver_id: doer.id,
        amount: dec!(150),
        commission_amount: dec!(15.00),
        net_amount: dec!(135.00),
        method: PaymentMethod::Gcash,
        status: PaymentStatus::PendingPayment,
        gateway_payment_id: Some("g1".to_owned()),
        now,
    };
    PaymentRepository::insert(&store, command.clone())
        .await
        .expect("payment inserted");

    let error = PaymentRepository::insert(&store, command.clone())
        .await
        .expect_err("duplicate triple conflicts");
    assert!(matches!(error, StoreError::Conflict { .. }));

    // Same gateway id on a different triple still conflicts.
    let mut other = command;
    other.receiver_id = poster.id;
    other.payer_id = doer.id;
    let error = PaymentRepository::insert(&store, other)
        .await
        .expect_err("gateway id is globally unique");
    assert!(matches!(error, StoreError::Conflict { .. }));
}

#[tokio::test]
async fn settle_credits_the_wallet_exactly_once() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    let task = seeded_task(&store, poster.id, now).await;

    CommissionRepository::create(
        &store,
        NewCommission {
            task_id: task.id,
            payer_id: poster.id,
            amount: dec!(15.00),
            method: PaymentMethod::Gateway,
            now,
        },
    )
    .await
    .expect("commission created");

    let first = CommissionRepository::settle(
        &store,
        SettleCommission {
            task_id: task.id,
            gateway_payment_id: Some("g1".to_owned()),
            now,
        },
    )
    .await
    .expect("settle succeeds");
    assert!(matches!(first, SettlementOutcome::Settled(_)));

    let second = CommissionRepository::settle(
        &store,
        SettleCommission {
            task_id: task.id,
            gateway_payment_id: Some("g1".to_owned()),
            now: now + TimeDelta::minutes(1),
        },
    )
    .await
    .expect("replay succeeds");
    assert!(matches!(second, SettlementOutcome::AlreadySettled(_)));

    let wallet = CommissionRepository::wallet(&store).await.expect("wallet");
    assert_eq!(wallet.total_revenue, dec!(15.00));
    assert_eq!(wallet.total_transactions, 1);

    let task = TaskRepository::find(&store, task.id)
        .await
        .expect("find succeeds")
        .expect("task exists");
    assert!(task.commission_deducted);
}

#[tokio::test]
async fn rating_insert_updates_the_cache_transactionally() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let doer = user(Role::Doer);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, doer.clone()).await.expect("doer");
    let task = seeded_task(&store, poster.id, now).await;

    for (score, expected_avg, expected_total) in
        [(8, dec!(8.00), 1_u32), (7, dec!(7.50), 2), (9, dec!(8.00), 3)]
    {
        let rating = Rating::new(
            if expected_total == 1 {
                task.id
            } else {
                // Distinct tasks keep the (task, rater, rated) key unique.
                TaskId::random()
            },
            poster.id,
            doer.id,
            score,
            None,
            now,
        )
        .expect("valid rating");
        RatingRepository::insert(&store, rating).await.expect("rating inserted");

        let cached = UserRepository::find(&store, doer.id)
            .await
            .expect("find succeeds")
            .expect("doer exists");
        assert_eq!(cached.avg_rating, expected_avg);
        assert_eq!(cached.total_ratings, expected_total);
    }

    // Invariant: avg x total equals the sum of scores, within rounding.
    let ratings = RatingRepository::list_for_rated(&store, doer.id)
        .await
        .expect("list succeeds");
    let sum: i64 = ratings.iter().map(|r| i64::from(r.score)).sum();
    let cached = UserRepository::find(&store, doer.id)
        .await
        .expect("find succeeds")
        .expect("doer exists");
    assert_eq!(
        cached.avg_rating * Decimal::from(cached.total_ratings),
        Decimal::from(sum)
    );
}

#[tokio::test]
async fn duplicate_rating_triple_is_a_conflict() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let doer = user(Role::Doer);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, doer.clone()).await.expect("doer");
    let task = seeded_task(&store, poster.id, now).await;

    let rating = Rating::new(task.id, poster.id, doer.id, 8, None, now).expect("valid rating");
    RatingRepository::insert(&store, rating.clone())
        .await
        .expect("first insert");
    let error = RatingRepository::insert(&store, rating)
        .await
        .expect_err("duplicate conflicts");
    assert!(matches!(error, StoreError::Conflict { .. }));
}

#[tokio::test]
async fn delete_cascades_applications_and_commission() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let doer = user(Role::Doer);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, doer.clone()).await.expect("doer");
    let task = seeded_task(&store, poster.id, now).await;

    ApplicationRepository::insert(
        &store,
        NewApplication {
            task_id: task.id,
            doer_id: doer.id,
            cover_letter: String::new(),
            proposed_timeline: None,
            now,
        },
    )
    .await
    .expect("application inserted");
    CommissionRepository::create(
        &store,
        NewCommission {
            task_id: task.id,
            payer_id: poster.id,
            amount: dec!(15.00),
            method: PaymentMethod::Gateway,
            now,
        },
    )
    .await
    .expect("commission created");

    TaskRepository::delete(&store, task.id).await.expect("deleted");

    assert!(TaskRepository::find(&store, task.id)
        .await
        .expect("find succeeds")
        .is_none());
    assert!(ApplicationRepository::find(&store, task.id, doer.id)
        .await
        .expect("find succeeds")
        .is_none());
    assert!(CommissionRepository::find_for_task(&store, task.id)
        .await
        .expect("find succeeds")
        .is_none());
}

#[tokio::test]
async fn notification_lifecycle_counts_and_prunes() {
    let now = fixed_now();
    let store = store();
    let recipient = UserId::random();

    for age_days in [0_i64, 10, 40] {
        NotificationRepository::insert(
            &store,
            Notification {
                id: NotificationId::random(),
                user_id: recipient,
                kind: crate::domain::notification::NotificationKind::SystemMessage,
                title: "hello".to_owned(),
                body: String::new(),
                related_task: None,
                dedup_key: None,
                is_read: false,
                created_at: now - TimeDelta::days(age_days),
            },
        )
        .await
        .expect("notification inserted");
    }

    assert_eq!(
        NotificationRepository::count_unread(&store, recipient)
            .await
            .expect("count succeeds"),
        3
    );

    let pruned = NotificationRepository::prune_older_than(&store, now - TimeDelta::days(30))
        .await
        .expect("prune succeeds");
    assert_eq!(pruned, 1);

    let changed = NotificationRepository::mark_all_read(&store, recipient)
        .await
        .expect("mark succeeds");
    assert_eq!(changed, 2);
    assert_eq!(
        NotificationRepository::count_unread(&store, recipient)
            .await
            .expect("count succeeds"),
        0
    );
}

#[tokio::test]
async fn push_candidates_require_priority_staleness_and_no_pending_bids() {
    let now = fixed_now();
    let store = store();
    let poster = user(Role::Poster);
    let doer = user(Role::Doer);
    UserRepository::insert(&store, poster.clone()).await.expect("poster");
    UserRepository::insert(&store, doer.clone()).await.expect("doer");

    let mut urgent = seeded_task(&store, poster.id, now).await;
    urgent.priority_level = 5;
    urgent.created_at = now - TimeDelta::minutes(15);
    // Reinsert with the adjusted fields.
    TaskRepository::delete(&store, urgent.id).await.expect("deleted");
    TaskRepository::insert(&store, urgent.clone()).await.expect("reinserted");

    let candidates = TaskRepository::list_push_candidates(&store, 4, now - TimeDelta::minutes(10))
        .await
        .expect("list succeeds");
    assert_eq!(candidates.len(), 1);

    // A pending application disqualifies the task.
    ApplicationRepository::insert(
        &store,
        NewApplication {
            task_id: urgent.id,
            doer_id: doer.id,
            cover_letter: String::new(),
            proposed_timeline: None,
            now,
        },
    )
    .await
    .expect("application inserted");
    let candidates = TaskRepository::list_push_candidates(&store, 4, now - TimeDelta::minutes(10))
        .await
        .expect("list succeeds");
    assert!(candidates.is_empty());
}
