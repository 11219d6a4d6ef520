mod support;

use payment_service::domain::payment::PaymentStatus;
use payment_service::gateways::mock::MockBehavior;
use payment_service::gateways::StatusInquiry;
use payment_service::service::polling::PollTarget;
use payment_service::store::PaymentStore;
use std::time::Duration;
use support::{harness_with_limits, seed_processing_payment};
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn poll_success_settles_payment_and_drops_job() {
    let h = harness_with_limits(
        MockBehavior::AlwaysSuccess,
        Duration::from_millis(100),
        60,
        Duration::from_secs(900),
    );
    let payment = seed_processing_payment(&h.store, "TXN1", "PAY-A1-1").await;
    h.scheduler.start(
        h.engine.clone(),
        PollTarget {
            payment_id: payment.id,
            subject_id: "A1".to_string(),
            transaction_id: "TXN1".to_string(),
            reference_id: "PAY-A1-1".to_string(),
        },
    );

    tokio::time::sleep(Duration::from_secs(1)).await;

    let settled = h.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Paid);
    assert_eq!(h.gateway.status_calls(), 1);
    assert!(!h.scheduler.has_job(payment.id));
    // settling from inside the job must not abort it before fan-out runs
    assert_eq!(h.broadcaster.count("payment.completed"), 1);
    assert_eq!(h.publisher.count("payment.completed"), 1);
}

#[tokio::test(start_paused = true)]
async fn poll_failure_cancels_payment() {
    let h = harness_with_limits(
        MockBehavior::AlwaysFailure,
        Duration::from_millis(100),
        60,
        Duration::from_secs(900),
    );
    let payment = seed_processing_payment(&h.store, "TXN2", "PAY-A1-2").await;
    h.scheduler.start(
        h.engine.clone(),
        PollTarget {
            payment_id: payment.id,
            subject_id: "A1".to_string(),
            transaction_id: "TXN2".to_string(),
            reference_id: "PAY-A1-2".to_string(),
        },
    );

    tokio::time::sleep(Duration::from_secs(1)).await;

    let settled = h.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Cancelled);
    assert!(!h.scheduler.has_job(payment.id));
    assert_eq!(h.broadcaster.count("payment.failed"), 1);
}

#[tokio::test(start_paused = true)]
async fn attempt_ceiling_abandons_job_but_not_payment() {
    let h = harness_with_limits(
        MockBehavior::AlwaysPending,
        Duration::from_secs(1),
        3,
        Duration::from_secs(900),
    );
    let payment = seed_processing_payment(&h.store, "TXN3", "PAY-A1-3").await;
    h.scheduler.start(
        h.engine.clone(),
        PollTarget {
            payment_id: payment.id,
            subject_id: "A1".to_string(),
            transaction_id: "TXN3".to_string(),
            reference_id: "PAY-A1-3".to_string(),
        },
    );

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.gateway.status_calls(), 3);
    assert!(!h.scheduler.has_job(payment.id));

    // abandoned, not cancelled: a late webhook can still resolve it
    let stuck = h.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(stuck.status, PaymentStatus::Processing);
    assert_eq!(h.broadcaster.count("payment.failed"), 0);
}

#[tokio::test(start_paused = true)]
async fn duration_ceiling_abandons_job() {
    let h = harness_with_limits(
        MockBehavior::AlwaysPending,
        Duration::from_secs(1),
        100,
        Duration::from_millis(2500),
    );
    let payment = seed_processing_payment(&h.store, "TXN4", "PAY-A1-4").await;
    h.scheduler.start(
        h.engine.clone(),
        PollTarget {
            payment_id: payment.id,
            subject_id: "A1".to_string(),
            transaction_id: "TXN4".to_string(),
            reference_id: "PAY-A1-4".to_string(),
        },
    );

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.gateway.status_calls(), 2);
    assert!(!h.scheduler.has_job(payment.id));
    let stuck = h.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(stuck.status, PaymentStatus::Processing);
}

#[tokio::test(start_paused = true)]
async fn transient_gateway_errors_consume_attempts_without_settling() {
    let h = harness_with_limits(
        MockBehavior::Unavailable,
        Duration::from_secs(1),
        2,
        Duration::from_secs(900),
    );
    let payment = seed_processing_payment(&h.store, "TXN5", "PAY-A1-5").await;
    h.scheduler.start(
        h.engine.clone(),
        PollTarget {
            payment_id: payment.id,
            subject_id: "A1".to_string(),
            transaction_id: "TXN5".to_string(),
            reference_id: "PAY-A1-5".to_string(),
        },
    );

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.gateway.status_calls(), 2);
    let untouched = h.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, PaymentStatus::Processing);
}

#[tokio::test(start_paused = true)]
async fn scripted_pending_then_success_resolves_on_the_later_tick() {
    let h = harness_with_limits(
        MockBehavior::Scripted,
        Duration::from_secs(1),
        60,
        Duration::from_secs(900),
    );
    h.gateway.push_status(StatusInquiry {
        status: Some("PENDING".to_string()),
        ..Default::default()
    });
    h.gateway.push_status(StatusInquiry {
        status: Some("PENDING".to_string()),
        ..Default::default()
    });
    h.gateway.push_status(StatusInquiry {
        transaction_id: Some("TXN6".to_string()),
        status: Some("COMPLETED".to_string()),
        response_code: Some("200".to_string()),
        ..Default::default()
    });

    let payment = seed_processing_payment(&h.store, "TXN6", "PAY-A1-6").await;
    h.scheduler.start(
        h.engine.clone(),
        PollTarget {
            payment_id: payment.id,
            subject_id: "A1".to_string(),
            transaction_id: "TXN6".to_string(),
            reference_id: "PAY-A1-6".to_string(),
        },
    );

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.gateway.status_calls(), 3);
    let settled = h.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Paid);
}

#[tokio::test(start_paused = true)]
async fn webhook_before_first_tick_stops_polling_entirely() {
    let h = harness_with_limits(
        MockBehavior::AlwaysSuccess,
        Duration::from_secs(60),
        60,
        Duration::from_secs(900),
    );
    let payment = seed_processing_payment(&h.store, "TXN7", "PAY-A1-7").await;
    h.scheduler.start(
        h.engine.clone(),
        PollTarget {
            payment_id: payment.id,
            subject_id: "A1".to_string(),
            transaction_id: "TXN7".to_string(),
            reference_id: "PAY-A1-7".to_string(),
        },
    );
    assert!(h.scheduler.has_job(payment.id));

    h.engine
        .mark_completed(payment.id, support::success_report("TXN7"))
        .await
        .unwrap();

    assert!(!h.scheduler.has_job(payment.id));
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.gateway.status_calls(), 0);
    assert_eq!(h.broadcaster.count("payment.completed"), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_replaces_the_existing_job() {
    let h = harness_with_limits(
        MockBehavior::AlwaysPending,
        Duration::from_secs(60),
        60,
        Duration::from_secs(900),
    );
    let payment = seed_processing_payment(&h.store, "TXN8", "PAY-A1-8").await;
    let target = PollTarget {
        payment_id: payment.id,
        subject_id: "A1".to_string(),
        transaction_id: "TXN8".to_string(),
        reference_id: "PAY-A1-8".to_string(),
    };

    h.scheduler.start(h.engine.clone(), target.clone());
    h.scheduler.start(h.engine.clone(), target);

    assert_eq!(h.scheduler.job_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_without_a_job_is_a_no_op() {
    let h = harness_with_limits(
        MockBehavior::AlwaysPending,
        Duration::from_secs(1),
        60,
        Duration::from_secs(900),
    );
    h.scheduler.stop(Uuid::new_v4());
    assert_eq!(h.scheduler.job_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_every_job() {
    let h = harness_with_limits(
        MockBehavior::AlwaysPending,
        Duration::from_secs(60),
        60,
        Duration::from_secs(900),
    );
    for n in 0..3 {
        let payment =
            seed_processing_payment(&h.store, &format!("TXN9-{n}"), &format!("PAY-A1-9-{n}")).await;
        h.scheduler.start(
            h.engine.clone(),
            PollTarget {
                payment_id: payment.id,
                subject_id: "A1".to_string(),
                transaction_id: format!("TXN9-{n}"),
                reference_id: format!("PAY-A1-9-{n}"),
            },
        );
    }
    assert_eq!(h.scheduler.job_count(), 3);

    h.scheduler.shutdown();
    assert_eq!(h.scheduler.job_count(), 0);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.gateway.status_calls(), 0);
}
