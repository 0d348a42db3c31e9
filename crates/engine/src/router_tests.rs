// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::controller::{ControllerConfig, ControllerDeps, Snapshot};
use bytes::Bytes;
use denolet_adapters::{BusCall, FakeBus, FakeLauncher};
use denolet_core::{FakeClock, SequentialIdGen, TimingConfig, WorkerState};
use tokio::sync::oneshot;

const SUBJECT: &str = "denolet";
const IDLE: Duration = Duration::from_secs(10);
const EPSILON: Duration = Duration::from_millis(100);

type TestRouter = RequestRouter<FakeBus, FakeLauncher, FakeClock, SequentialIdGen>;

struct Harness {
    bus: FakeBus,
    launcher: FakeLauncher,
    clock: FakeClock,
    router: TestRouter,
}

fn harness() -> Harness {
    let bus = FakeBus::new();
    bus.respond_after("ping.", 0);
    let launcher = FakeLauncher::exiting_on_stop(&bus);
    harness_with(bus, launcher)
}

fn harness_with(bus: FakeBus, launcher: FakeLauncher) -> Harness {
    let clock = FakeClock::new();
    let controller = WorkerController::new(
        ControllerDeps {
            bus: bus.clone(),
            launcher: launcher.clone(),
        },
        ControllerConfig {
            command: vec!["worker".into()],
            endpoint: "localhost:4222".into(),
            timing: TimingConfig {
                log_drain_timeout: Duration::from_millis(100),
                ..TimingConfig::default()
            },
        },
        clock.clone(),
        SequentialIdGen::new("w"),
    );
    let router = RequestRouter::new(
        bus.clone(),
        controller,
        RouterConfig {
            subject: SUBJECT.into(),
            idle_threshold: IDLE,
            idle_check_interval: IDLE,
        },
    );
    Harness {
        bus,
        launcher,
        clock,
        router,
    }
}

fn job(payload: &'static str, reply: Option<&str>) -> InboundMessage {
    InboundMessage {
        subject: SUBJECT.to_string(),
        payload: Bytes::from_static(payload.as_bytes()),
        reply: reply.map(String::from),
    }
}

async fn until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition never held");
}

// =============================================================================
// handle
// =============================================================================

#[tokio::test]
async fn first_job_starts_worker_and_is_forwarded() {
    let h = harness();

    let outcome = h.router.handle(job("A", Some("_INBOX.1"))).await;

    assert_eq!(outcome, JobOutcome::Forwarded(InstanceId::new("w1")));
    assert_eq!(
        h.bus.published_to("work.w1"),
        vec![(Some("_INBOX.1".to_string()), Bytes::from_static(b"A"))]
    );
    assert_eq!(h.launcher.launch_count(), 1);
}

#[tokio::test]
async fn later_jobs_reuse_running_worker() {
    let h = harness();

    h.router.handle(job("A", None)).await;
    let outcome = h.router.handle(job("B", Some("r2"))).await;

    assert_eq!(outcome, JobOutcome::Forwarded(InstanceId::new("w1")));
    assert_eq!(h.launcher.launch_count(), 1);
    assert_eq!(h.bus.published_to("work.w1").len(), 2);
}

#[tokio::test]
async fn concurrent_jobs_share_one_worker() {
    let h = harness();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = h.router.clone();
            tokio::spawn(async move { router.handle(job("x", None)).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            JobOutcome::Forwarded(InstanceId::new("w1"))
        );
    }

    assert_eq!(h.launcher.launch_count(), 1);
    assert_eq!(h.bus.published_to("work.w1").len(), 8);
}

#[tokio::test]
async fn job_is_dropped_when_worker_cannot_start() {
    let h = harness();
    h.launcher.fail_launches(true);

    let outcome = h.router.handle(job("A", Some("r"))).await;

    assert_eq!(outcome, JobOutcome::Dropped);
    assert_eq!(h.bus.publish_count("work."), 0);
    assert_eq!(h.router.controller().snapshot().state, WorkerState::Idle);
}

#[tokio::test]
async fn router_recovers_after_dropped_job() {
    let h = harness();
    h.launcher.fail_launches(true);
    h.router.handle(job("A", None)).await;
    h.launcher.fail_launches(false);

    let outcome = h.router.handle(job("B", None)).await;

    assert_eq!(outcome, JobOutcome::Forwarded(InstanceId::new("w2")));
}

#[tokio::test]
async fn forward_failure_resets_worker() {
    let h = harness();
    h.bus.fail_publishes_to("work.");

    let outcome = h.router.handle(job("A", Some("r"))).await;

    assert_eq!(outcome, JobOutcome::Reset);
    assert_eq!(h.bus.published_to("stop.w1").len(), 1);
    assert_eq!(h.router.controller().snapshot().state, WorkerState::Idle);
    assert!(!h.launcher.is_running(0));
}

#[tokio::test]
async fn handling_a_job_counts_as_activity() {
    let h = harness();
    h.router.handle(job("A", None)).await;
    h.clock.advance(IDLE);

    h.router.handle(job("B", None)).await;

    assert_eq!(h.router.controller().idle_for(), Duration::ZERO);
}

#[tokio::test]
async fn crashed_worker_is_replaced_on_next_job() {
    let h = harness();
    h.router.handle(job("A", None)).await;

    h.launcher.exit(0, Some(1));
    h.router.controller().wait().await;
    until(|| h.router.controller().snapshot().state == WorkerState::Idle).await;

    let outcome = h.router.handle(job("B", None)).await;
    assert_eq!(outcome, JobOutcome::Forwarded(InstanceId::new("w2")));
    // Reconciliation still sends the best-effort notice, once
    assert_eq!(h.bus.published_to("stop.w1").len(), 1);
}

/// A job whose worker is stopped between start and relay must not reset the
/// worker that a later job started in the meantime
#[tokio::test(start_paused = true)]
async fn late_reset_leaves_newer_worker_alone() {
    let bus = FakeBus::new();
    bus.respond_after("ping.", 2);
    // Workers ignore stop notices until the test ends them
    let h = harness_with(bus, FakeLauncher::new());
    let controller = h.router.controller().clone();
    let mut states = controller.watch();

    let first = tokio::spawn({
        let router = h.router.clone();
        async move { router.handle(job("first", None)).await }
    });
    states
        .wait_for(|s| s.state == WorkerState::Starting)
        .await
        .unwrap();

    // Queued behind the start; runs before the first job's relay
    let stopper = tokio::spawn({
        let controller = controller.clone();
        async move { controller.stop().await }
    });
    states
        .wait_for(|s| s.state == WorkerState::Stopping)
        .await
        .unwrap();

    // Queued behind the first job's relay, which will find nothing ready
    let second = tokio::spawn({
        let router = h.router.clone();
        async move { router.handle(job("second", Some("r2"))).await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    h.launcher.exit(0, Some(0));

    let second = tokio::time::timeout(Duration::from_secs(30), second)
        .await
        .expect("second job should be relayed")
        .unwrap();
    assert_eq!(second, JobOutcome::Forwarded(InstanceId::new("w2")));
    assert_eq!(first.await.unwrap(), JobOutcome::Reset);
    assert!(stopper.await.unwrap());

    assert_eq!(h.bus.publish_count("stop.w2"), 0);
    assert!(h.launcher.is_running(1));
    assert_eq!(
        controller.snapshot(),
        Snapshot {
            state: WorkerState::Ready,
            instance: Some(InstanceId::new("w2")),
        }
    );
}

// =============================================================================
// idle eviction through the router
// =============================================================================

#[tokio::test(start_paused = true)]
async fn idle_worker_is_evicted_and_next_job_spawns_fresh_one() {
    let h = harness();
    let first = h.router.handle(job("A", None)).await;
    assert_eq!(first, JobOutcome::Forwarded(InstanceId::new("w1")));

    h.clock.advance(IDLE + EPSILON);
    tokio::time::sleep(IDLE + EPSILON).await;
    until(|| h.router.controller().snapshot().state == WorkerState::Idle).await;
    assert_eq!(h.bus.published_to("stop.w1").len(), 1);

    let second = h.router.handle(job("B", Some("r"))).await;
    assert_eq!(second, JobOutcome::Forwarded(InstanceId::new("w2")));
    assert_eq!(
        h.bus.published_to("work.w2"),
        vec![(Some("r".to_string()), Bytes::from_static(b"B"))]
    );
}

#[tokio::test(start_paused = true)]
async fn steady_traffic_keeps_worker_alive() {
    let h = harness();
    h.router.handle(job("A", None)).await;

    for _ in 0..4 {
        h.clock.advance(IDLE / 2);
        h.router.handle(job("tick", None)).await;
        tokio::time::sleep(IDLE / 2).await;
    }

    assert_eq!(h.router.controller().snapshot().state, WorkerState::Ready);
    assert_eq!(h.bus.publish_count("stop."), 0);
    assert_eq!(h.launcher.launch_count(), 1);
}

// =============================================================================
// run
// =============================================================================

#[tokio::test]
async fn run_serves_jobs_until_shutdown() {
    let h = harness();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let router = h.router.clone();
    let task = tokio::spawn(async move {
        router
            .run(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let bus = h.bus.clone();
    until(move || {
        bus.calls().contains(&BusCall::Subscribe {
            subject: SUBJECT.to_string(),
        })
    })
    .await;
    h.bus.inject(SUBJECT, "A", Some("_INBOX.9"));
    let bus = h.bus.clone();
    until(move || !bus.published_to("work.w1").is_empty()).await;

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(
        h.bus.published_to("work.w1"),
        vec![(Some("_INBOX.9".to_string()), Bytes::from_static(b"A"))]
    );
}

#[tokio::test]
async fn run_ignores_other_subjects() {
    let h = harness();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let router = h.router.clone();
    let task = tokio::spawn(async move {
        router
            .run(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let bus = h.bus.clone();
    until(move || !bus.calls().is_empty()).await;
    h.bus.inject("elsewhere", "A", None);
    tokio::time::sleep(Duration::from_millis(20)).await;

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(h.launcher.launch_count(), 0);
}

#[tokio::test]
async fn run_returns_when_subscription_closes() {
    let h = harness();
    let router = h.router.clone();
    let task = tokio::spawn(async move { router.run(std::future::pending()).await });

    let bus = h.bus.clone();
    until(move || !bus.calls().is_empty()).await;
    h.bus.close_subscriptions();

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("router should stop when the stream ends")
        .unwrap()
        .unwrap();
}
