// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use denolet_adapters::FakeBus;

const BACKOFF: Duration = Duration::from_millis(100);

fn probe(bus: &FakeBus) -> ReadinessProbe<FakeBus> {
    ReadinessProbe::new(bus.clone(), Duration::from_secs(1), BACKOFF)
}

#[tokio::test(start_paused = true)]
async fn ready_on_first_attempt_returns_immediately() {
    let bus = FakeBus::new();
    bus.respond_after("ping.", 0);

    let start = Instant::now();
    let attempts = probe(&bus)
        .wait_until_ready(&InstanceId::new("w1"), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(attempts, 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(bus.request_count("ping.w1"), 1);
}

#[tokio::test(start_paused = true)]
async fn ready_on_attempt_k_returns_after_k_minus_one_backoffs() {
    let bus = FakeBus::new();
    bus.respond_after("ping.", 3);

    let start = Instant::now();
    let attempts = probe(&bus)
        .wait_until_ready(&InstanceId::new("w1"), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(attempts, 4);
    assert_eq!(start.elapsed(), BACKOFF * 3);
}

#[tokio::test(start_paused = true)]
async fn silent_worker_times_out_at_deadline_not_before() {
    let bus = FakeBus::new();
    let deadline = Duration::from_secs(10);

    let start = Instant::now();
    let err = probe(&bus)
        .wait_until_ready(&InstanceId::new("w1"), deadline)
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(elapsed >= deadline, "gave up early after {:?}", elapsed);
    assert!(elapsed < deadline + BACKOFF, "overshot deadline: {:?}", elapsed);

    let ReadinessError::TimedOut {
        subject,
        attempts,
        waited,
    } = err;
    assert_eq!(subject, "ping.w1");
    assert!(waited >= deadline);
    assert!((99..=101).contains(&attempts), "attempts = {}", attempts);
}

#[tokio::test(start_paused = true)]
async fn pings_only_the_instance_subject() {
    let bus = FakeBus::new();
    bus.respond_after("ping.other", 0);

    let result = probe(&bus)
        .wait_until_ready(&InstanceId::new("mine"), Duration::from_millis(250))
        .await;

    assert!(result.is_err());
    assert_eq!(bus.request_count("ping.other"), 0);
    assert!(bus.request_count("ping.mine") >= 3);
}
