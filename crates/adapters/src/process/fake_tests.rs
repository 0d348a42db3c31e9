// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::MessageBus;
use bytes::Bytes;

fn cmd(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn launch_records_command() {
    let launcher = FakeLauncher::new();
    let _process = launcher.launch(&cmd(&["worker", "host", "id1"])).await.unwrap();

    assert_eq!(launcher.launches(), vec![cmd(&["worker", "host", "id1"])]);
    assert!(launcher.is_running(0));
}

#[tokio::test]
async fn exit_resolves_future_and_closes_streams() {
    let launcher = FakeLauncher::new();
    let process = launcher.launch(&cmd(&["worker"])).await.unwrap();

    launcher.emit_stdout(0, "hello");
    launcher.emit_stderr(0, "oops");
    launcher.exit(0, Some(2));

    let stdout: Vec<String> = process.stdout.collect().await;
    let stderr: Vec<String> = process.stderr.collect().await;
    assert_eq!(stdout, vec!["hello"]);
    assert_eq!(stderr, vec!["oops"]);
    assert_eq!(process.exit.await.unwrap(), ExitInfo { code: Some(2) });
    assert!(!launcher.is_running(0));
}

#[tokio::test]
async fn failing_launch_records_nothing() {
    let launcher = FakeLauncher::new();
    launcher.fail_launches(true);

    let err = launcher.launch(&cmd(&["worker"])).await.unwrap_err();
    assert!(matches!(err, ProcessError::Spawn { .. }));
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn stop_notice_ends_matching_process_only() {
    let bus = FakeBus::new();
    let launcher = FakeLauncher::exiting_on_stop(&bus);
    let first = launcher.launch(&cmd(&["worker", "host", "a"])).await.unwrap();
    let _second = launcher.launch(&cmd(&["worker", "host", "b"])).await.unwrap();

    bus.publish("stop.a", None, Bytes::new()).await.unwrap();

    assert_eq!(first.exit.await.unwrap(), ExitInfo { code: Some(0) });
    assert!(launcher.is_running(1));
}
