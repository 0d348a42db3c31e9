// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use denolet_adapters::FakeLauncher;
use tokio::sync::oneshot;

fn supervisor(launcher: &FakeLauncher) -> ProcessSupervisor<FakeLauncher> {
    ProcessSupervisor::new(
        launcher.clone(),
        vec!["deno".into(), "run".into(), "svc.ts".into()],
        "localhost:4222",
    )
}

#[tokio::test]
async fn endpoint_and_id_are_the_trailing_arguments() {
    let launcher = FakeLauncher::new();
    let _process = supervisor(&launcher)
        .spawn(&InstanceId::new("abc"), |_| async {})
        .await
        .unwrap();

    assert_eq!(
        launcher.launches(),
        vec![vec!["deno", "run", "svc.ts", "localhost:4222", "abc"]]
    );
}

#[tokio::test]
async fn exit_is_published_before_on_exit_runs() {
    let launcher = FakeLauncher::new();
    let (tx, rx) = oneshot::channel();

    let process = supervisor(&launcher)
        .spawn(&InstanceId::new("abc"), move |info| async move {
            let _ = tx.send(info);
        })
        .await
        .unwrap();
    let signal = process.exit_signal();
    assert!(!process.has_exited());

    launcher.exit(0, Some(7));

    let reported = rx.await.unwrap();
    assert_eq!(reported, ExitInfo { code: Some(7) });
    assert_eq!(*signal.borrow(), Some(ExitInfo { code: Some(7) }));
    assert!(process.has_exited());
}

#[tokio::test]
async fn on_exit_runs_for_clean_exit_too() {
    let launcher = FakeLauncher::new();
    let (tx, rx) = oneshot::channel();

    let _process = supervisor(&launcher)
        .spawn(&InstanceId::new("abc"), move |info| async move {
            let _ = tx.send(info);
        })
        .await
        .unwrap();
    launcher.exit(0, Some(0));

    assert!(rx.await.unwrap().success());
}

#[tokio::test]
async fn release_waits_for_exit_and_joins_readers() {
    let launcher = FakeLauncher::new();
    let process = supervisor(&launcher)
        .spawn(&InstanceId::new("abc"), |_| async {})
        .await
        .unwrap();
    launcher.emit_stdout(0, "booting");
    launcher.emit_stderr(0, "warning: slow disk");

    let release = tokio::spawn(process.release(Duration::from_secs(1)));
    tokio::task::yield_now().await;
    assert!(!release.is_finished());

    launcher.exit(0, None);
    let exit = release.await.unwrap();
    assert_eq!(exit, ExitInfo { code: None });
}

#[tokio::test]
async fn failed_launch_never_calls_on_exit() {
    let launcher = FakeLauncher::new();
    launcher.fail_launches(true);
    let (tx, mut rx) = oneshot::channel::<ExitInfo>();

    let result = supervisor(&launcher)
        .spawn(&InstanceId::new("abc"), move |info| async move {
            let _ = tx.send(info);
        })
        .await;

    assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    // The callback was dropped unused, closing the channel
    assert!(matches!(
        rx.try_recv(),
        Err(oneshot::error::TryRecvError::Closed)
    ));
}
