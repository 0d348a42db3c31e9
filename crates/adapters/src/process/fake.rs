// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process launcher for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ExitInfo, ProcessError, ProcessLauncher, SpawnedProcess};
use crate::bus::FakeBus;
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Control side of one fake process
struct FakeProcess {
    command: Vec<String>,
    stdout: Option<mpsc::UnboundedSender<String>>,
    stderr: Option<mpsc::UnboundedSender<String>>,
    exit: Option<oneshot::Sender<ExitInfo>>,
}

impl FakeProcess {
    fn finish(&mut self, info: ExitInfo) {
        // Output streams close with the process
        self.stdout = None;
        self.stderr = None;
        if let Some(tx) = self.exit.take() {
            let _ = tx.send(info);
        }
    }
}

#[derive(Default)]
struct FakeLauncherState {
    processes: Vec<FakeProcess>,
    fail_launches: bool,
}

/// Launcher whose processes live until the test (or a stop notice) ends them
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<FakeLauncherState>>,
    stop_bus: Option<FakeBus>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes exit cleanly when `stop.<id>` is published on `bus`, where
    /// `<id>` is the last command argument, like a well-behaved worker
    pub fn exiting_on_stop(bus: &FakeBus) -> Self {
        Self {
            state: Arc::default(),
            stop_bus: Some(bus.clone()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeLauncherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every following launch fail as if the binary were missing
    pub fn fail_launches(&self, fail: bool) {
        self.lock().fail_launches = fail;
    }

    /// Commands of all successful launches, in order
    pub fn launches(&self) -> Vec<Vec<String>> {
        self.lock()
            .processes
            .iter()
            .map(|p| p.command.clone())
            .collect()
    }

    pub fn launch_count(&self) -> usize {
        self.lock().processes.len()
    }

    /// Whether launch `index` has not exited yet
    pub fn is_running(&self, index: usize) -> bool {
        self.lock()
            .processes
            .get(index)
            .is_some_and(|p| p.exit.is_some())
    }

    /// End launch `index` with `code`, as if it crashed or was killed
    pub fn exit(&self, index: usize, code: Option<i32>) {
        if let Some(process) = self.lock().processes.get_mut(index) {
            process.finish(ExitInfo { code });
        }
    }

    /// Write a line to launch `index`'s stdout
    pub fn emit_stdout(&self, index: usize, line: &str) {
        if let Some(tx) = self.lock().processes.get(index).and_then(|p| p.stdout.as_ref()) {
            let _ = tx.send(line.to_string());
        }
    }

    /// Write a line to launch `index`'s stderr
    pub fn emit_stderr(&self, index: usize, line: &str) {
        if let Some(tx) = self.lock().processes.get(index).and_then(|p| p.stderr.as_ref()) {
            let _ = tx.send(line.to_string());
        }
    }

    fn watch_for_stop(&self, index: usize, stop_subject: String, mut tap: broadcast::Receiver<crate::InboundMessage>) {
        let launcher = self.clone();
        tokio::spawn(async move {
            loop {
                match tap.recv().await {
                    Ok(message) if message.subject == stop_subject => {
                        launcher.exit(index, Some(0));
                        break;
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(&self, command: &[String]) -> Result<SpawnedProcess, ProcessError> {
        let program = command.first().ok_or(ProcessError::EmptyCommand)?;

        let (stdout_tx, mut stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, mut stderr_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();

        let index = {
            let mut state = self.lock();
            if state.fail_launches {
                return Err(ProcessError::Spawn {
                    program: program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "fake launch failure"),
                });
            }
            state.processes.push(FakeProcess {
                command: command.to_vec(),
                stdout: Some(stdout_tx),
                stderr: Some(stderr_tx),
                exit: Some(exit_tx),
            });
            state.processes.len() - 1
        };

        if let (Some(bus), Some(id)) = (&self.stop_bus, command.last()) {
            self.watch_for_stop(index, format!("stop.{}", id), bus.tap());
        }

        // A dropped control side reads as a kill
        let exit = exit_rx
            .map(|result| Ok(result.unwrap_or(ExitInfo { code: None })))
            .boxed();

        Ok(SpawnedProcess {
            pid: Some(10_000 + index as u32),
            stdout: futures::stream::poll_fn(move |cx| stdout_rx.poll_recv(cx)).boxed(),
            stderr: futures::stream::poll_fn(move |cx| stderr_rx.poll_recv(cx)).boxed(),
            exit,
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
