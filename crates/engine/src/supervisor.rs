// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process supervision
//!
//! A spawned worker gets three tasks: one reader per output stream, which
//! forwards lines to the log, and an exit watcher, which publishes the exit
//! status and then reconciles the controller through the `on_exit` callback.

use denolet_adapters::process::LineStream;
use denolet_adapters::{ExitInfo, ProcessError, ProcessLauncher, SpawnedProcess};
use denolet_core::InstanceId;
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Which output stream a worker line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Starts workers and wires up their background tasks
#[derive(Clone)]
pub struct ProcessSupervisor<L> {
    launcher: L,
    command: Vec<String>,
    endpoint: String,
}

impl<L: ProcessLauncher> ProcessSupervisor<L> {
    /// `command` is the program and its leading arguments; `endpoint` and the
    /// instance id are appended on every spawn
    pub fn new(launcher: L, command: Vec<String>, endpoint: impl Into<String>) -> Self {
        Self {
            launcher,
            command,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full argument vector used to launch instance `id`
    pub fn command_for(&self, id: &InstanceId) -> Vec<String> {
        let mut command = self.command.clone();
        command.push(self.endpoint.clone());
        command.push(id.to_string());
        command
    }

    /// Launch the worker for `id`.
    ///
    /// `on_exit` runs once the process has exited, whatever the reason, after
    /// the exit status has been published to [`SupervisedProcess::exit_signal`].
    pub async fn spawn<F, Fut>(
        &self,
        id: &InstanceId,
        on_exit: F,
    ) -> Result<SupervisedProcess, ProcessError>
    where
        F: FnOnce(ExitInfo) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let SpawnedProcess {
            pid,
            stdout,
            stderr,
            exit,
        } = self.launcher.launch(&self.command_for(id)).await?;

        let readers = vec![
            tokio::spawn(forward_lines(id.clone(), OutputStream::Stdout, stdout)),
            tokio::spawn(forward_lines(id.clone(), OutputStream::Stderr, stderr)),
        ];

        let (exit_tx, exit_rx) = watch::channel(None);
        let watched_id = id.clone();
        let watcher = tokio::spawn(async move {
            let info = match exit.await {
                Ok(info) => info,
                Err(e) => {
                    tracing::error!(instance = %watched_id, error = %e, "lost track of worker");
                    ExitInfo { code: None }
                }
            };
            if info.success() {
                tracing::info!(instance = %watched_id, "worker exited");
            } else {
                tracing::warn!(instance = %watched_id, exit = %info, "worker exited with error");
            }
            exit_tx.send_replace(Some(info));
            on_exit(info).await;
        });

        Ok(SupervisedProcess {
            id: id.clone(),
            pid,
            readers,
            watcher,
            exit: exit_rx,
        })
    }
}

async fn forward_lines(id: InstanceId, stream: OutputStream, mut lines: LineStream) {
    while let Some(line) = lines.next().await {
        match stream {
            OutputStream::Stdout => {
                tracing::info!(target: "worker", instance = %id, %stream, "{}", line)
            }
            OutputStream::Stderr => {
                tracing::warn!(target: "worker", instance = %id, %stream, "{}", line)
            }
        }
    }
    tracing::debug!(instance = %id, %stream, "worker output closed");
}

/// Handle to a running worker and its background tasks
#[derive(Debug)]
pub struct SupervisedProcess {
    id: InstanceId,
    pid: Option<u32>,
    readers: Vec<JoinHandle<()>>,
    watcher: JoinHandle<()>,
    exit: watch::Receiver<Option<ExitInfo>>,
}

impl SupervisedProcess {
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Observes the exit status; `None` while the process runs
    pub fn exit_signal(&self) -> watch::Receiver<Option<ExitInfo>> {
        self.exit.clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Wait for the process to exit, then join the output readers.
    ///
    /// Readers get `drain_timeout` to flush trailing lines before they are
    /// aborted. The exit watcher is not joined: it may be the caller.
    pub async fn release(self, drain_timeout: Duration) -> ExitInfo {
        let exit = wait_for_exit(self.exit).await;

        let aborts: Vec<_> = self.readers.iter().map(|r| r.abort_handle()).collect();
        let drained =
            tokio::time::timeout(drain_timeout, futures::future::join_all(self.readers)).await;
        if drained.is_err() {
            tracing::debug!(instance = %self.id, "worker output did not drain, dropping it");
            aborts.iter().for_each(|a| a.abort());
        }

        // Detach; it finishes on its own once `on_exit` returns
        drop(self.watcher);
        exit
    }
}

/// Resolve once an exit status is published.
///
/// A dropped sender means the watcher is gone, which only happens after the
/// process has been reaped.
pub(crate) async fn wait_for_exit(mut exit: watch::Receiver<Option<ExitInfo>>) -> ExitInfo {
    let status = match exit.wait_for(|e| e.is_some()).await {
        Ok(info) => *info,
        Err(_) => None,
    };
    status.unwrap_or(ExitInfo { code: None })
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
