// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process adapters

mod local;

pub use local::LocalLauncher;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeLauncher;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use thiserror::Error;

/// Lines written by the process to one of its output streams
pub type LineStream = BoxStream<'static, String>;

/// Resolves once the process has exited
pub type ExitFuture = BoxFuture<'static, Result<ExitInfo, ProcessError>>;

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, absent when terminated by a signal
    pub code: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// A started process, split into the pieces its supervisor consumes
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    pub stdout: LineStream,
    pub stderr: LineStream,
    /// Owns the process; dropping it before completion kills the process
    pub exit: ExitFuture,
}

impl std::fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty worker command")]
    EmptyCommand,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not attach to worker {0}")]
    StreamUnavailable(&'static str),
    #[error("failed waiting for worker exit: {0}")]
    Wait(#[source] std::io::Error),
}

/// Adapter that starts worker processes
#[async_trait]
pub trait ProcessLauncher: Clone + Send + Sync + 'static {
    /// Start `command[0]` with the remaining elements as arguments
    async fn launch(&self, command: &[String]) -> Result<SpawnedProcess, ProcessError>;
}
