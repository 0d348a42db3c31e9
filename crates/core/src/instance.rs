// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker instance identity and lifecycle state machine

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Identifier minted once per worker lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Subjects the worker with this identifier listens on
    pub fn subjects(&self) -> Subjects {
        Subjects::for_instance(self)
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates unique instance identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> InstanceId;
}

/// Random identifiers for production use.
///
/// Uses the hyphen-free UUID form so the id is a single subject token.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> InstanceId {
        InstanceId(uuid::Uuid::new_v4().simple().to_string())
    }
}

/// Predictable identifiers for tests
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> InstanceId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        InstanceId(format!("{}{}", self.prefix, n))
    }
}

/// Per-instance subject namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subjects {
    /// Liveness probe, answered once the worker is ready
    pub ping: String,
    /// Forwarded jobs
    pub work: String,
    /// Shutdown notice
    pub stop: String,
}

impl Subjects {
    pub fn for_instance(id: &InstanceId) -> Self {
        Self {
            ping: format!("ping.{}", id),
            work: format!("work.{}", id),
            stop: format!("stop.{}", id),
        }
    }
}

/// Lifecycle state of the (single) worker slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// No worker process exists
    #[default]
    Idle,
    /// Process spawned, waiting for its liveness reply
    Starting,
    /// Accepting forwarded jobs
    Ready,
    /// Teardown in progress
    Stopping,
}

/// Rejected state change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid worker transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: WorkerState,
    pub to: WorkerState,
}

impl WorkerState {
    /// Whether `self -> next` is an allowed step.
    ///
    /// Idle -> Starting -> Ready -> Stopping -> Idle, with Stopping also
    /// reachable straight from Starting.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Ready)
                | (Starting, Stopping)
                | (Ready, Stopping)
                | (Stopping, Idle)
        )
    }

    /// Move to `next`, leaving `self` untouched if the step is not allowed
    pub fn transition(&mut self, next: WorkerState) -> Result<(), TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    /// A worker process exists in this state
    pub fn has_instance(self) -> bool {
        self != WorkerState::Idle
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::Starting => "starting",
            WorkerState::Ready => "ready",
            WorkerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
