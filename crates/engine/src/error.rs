// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the worker controller

use crate::readiness::ReadinessError;
use denolet_adapters::{BusError, ExitInfo, ProcessError};
use denolet_core::InstanceId;
use thiserror::Error;

/// Errors surfaced by controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to spawn worker {id}: {source}")]
    Spawn {
        id: InstanceId,
        #[source]
        source: ProcessError,
    },
    #[error("worker {id} did not become ready: {source}")]
    Readiness {
        id: InstanceId,
        #[source]
        source: ReadinessError,
    },
    #[error("worker {id} exited during startup ({exit})")]
    ExitedDuringStartup { id: InstanceId, exit: ExitInfo },
    #[error("no ready worker")]
    NotReady,
    #[error("failed to forward job to worker {id}: {source}")]
    Forward {
        id: InstanceId,
        #[source]
        source: BusError,
    },
}

impl ControllerError {
    /// The instance the failure concerns, if one was involved
    pub fn instance(&self) -> Option<&InstanceId> {
        match self {
            ControllerError::Spawn { id, .. }
            | ControllerError::Readiness { id, .. }
            | ControllerError::ExitedDuringStartup { id, .. }
            | ControllerError::Forward { id, .. } => Some(id),
            ControllerError::NotReady => None,
        }
    }
}
