// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! denolet execution engine: worker lifecycle control and job routing

mod controller;
mod error;
mod idle;
mod readiness;
mod router;
mod supervisor;

pub use controller::{ControllerConfig, ControllerDeps, Snapshot, Started, WorkerController};
pub use error::ControllerError;
pub use idle::{IdleCheck, IdleMonitor};
pub use readiness::{ReadinessError, ReadinessProbe};
pub use router::{JobOutcome, RequestRouter, RouterConfig};
pub use supervisor::{OutputStream, ProcessSupervisor, SupervisedProcess};
