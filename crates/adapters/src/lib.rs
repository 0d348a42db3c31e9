// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the message bus and worker processes

pub mod bus;
pub mod process;
pub mod traced;

pub use bus::{BusError, InboundMessage, MessageBus, MessageStream, NatsBus};
pub use process::{ExitInfo, LocalLauncher, ProcessError, ProcessLauncher, SpawnedProcess};
pub use traced::{TracedBus, TracedLauncher};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use bus::{BusCall, FakeBus};
#[cfg(any(test, feature = "test-support"))]
pub use process::FakeLauncher;
