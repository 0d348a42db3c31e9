// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! denolet-core: pure building blocks for the scale-to-zero dispatcher
//!
//! This crate provides:
//! - The worker lifecycle state machine and per-instance subject namespace
//! - Instance identifier generation
//! - A clock abstraction and the lock-free last-activity tracker
//! - Dispatcher configuration loading

pub mod activity;
pub mod config;
pub mod instance;

pub use activity::{ActivityTracker, Clock, FakeClock, SystemClock};
pub use config::{ConfigError, DispatcherConfig, TimingConfig, WorkerConfig};
pub use instance::{
    IdGen, InstanceId, SequentialIdGen, Subjects, TransitionError, UuidIdGen, WorkerState,
};
