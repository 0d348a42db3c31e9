// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker controller: the single source of truth for whether a usable worker
//! exists and what it is called.
//!
//! All start and stop transitions run under one async mutex, held for the
//! whole transition (including the readiness wait and the wait for process
//! exit). Callers arriving meanwhile queue on the lock, so a job that lands
//! while the worker is starting simply waits for the outcome.

use crate::error::ControllerError;
use crate::readiness::ReadinessProbe;
use crate::supervisor::{self, ProcessSupervisor, SupervisedProcess};
use bytes::Bytes;
use denolet_adapters::{ExitInfo, MessageBus, ProcessLauncher};
use denolet_core::{
    ActivityTracker, Clock, DispatcherConfig, IdGen, InstanceId, TimingConfig, WorkerState,
};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};

/// Controller adapter dependencies
pub struct ControllerDeps<B, L> {
    pub bus: B,
    pub launcher: L,
}

/// What the controller needs to know about launching and probing workers
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Program and leading arguments of the worker
    pub command: Vec<String>,
    /// Bus endpoint handed to the worker
    pub endpoint: String,
    pub timing: TimingConfig,
}

impl From<&DispatcherConfig> for ControllerConfig {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            command: config.worker.command.clone(),
            endpoint: config.worker_endpoint().to_string(),
            timing: config.timing.clone(),
        }
    }
}

/// Result of [`WorkerController::ensure_started`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub id: InstanceId,
    /// This call spawned the instance (as opposed to finding it running)
    pub spawned: bool,
}

/// Lock-free view of the controller for observers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub state: WorkerState,
    pub instance: Option<InstanceId>,
}

/// The live worker
struct WorkerInstance {
    id: InstanceId,
    endpoint: String,
    started_at: Instant,
    process: Option<SupervisedProcess>,
    /// The stop notice went out; a resumed teardown must not repeat it
    notice_sent: bool,
    stopped: watch::Sender<bool>,
}

#[derive(Default)]
struct Slot {
    state: WorkerState,
    instance: Option<WorkerInstance>,
}

struct Shared<B, L, C: Clock, I> {
    bus: B,
    supervisor: ProcessSupervisor<L>,
    probe: ReadinessProbe<B>,
    id_gen: I,
    activity: ActivityTracker<C>,
    timing: TimingConfig,
    slot: Mutex<Slot>,
    snapshot: watch::Sender<Snapshot>,
}

/// Owns the worker's identity and serializes its start/stop transitions
pub struct WorkerController<B, L, C: Clock, I> {
    inner: Arc<Shared<B, L, C, I>>,
}

impl<B, L, C: Clock, I> Clone for WorkerController<B, L, C, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B, L, C, I> WorkerController<B, L, C, I>
where
    B: MessageBus,
    L: ProcessLauncher,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: ControllerDeps<B, L>, config: ControllerConfig, clock: C, id_gen: I) -> Self {
        let timing = config.timing;
        let probe = ReadinessProbe::new(deps.bus.clone(), timing.probe_timeout, timing.probe_backoff);
        let supervisor = ProcessSupervisor::new(deps.launcher, config.command, config.endpoint);
        let (snapshot, _) = watch::channel(Snapshot::default());

        Self {
            inner: Arc::new(Shared {
                bus: deps.bus,
                supervisor,
                probe,
                id_gen,
                activity: ActivityTracker::new(clock),
                timing,
                slot: Mutex::new(Slot::default()),
                snapshot,
            }),
        }
    }

    /// Current state and instance, without taking the lock
    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Follow state changes
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Stamp "now" as the latest job activity
    pub fn record_activity(&self) {
        self.inner.activity.record();
    }

    /// Time since the latest job activity
    pub fn idle_for(&self) -> Duration {
        self.inner.activity.idle_for()
    }

    /// Make sure a ready worker exists and return its identifier.
    ///
    /// Spawns and waits for readiness only when nothing is running; otherwise
    /// returns the existing identifier. On any startup failure the partial
    /// instance is torn down and the controller is Idle again.
    pub async fn ensure_started(&self) -> Result<Started, ControllerError> {
        let mut slot = self.inner.slot.lock().await;

        if slot.state == WorkerState::Ready {
            if let Some(instance) = &slot.instance {
                return Ok(Started {
                    id: instance.id.clone(),
                    spawned: false,
                });
            }
        }

        // Anything else left behind was interrupted by a cancelled caller
        if slot.instance.is_some() {
            self.teardown(&mut slot).await;
        } else if slot.state != WorkerState::Idle {
            if slot.state != WorkerState::Stopping {
                self.transition(&mut slot, WorkerState::Stopping, None);
            }
            self.transition(&mut slot, WorkerState::Idle, None);
        }

        let id = self.inner.id_gen.next();
        let started_at = Instant::now();
        self.transition(&mut slot, WorkerState::Starting, Some(&id));
        tracing::info!(instance = %id, "starting worker");

        let process = match self.inner.supervisor.spawn(&id, self.exit_handler(&id)).await {
            Ok(process) => process,
            Err(source) => {
                self.transition(&mut slot, WorkerState::Stopping, Some(&id));
                self.transition(&mut slot, WorkerState::Idle, None);
                return Err(ControllerError::Spawn { id, source });
            }
        };

        let exit = process.exit_signal();
        let (stopped, _) = watch::channel(false);
        slot.instance = Some(WorkerInstance {
            id: id.clone(),
            endpoint: self.inner.supervisor.endpoint().to_string(),
            started_at,
            process: Some(process),
            notice_sent: false,
            stopped,
        });

        let deadline = self.inner.timing.readiness_timeout;
        let ready = tokio::select! {
            result = self.inner.probe.wait_until_ready(&id, deadline) => {
                result.map_err(|source| ControllerError::Readiness { id: id.clone(), source })
            }
            exit = supervisor::wait_for_exit(exit) => {
                Err(ControllerError::ExitedDuringStartup { id: id.clone(), exit })
            }
        };

        match ready {
            Ok(attempts) => {
                self.transition(&mut slot, WorkerState::Ready, Some(&id));
                tracing::info!(
                    instance = %id,
                    attempts,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "worker ready"
                );
                Ok(Started { id, spawned: true })
            }
            Err(e) => {
                tracing::error!(instance = %id, error = %e, "worker failed to start");
                self.teardown(&mut slot).await;
                Err(e)
            }
        }
    }

    /// Relay a job to the ready worker, keeping the caller's reply subject.
    ///
    /// Returns the instance the job went to.
    pub async fn forward(
        &self,
        payload: Bytes,
        reply: Option<&str>,
    ) -> Result<InstanceId, ControllerError> {
        let id = {
            let slot = self.inner.slot.lock().await;
            match (&slot.state, &slot.instance) {
                (WorkerState::Ready, Some(instance)) => instance.id.clone(),
                _ => return Err(ControllerError::NotReady),
            }
        };

        let subject = id.subjects().work;
        match self.inner.bus.publish(&subject, reply, payload).await {
            Ok(()) => Ok(id),
            Err(source) => Err(ControllerError::Forward { id, source }),
        }
    }

    /// Stop the current worker, if any.
    ///
    /// Blocks until the process has exited. Returns whether this call
    /// performed the teardown; concurrent and repeated calls are no-ops.
    pub async fn stop(&self) -> bool {
        let mut slot = self.inner.slot.lock().await;
        self.teardown(&mut slot).await.is_some()
    }

    /// Stop instance `id` only if it is still the current one
    pub async fn stop_instance(&self, id: &InstanceId) -> bool {
        let mut slot = self.inner.slot.lock().await;
        if slot.instance.as_ref().map(|i| &i.id) != Some(id) {
            tracing::debug!(instance = %id, "stop for a worker that is already gone");
            return false;
        }
        self.teardown(&mut slot).await.is_some()
    }

    /// Block until the current instance (if any) has fully stopped
    pub async fn wait(&self) {
        let stopped = {
            let slot = self.inner.slot.lock().await;
            slot.instance.as_ref().map(|i| i.stopped.subscribe())
        };
        if let Some(mut stopped) = stopped {
            let _ = stopped.wait_for(|done| *done).await;
        }
    }

    /// Block until instance `id` has fully stopped; immediate if it is not
    /// the current instance
    pub async fn wait_instance(&self, id: &InstanceId) {
        let stopped = {
            let slot = self.inner.slot.lock().await;
            slot.instance
                .as_ref()
                .filter(|i| &i.id == id)
                .map(|i| i.stopped.subscribe())
        };
        if let Some(mut stopped) = stopped {
            let _ = stopped.wait_for(|done| *done).await;
        }
    }

    /// Callback for the exit watcher: reconcile when the process goes away
    /// on its own. Holds only a weak reference so a finished controller is
    /// not kept alive by a lingering process.
    fn exit_handler(
        &self,
        id: &InstanceId,
    ) -> impl FnOnce(ExitInfo) -> futures::future::BoxFuture<'static, ()> + Send + 'static {
        let weak: Weak<Shared<B, L, C, I>> = Arc::downgrade(&self.inner);
        let id = id.clone();
        move |exit| {
            Box::pin(async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let controller = WorkerController { inner };
                if controller.stop_instance(&id).await {
                    tracing::warn!(instance = %id, exit = %exit, "worker exited unexpectedly");
                }
            })
        }
    }

    /// Teardown of the current instance. Caller holds the lock.
    ///
    /// Runs to completion at most once per instance: it ends by removing the
    /// instance. If the caller is cancelled midway, the next stop or start
    /// resumes it without sending a second notice.
    async fn teardown(&self, slot: &mut Slot) -> Option<InstanceId> {
        let (id, notice_sent, exit) = {
            let instance = slot.instance.as_ref()?;
            let exit = instance.process.as_ref().map(|p| p.exit_signal());
            (instance.id.clone(), instance.notice_sent, exit)
        };
        if slot.state != WorkerState::Stopping {
            self.transition(slot, WorkerState::Stopping, Some(&id));
        }

        if !notice_sent {
            let subjects = id.subjects();
            if let Err(e) = self.inner.bus.publish(&subjects.stop, None, Bytes::new()).await {
                tracing::warn!(instance = %id, error = %e, "failed to send stop notice");
            }
            if let Err(e) = self.inner.bus.flush().await {
                tracing::warn!(instance = %id, error = %e, "failed to flush stop notice");
            }
            if let Some(instance) = slot.instance.as_mut() {
                instance.notice_sent = true;
            }
        }

        // No timeout: a worker that ignores its stop notice blocks here
        if let Some(exit) = exit {
            supervisor::wait_for_exit(exit).await;
        }
        if let Some(process) = slot.instance.as_mut().and_then(|i| i.process.take()) {
            let exit = process.release(self.inner.timing.log_drain_timeout).await;
            tracing::debug!(instance = %id, exit = %exit, "worker process released");
        }

        let instance = slot.instance.take()?;
        self.transition(slot, WorkerState::Idle, None);
        instance.stopped.send_replace(true);
        tracing::info!(
            instance = %id,
            endpoint = %instance.endpoint,
            uptime_ms = instance.started_at.elapsed().as_millis() as u64,
            "worker stopped"
        );
        Some(id)
    }

    fn transition(&self, slot: &mut Slot, next: WorkerState, id: Option<&InstanceId>) {
        if let Err(e) = slot.state.transition(next) {
            // Unreachable while every transition runs under the lock
            tracing::error!(error = %e, "rejected worker transition");
            return;
        }
        self.inner.snapshot.send_replace(Snapshot {
            state: next,
            instance: id.cloned(),
        });
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
