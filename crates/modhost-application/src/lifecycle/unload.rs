//! Unload Coordinator
//!
//! Tracks every piece of asynchronous work a module starts so the module's
//! code is never released while something may still run it. Built on
//! tokio-util primitives:
//! - `CancellationToken` carries the unload signal to cooperative tasks
//! - `TaskTracker` counts observed tasks and wakes the drain when it empties
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = UnloadCoordinator::for_current_runtime(ModuleId::new("billing"))?;
//!
//! coordinator.observe("warm-cache", async move { cache.warm().await })?;
//! coordinator.register_for_unload("flush", move || writer.flush())?;
//!
//! coordinator.signal();
//! coordinator.drain().await?;
//! ```
//!
//! Ordering: `signal()` happens-before every unload callback, and `drain()`
//! does not return while any observed task, callback or service construction
//! is pending. Work observed after the signal is rejected. Tasks are never
//! force-terminated.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{debug, error, info, warn};

use modhost_domain::{Error, ModuleId, Result};

type Disposer = Box<dyn FnOnce() + Send>;

/// Where a module is in its unload sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadState {
    /// Accepting new observed work
    Running,
    /// Unload requested; only unload callbacks may still be registered
    Signaled,
    /// Every observed task has finished
    Drained,
}

/// How an observed task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed(String),
    Panicked(String),
    /// The task was dropped without running to completion
    Abandoned,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Completion handle of an observed task
///
/// Failures are logged by the coordinator; this handle only lets interested
/// callers sequence work after the task.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    name: String,
    outcome: watch::Receiver<Option<TaskOutcome>>,
}

impl TaskCompletion {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outcome if the task has already finished
    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.outcome.borrow().clone()
    }

    /// Wait for the task to finish
    pub async fn wait(mut self) -> TaskOutcome {
        match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(TaskOutcome::Abandoned),
            Err(_) => TaskOutcome::Abandoned,
        }
    }
}

/// Summary of a completed drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Disposers run after the task set emptied
    pub disposed: usize,
    /// Time spent waiting and disposing
    pub elapsed: Duration,
}

struct Inner {
    module: ModuleId,
    handle: Handle,
    token: CancellationToken,
    tracker: TaskTracker,
    state: Mutex<UnloadState>,
    pending: DashMap<u64, String>,
    next_task_id: AtomicU64,
    disposers: Mutex<Vec<(String, Disposer)>>,
    drain_warn_interval: Duration,
}

/// Per-module registry of in-flight work
#[derive(Clone)]
pub struct UnloadCoordinator {
    inner: Arc<Inner>,
}

impl UnloadCoordinator {
    /// Create a coordinator spawning its tasks on `handle`
    pub fn new(module: ModuleId, handle: Handle, drain_warn_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                module,
                handle,
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
                state: Mutex::new(UnloadState::Running),
                pending: DashMap::new(),
                next_task_id: AtomicU64::new(0),
                disposers: Mutex::new(Vec::new()),
                drain_warn_interval,
            }),
        }
    }

    /// Create a coordinator on the runtime of the calling task
    pub fn for_current_runtime(module: ModuleId) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::invalid_state(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(module, handle, Duration::from_secs(10)))
    }

    pub fn module(&self) -> &ModuleId {
        &self.inner.module
    }

    /// Runtime the coordinator spawns on
    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    /// The unload signal token
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// A token cancelled together with the unload signal
    pub fn child_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    pub fn state(&self) -> UnloadState {
        *self.lock_state()
    }

    pub fn is_signaled(&self) -> bool {
        self.state() != UnloadState::Running
    }

    /// Number of observed tasks and constructions still running
    pub fn active_tasks(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Names of observed tasks and constructions still running
    pub fn pending_tasks(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Request unload
    ///
    /// Returns `true` for the call that performed the transition. Later and
    /// concurrent calls are no-ops.
    pub fn signal(&self) -> bool {
        {
            let mut state = self.lock_state();
            if *state != UnloadState::Running {
                return false;
            }
            *state = UnloadState::Signaled;
        }

        self.inner.tracker.close();
        self.inner.token.cancel();
        info!(
            module = %self.inner.module,
            active_tasks = self.inner.tracker.len(),
            "Unload signaled"
        );
        true
    }

    /// Track a piece of in-flight work
    ///
    /// Failures and panics are logged, never propagated. Rejected with
    /// `AlreadyUnloaded` once the module has been signaled.
    pub fn observe<F>(&self, name: impl Into<String>, task: F) -> Result<TaskCompletion>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let state = self.lock_state();
        if *state != UnloadState::Running {
            debug!(module = %self.inner.module, task = %name, "Observe rejected after unload signal");
            return Err(Error::already_unloaded(
                self.inner.module.as_str(),
                format!("observe({name})"),
            ));
        }
        Ok(self.track(name, task))
    }

    /// Run `callback` once the unload signal fires
    ///
    /// The callback runs on the blocking pool, never on the thread that
    /// signals, and is itself an observed task. Allowed until the module has
    /// drained.
    pub fn register_for_unload<F>(&self, name: impl Into<String>, callback: F) -> Result<TaskCompletion>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let state = self.lock_state();
        if *state == UnloadState::Drained {
            return Err(Error::already_unloaded(
                self.inner.module.as_str(),
                format!("register_for_unload({name})"),
            ));
        }

        let token = self.inner.token.clone();
        Ok(self.track(name, async move {
            token.cancelled().await;
            tokio::task::spawn_blocking(callback)
                .await
                .map_err(|e| anyhow::anyhow!("unload callback did not complete: {e}"))
        }))
    }

    /// Run `disposer` after the module has drained
    ///
    /// Disposers run in reverse registration order.
    pub fn register_disposer<F>(&self, name: impl Into<String>, disposer: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let state = self.lock_state();
        if *state == UnloadState::Drained {
            return Err(Error::already_unloaded(
                self.inner.module.as_str(),
                format!("register_disposer({name})"),
            ));
        }
        self.inner
            .disposers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, Box::new(disposer)));
        drop(state);
        Ok(())
    }

    /// Hold the module open while `service` is constructed
    ///
    /// `drain()` does not complete until the returned guard is dropped, so a
    /// constructor that started before the signal always finishes (and gets
    /// its disposer registered) before the module's code is released.
    /// Rejected with `AlreadyUnloaded` once the module has been signaled.
    pub fn begin_construction(&self, service: &str) -> Result<ConstructionGuard> {
        let state = self.lock_state();
        if *state != UnloadState::Running {
            return Err(Error::already_unloaded(
                self.inner.module.as_str(),
                format!("construct {service}"),
            ));
        }
        let id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        self.inner.pending.insert(id, format!("construct {service}"));
        Ok(ConstructionGuard {
            inner: Arc::clone(&self.inner),
            id,
            _token: self.inner.tracker.token(),
        })
    }

    /// Wait until every observed task has finished, then run disposers
    ///
    /// Must follow [`signal`](Self::signal). Logs the pending task names every
    /// drain warn interval while waiting.
    pub async fn drain(&self) -> Result<DrainReport> {
        let started = Instant::now();
        match self.state() {
            UnloadState::Running => {
                return Err(Error::invalid_state(format!(
                    "drain of module '{}' requested before unload signal",
                    self.inner.module
                )));
            }
            UnloadState::Drained => return Ok(DrainReport::default()),
            UnloadState::Signaled => {}
        }

        loop {
            tokio::select! {
                () = self.inner.tracker.wait() => {}
                () = tokio::time::sleep(self.inner.drain_warn_interval) => {
                    warn!(
                        module = %self.inner.module,
                        pending = ?self.pending_tasks(),
                        waited_secs = started.elapsed().as_secs(),
                        "Unload drain still waiting on observed tasks"
                    );
                    continue;
                }
            }

            // Unload callbacks may be registered until the state flips.
            let mut state = self.lock_state();
            if self.inner.tracker.is_empty() {
                *state = UnloadState::Drained;
                break;
            }
        }

        let disposed = self.run_disposers().await;
        let report = DrainReport {
            disposed,
            elapsed: started.elapsed(),
        };
        info!(
            module = %self.inner.module,
            disposed = report.disposed,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Module drained"
        );
        Ok(report)
    }

    /// [`drain`](Self::drain) for synchronous unload paths
    pub fn drain_blocking(&self) -> Result<DrainReport> {
        let coordinator = self.clone();
        crate::blocking::block_on(&self.inner.handle, async move { coordinator.drain().await })?
    }

    fn track<F>(&self, name: String, task: F) -> TaskCompletion
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        self.inner.pending.insert(id, name.clone());
        let (sender, receiver) = watch::channel(None);

        let inner = Arc::clone(&self.inner);
        let task_name = name.clone();
        self.inner.tracker.spawn_on(
            async move {
                let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(())) => {
                        debug!(module = %inner.module, task = %task_name, "Observed task completed");
                        TaskOutcome::Succeeded
                    }
                    Ok(Err(e)) => {
                        let message = format!("{e:#}");
                        error!(module = %inner.module, task = %task_name, error = %message, "Observed task failed");
                        TaskOutcome::Failed(message)
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(module = %inner.module, task = %task_name, panic = %message, "Observed task panicked");
                        TaskOutcome::Panicked(message)
                    }
                };
                inner.pending.remove(&id);
                sender.send_replace(Some(outcome));
            },
            &self.inner.handle,
        );

        TaskCompletion {
            name,
            outcome: receiver,
        }
    }

    async fn run_disposers(&self) -> usize {
        let disposers = std::mem::take(
            &mut *self
                .inner
                .disposers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if disposers.is_empty() {
            return 0;
        }

        let module = self.inner.module.clone();
        let ran = tokio::task::spawn_blocking(move || {
            let mut ran = 0;
            for (name, disposer) in disposers.into_iter().rev() {
                match std::panic::catch_unwind(AssertUnwindSafe(disposer)) {
                    Ok(()) => debug!(module = %module, service = %name, "Disposed"),
                    Err(panic) => error!(
                        module = %module,
                        service = %name,
                        panic = %panic_message(panic.as_ref()),
                        "Disposer panicked"
                    ),
                }
                ran += 1;
            }
            ran
        })
        .await;

        ran.unwrap_or_else(|e| {
            error!(module = %self.inner.module, error = %e, "Disposer pass did not complete");
            0
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, UnloadState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An in-progress service construction, see
/// [`UnloadCoordinator::begin_construction`]
pub struct ConstructionGuard {
    inner: Arc<Inner>,
    id: u64,
    _token: TaskTrackerToken,
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        self.inner.pending.remove(&self.id);
    }
}

impl std::fmt::Debug for ConstructionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructionGuard")
            .field("module", &self.inner.module)
            .field("id", &self.id)
            .finish()
    }
}

impl std::fmt::Debug for UnloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloadCoordinator")
            .field("module", &self.inner.module)
            .field("state", &self.state())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
