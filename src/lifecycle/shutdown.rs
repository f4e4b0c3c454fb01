//! Shutdown coordination for the node.
//!
//! # Sequence
//! ```text
//! request_shutdown(reason)
//!     state ← ShutdownRequested
//!     client hooks  ()        in registration order, panics isolated
//!     pre hooks     (reason)  node still reports !is_shutdown()
//!     state ← ShutdownComplete
//!     normal hooks  (reason)
//!     ── lock released ──
//!     join tracked threads (bounded per thread)
//!     settle pause
//! ```

use std::cell::RefCell;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::ReentrantMutex;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::ShutdownConfig;
use crate::lifecycle::hooks::{Hook, HookPhase, HookRegistries, ALREADY_SHUTDOWN};
use crate::lifecycle::state::{AtomicLifecycle, LifecycleState};
use crate::lifecycle::threads::{ThreadRegistry, TrackedThread};
use crate::observability::metrics;

/// Errors raised by the shutdown coordinator.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Hook calling contract does not match its phase.
    #[error("invalid {kind} hook for the {phase} shutdown phase")]
    InvalidHook { phase: HookPhase, kind: &'static str },

    /// The OS refused to spawn a tracked worker.
    #[error("failed to spawn tracked thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
struct Registries {
    hooks: HookRegistries,
    threads: ThreadRegistry,
    reason: Option<String>,
}

/// Owns lifecycle state, shutdown hooks and tracked worker threads.
///
/// Shared via `Arc` by everything that needs to observe or trigger shutdown.
pub struct ShutdownCoordinator {
    state: AtomicLifecycle,
    registries: ReentrantMutex<RefCell<Registries>>,
    state_tx: watch::Sender<LifecycleState>,
    finished_tx: watch::Sender<bool>,
    join_timeout: Duration,
    settle: Duration,
}

impl ShutdownCoordinator {
    /// Create a new coordinator in the `Uninitialized` state.
    pub fn new(config: &ShutdownConfig) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Uninitialized);
        let (finished_tx, _) = watch::channel(false);
        Self {
            state: AtomicLifecycle::default(),
            registries: ReentrantMutex::new(RefCell::new(Registries::default())),
            state_tx,
            finished_tx,
            join_timeout: config.join_timeout(),
            settle: config.settle(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    /// True once shutdown has completed (normal hooks may still be running).
    pub fn is_shutdown(&self) -> bool {
        self.state.load().is_shutdown()
    }

    /// True from the moment shutdown is requested, including after completion.
    pub fn is_shutdown_requested(&self) -> bool {
        self.state.load().is_shutdown_requested()
    }

    /// Mark the node as configured.
    pub fn set_initialized(&self) {
        self.transition(LifecycleState::Running);
    }

    pub fn is_initialized(&self) -> bool {
        self.state.load() >= LifecycleState::Running
    }

    /// Reason given to the first successful `request_shutdown`, if any.
    pub fn shutdown_reason(&self) -> Option<String> {
        self.registries.lock().borrow().reason.clone()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Wait until the shutdown sequence has fully run, joins included.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.finished_tx.subscribe();
        // The sender lives in `self`, so this only errors if `self` is gone.
        let _ = rx.wait_for(|finished| *finished).await;
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.advance(next);
        if previous < next {
            tracing::debug!(from = %previous, to = %next, "Lifecycle transition");
            self.state_tx.send_replace(next);
        }
    }

    /// Register a hook for `phase`.
    ///
    /// Fails with [`ShutdownError::InvalidHook`] if the hook's calling contract
    /// does not match the phase. If the phase can no longer run (shutdown
    /// already completed, or the phase already finished during an in-flight
    /// shutdown) the hook is invoked immediately instead of being queued.
    pub fn register_hook(&self, phase: HookPhase, hook: Hook) -> Result<(), ShutdownError> {
        if !hook.fits(phase) {
            return Err(ShutdownError::InvalidHook {
                phase,
                kind: hook.kind(),
            });
        }

        if self.is_shutdown() {
            tracing::warn!(phase = %phase, "shutdown hook registered after shutdown");
            hook.invoke(phase, ALREADY_SHUTDOWN);
            return Ok(());
        }

        let late = {
            let guard = self.registries.lock();
            let mut registries = guard.borrow_mut();
            if self.is_shutdown() {
                Some((hook, ALREADY_SHUTDOWN.to_string()))
            } else if registries.hooks.get(phase).is_closed() {
                let reason = registries.reason.clone().unwrap_or_default();
                Some((hook, reason))
            } else {
                registries.hooks.get_mut(phase).push(hook);
                None
            }
        };

        // Late hooks run with the registry lock released.
        if let Some((hook, reason)) = late {
            tracing::warn!(phase = %phase, "shutdown hook registered after its phase ran");
            hook.invoke(phase, &reason);
        }
        Ok(())
    }

    /// Hook run before any internal teardown.
    pub fn add_client_shutdown_hook<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.register_typed(HookPhase::Client, Hook::client(f));
    }

    /// Hook run with the reason while the node still reports `!is_shutdown()`.
    pub fn add_preshutdown_hook<F>(&self, f: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        self.register_typed(HookPhase::Pre, Hook::with_reason(f));
    }

    /// Hook run with the reason once the node reports `is_shutdown()`.
    pub fn add_shutdown_hook<F>(&self, f: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        self.register_typed(HookPhase::Normal, Hook::with_reason(f));
    }

    fn register_typed(&self, phase: HookPhase, hook: Hook) {
        if let Err(e) = self.register_hook(phase, hook) {
            // Constructors above always produce a hook matching the phase.
            tracing::error!(error = %e, "typed hook registration rejected");
        }
    }

    /// Track a worker thread so shutdown waits for it.
    ///
    /// Terminated threads are pruned first. No-op once shutdown completed.
    pub fn register_thread(&self, thread: TrackedThread) {
        if self.is_shutdown() {
            return;
        }
        let guard = self.registries.lock();
        if self.is_shutdown() {
            return;
        }
        guard.borrow_mut().threads.register(thread);
    }

    /// Spawn a named worker thread that shutdown will join.
    pub fn spawn_tracked<F, T>(&self, name: &str, f: F) -> Result<JoinHandle<T>, ShutdownError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (guard, tracked) = TrackedThread::pair(Some(name.to_string()));
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = guard;
                f()
            })
            .map_err(|source| ShutdownError::ThreadSpawn {
                name: name.to_string(),
                source,
            })?;
        self.register_thread(tracked);
        Ok(handle)
    }

    /// Number of tracked threads currently registered.
    pub fn tracked_threads(&self) -> usize {
        self.registries.lock().borrow().threads.len()
    }

    /// Run the shutdown sequence. Only the first call does anything.
    pub fn request_shutdown(&self, reason: &str) {
        tracing::info!(reason = %reason, "signal_shutdown [{}]", reason);
        if self.is_shutdown_requested() {
            return;
        }

        let started = Instant::now();
        let threads = {
            let guard = self.registries.lock();
            if self.is_shutdown_requested() {
                return;
            }
            self.transition(LifecycleState::ShutdownRequested);
            guard.borrow_mut().reason = Some(reason.to_string());

            self.run_phase(&guard, HookPhase::Client, reason);
            self.run_phase(&guard, HookPhase::Pre, reason);

            // Pre hooks ran with services still available; now flip the flag.
            self.transition(LifecycleState::ShutdownComplete);
            self.run_phase(&guard, HookPhase::Normal, reason);

            let snapshot = guard.borrow().threads.snapshot();
            snapshot
        };

        self.join_threads(&threads);
        self.registries.lock().borrow_mut().threads.clear();

        std::thread::sleep(self.settle);

        metrics::record_shutdown_duration(started.elapsed());
        tracing::info!(reason = %reason, elapsed = ?started.elapsed(), "Shutdown complete");
        self.finished_tx.send_replace(true);
    }

    fn run_phase(&self, registries: &RefCell<Registries>, phase: HookPhase, reason: &str) {
        let queued = registries.borrow().hooks.get(phase).len();
        tracing::debug!(phase = %phase, queued, "Running shutdown phase");

        // Pop one at a time without holding the borrow, so a hook can register
        // further hooks for this phase and still have them run.
        let mut ran = 0usize;
        loop {
            let next = registries.borrow_mut().hooks.get_mut(phase).pop();
            let Some(hook) = next else { break };
            hook.invoke(phase, reason);
            ran += 1;
        }
        registries.borrow_mut().hooks.get_mut(phase).close();
        tracing::debug!(phase = %phase, hooks = ran, "Shutdown phase finished");
    }

    fn join_threads(&self, threads: &[TrackedThread]) {
        for thread in threads {
            if !thread.is_alive() {
                continue;
            }
            if !thread.join_timeout(self.join_timeout) {
                tracing::warn!(
                    thread = thread.name().unwrap_or("<unnamed>"),
                    timeout = ?self.join_timeout,
                    "Tracked thread did not exit in time, abandoning"
                );
                metrics::record_thread_abandoned();
            }
        }
    }

    /// Guard that requests shutdown with reason `"atexit"` when dropped.
    pub fn exit_backstop(self: &Arc<Self>) -> ExitBackstop {
        ExitBackstop {
            coordinator: Arc::clone(self),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(&ShutdownConfig::default())
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("state", &self.state.load())
            .field("join_timeout", &self.join_timeout)
            .field("settle", &self.settle)
            .finish()
    }
}

/// Process-exit backstop: runs the shutdown sequence when dropped, so hooks
/// run even when no signal arrived and nobody requested shutdown explicitly.
#[must_use = "the backstop fires when dropped"]
pub struct ExitBackstop {
    coordinator: Arc<ShutdownCoordinator>,
}

impl Drop for ExitBackstop {
    fn drop(&mut self) {
        self.coordinator.request_shutdown("atexit");
    }
}

impl std::fmt::Debug for ExitBackstop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitBackstop").finish()
    }
}
