//! Worker thread tracking for join-on-shutdown.
//!
//! A worker holds a [`LivenessGuard`]; the coordinator only keeps a
//! [`TrackedThread`], which is a weak reference to the same record. When the
//! worker exits (normally or by panic) the guard is dropped, waking anyone
//! waiting in [`TrackedThread::join_timeout`].

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Liveness {
    finished: Mutex<bool>,
    cond: Condvar,
}

/// Held by the worker for as long as it runs.
#[derive(Debug)]
pub struct LivenessGuard {
    inner: Arc<Liveness>,
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        *self.inner.finished.lock() = true;
        self.inner.cond.notify_all();
    }
}

/// Weak handle to a worker thread that must be joined on shutdown.
#[derive(Debug, Clone)]
pub struct TrackedThread {
    name: Option<String>,
    liveness: Weak<Liveness>,
}

impl TrackedThread {
    /// Create a liveness guard for the worker and the tracking handle for the
    /// coordinator.
    pub fn pair(name: Option<String>) -> (LivenessGuard, TrackedThread) {
        let inner = Arc::new(Liveness::default());
        let tracked = TrackedThread {
            name,
            liveness: Arc::downgrade(&inner),
        };
        (LivenessGuard { inner }, tracked)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_alive(&self) -> bool {
        match self.liveness.upgrade() {
            Some(inner) => !*inner.finished.lock(),
            None => false,
        }
    }

    /// Wait up to `timeout` for the worker to finish.
    ///
    /// Returns `true` if the worker finished in time.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let Some(inner) = self.liveness.upgrade() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        let mut finished = inner.finished.lock();
        while !*finished {
            if inner.cond.wait_until(&mut finished, deadline).timed_out() {
                return *finished;
            }
        }
        true
    }
}

/// Tracked threads awaiting join. Guarded by the coordinator's lock.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: Vec<TrackedThread>,
}

impl ThreadRegistry {
    /// Drop terminated threads, then track `thread`.
    pub fn register(&mut self, thread: TrackedThread) {
        self.threads.retain(TrackedThread::is_alive);
        self.threads.push(thread);
    }

    pub fn snapshot(&self) -> Vec<TrackedThread> {
        self.threads.clone()
    }

    pub fn clear(&mut self) {
        self.threads.clear();
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_drop_marks_finished() {
        let (guard, tracked) = TrackedThread::pair(Some("worker".into()));
        assert!(tracked.is_alive());
        drop(guard);
        assert!(!tracked.is_alive());
        assert!(tracked.join_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_join_timeout_expires_for_stuck_worker() {
        let (_guard, tracked) = TrackedThread::pair(None);
        let start = Instant::now();
        assert!(!tracked.join_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_join_waits_for_worker_thread() {
        let (guard, tracked) = TrackedThread::pair(None);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(guard);
        });
        assert!(tracked.join_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_register_prunes_dead_threads() {
        let mut registry = ThreadRegistry::default();
        let (dead_guard, dead) = TrackedThread::pair(None);
        let (_live_guard, live) = TrackedThread::pair(None);
        registry.register(dead);
        drop(dead_guard);
        registry.register(live);
        assert_eq!(registry.len(), 1);
    }
}
