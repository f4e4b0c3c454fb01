//! Shutdown hook registries.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::observability::metrics;

/// Reason passed to hooks registered after shutdown already completed.
pub const ALREADY_SHUTDOWN: &str = "already shutdown";

/// Shutdown phase a hook belongs to. Phases run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Application hooks, run before any internal teardown. No arguments.
    Client,
    /// Run while the node still reports `!is_shutdown()`.
    Pre,
    /// Run after the node reports `is_shutdown()`.
    Normal,
}

impl HookPhase {
    /// Whether hooks of this phase receive the shutdown reason.
    pub fn takes_reason(self) -> bool {
        !matches!(self, HookPhase::Client)
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPhase::Client => "client",
            HookPhase::Pre => "pre",
            HookPhase::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// A shutdown callback. Each hook runs at most once.
pub enum Hook {
    /// Zero-argument hook for the client phase.
    Client(Box<dyn FnOnce() + Send + 'static>),
    /// Hook receiving the shutdown reason, for the pre and normal phases.
    WithReason(Box<dyn FnOnce(&str) + Send + 'static>),
}

impl Hook {
    pub fn client<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Hook::Client(Box::new(f))
    }

    pub fn with_reason<F>(f: F) -> Self
    where
        F: FnOnce(&str) + Send + 'static,
    {
        Hook::WithReason(Box::new(f))
    }

    /// Short name of the calling contract, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Hook::Client(_) => "zero-argument",
            Hook::WithReason(_) => "reason-argument",
        }
    }

    /// Whether this hook's calling contract matches `phase`.
    pub fn fits(&self, phase: HookPhase) -> bool {
        matches!(
            (self, phase.takes_reason()),
            (Hook::Client(_), false) | (Hook::WithReason(_), true)
        )
    }

    /// Run the hook, isolating panics.
    ///
    /// Returns `false` if the hook panicked. The failure is traced and counted;
    /// it never propagates to the caller.
    pub(crate) fn invoke(self, phase: HookPhase, reason: &str) -> bool {
        let outcome = match self {
            Hook::Client(f) => panic::catch_unwind(AssertUnwindSafe(f)),
            Hook::WithReason(f) => panic::catch_unwind(AssertUnwindSafe(move || f(reason))),
        };

        match outcome {
            Ok(()) => true,
            Err(payload) => {
                tracing::error!(
                    phase = %phase,
                    reason = %reason,
                    error = %panic_message(payload.as_ref()),
                    "shutdown hook failed"
                );
                metrics::record_hook_failure(phase);
                false
            }
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.kind()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// FIFO of hooks for one phase.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: VecDeque<Hook>,
    closed: bool,
}

impl HookRegistry {
    pub fn push(&mut self, hook: Hook) {
        self.hooks.push_back(hook);
    }

    /// Next hook in registration order.
    pub fn pop(&mut self) -> Option<Hook> {
        self.hooks.pop_front()
    }

    /// Mark the phase as finished. Anything still queued is discarded.
    pub fn close(&mut self) {
        self.hooks.clear();
        self.closed = true;
    }

    /// True once this registry's phase has run to completion.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// The three registries, guarded together by the coordinator's lock.
#[derive(Debug, Default)]
pub struct HookRegistries {
    client: HookRegistry,
    pre: HookRegistry,
    normal: HookRegistry,
}

impl HookRegistries {
    pub fn get_mut(&mut self, phase: HookPhase) -> &mut HookRegistry {
        match phase {
            HookPhase::Client => &mut self.client,
            HookPhase::Pre => &mut self.pre,
            HookPhase::Normal => &mut self.normal,
        }
    }

    pub fn get(&self, phase: HookPhase) -> &HookRegistry {
        match phase {
            HookPhase::Client => &self.client,
            HookPhase::Pre => &self.pre,
            HookPhase::Normal => &self.normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_hook_fits_phase() {
        assert!(Hook::client(|| {}).fits(HookPhase::Client));
        assert!(!Hook::client(|| {}).fits(HookPhase::Pre));
        assert!(Hook::with_reason(|_| {}).fits(HookPhase::Normal));
        assert!(!Hook::with_reason(|_| {}).fits(HookPhase::Client));
    }

    #[test]
    fn test_invoke_passes_reason() {
        let seen = Arc::new(parking_lot::Mutex::new(String::new()));
        let s = seen.clone();
        let ok = Hook::with_reason(move |reason| *s.lock() = reason.to_string())
            .invoke(HookPhase::Pre, "signal-SIGINT");
        assert!(ok);
        assert_eq!(seen.lock().as_str(), "signal-SIGINT");
    }

    #[test]
    fn test_invoke_isolates_panic() {
        let ok = Hook::client(|| panic!("boom")).invoke(HookPhase::Client, "test");
        assert!(!ok);
    }

    #[test]
    fn test_registry_is_fifo() {
        let order = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::default();
        for expected in 0..3 {
            let order = order.clone();
            registry.push(Hook::client(move || {
                assert_eq!(order.fetch_add(1, Ordering::SeqCst), expected);
            }));
        }
        assert_eq!(registry.len(), 3);
        while let Some(hook) = registry.pop() {
            assert!(hook.invoke(HookPhase::Client, ""));
        }
        registry.close();
        assert!(registry.is_closed());
        assert!(registry.is_empty());
        assert_eq!(order.load(Ordering::SeqCst), 3);
    }
}
