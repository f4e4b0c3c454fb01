//! Node lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a node. Ordered: a node only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// Created but not yet configured.
    Uninitialized = 0,
    /// Configured and serving.
    Running = 1,
    /// Shutdown has started; client and pre-shutdown hooks are running.
    ShutdownRequested = 2,
    /// Terminal state.
    ShutdownComplete = 3,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecycleState::Uninitialized,
            1 => LifecycleState::Running,
            2 => LifecycleState::ShutdownRequested,
            _ => LifecycleState::ShutdownComplete,
        }
    }

    /// True once shutdown has been requested (including after completion).
    pub fn is_shutdown_requested(self) -> bool {
        self >= LifecycleState::ShutdownRequested
    }

    /// True once the terminal state has been reached.
    pub fn is_shutdown(self) -> bool {
        self == LifecycleState::ShutdownComplete
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Running => "running",
            LifecycleState::ShutdownRequested => "shutdown_requested",
            LifecycleState::ShutdownComplete => "shutdown_complete",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding a [`LifecycleState`].
///
/// Writes go through `fetch_max`, so a stale writer can never move the state
/// backwards.
#[derive(Debug)]
pub struct AtomicLifecycle {
    raw: AtomicU8,
}

impl AtomicLifecycle {
    pub fn new(state: LifecycleState) -> Self {
        Self {
            raw: AtomicU8::new(state as u8),
        }
    }

    pub fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.raw.load(Ordering::Acquire))
    }

    /// Advance to `next` if it is later than the current state.
    ///
    /// Returns the state observed before the update.
    pub fn advance(&self, next: LifecycleState) -> LifecycleState {
        LifecycleState::from_u8(self.raw.fetch_max(next as u8, Ordering::AcqRel))
    }
}

impl Default for AtomicLifecycle {
    fn default() -> Self {
        Self::new(LifecycleState::Uninitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ordering() {
        assert!(LifecycleState::Uninitialized < LifecycleState::Running);
        assert!(LifecycleState::Running < LifecycleState::ShutdownRequested);
        assert!(LifecycleState::ShutdownRequested < LifecycleState::ShutdownComplete);
    }

    #[test]
    fn test_advance_never_regresses() {
        let cell = AtomicLifecycle::default();
        assert_eq!(cell.advance(LifecycleState::ShutdownComplete), LifecycleState::Uninitialized);
        assert_eq!(cell.advance(LifecycleState::Running), LifecycleState::ShutdownComplete);
        assert_eq!(cell.load(), LifecycleState::ShutdownComplete);
    }

    #[test]
    fn test_derived_flags() {
        assert!(!LifecycleState::Running.is_shutdown_requested());
        assert!(LifecycleState::ShutdownRequested.is_shutdown_requested());
        assert!(!LifecycleState::ShutdownRequested.is_shutdown());
        assert!(LifecycleState::ShutdownComplete.is_shutdown_requested());
        assert!(LifecycleState::ShutdownComplete.is_shutdown());
    }
}
