//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Node::new → coordinator (Uninitialized) → set_initialized (Running)
//!
//! Shutdown (shutdown.rs):
//!     request_shutdown → client hooks → pre hooks → ShutdownComplete
//!         → normal hooks → join tracked threads → settle
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → request_shutdown("signal-<NAME>") → previous handler
//!
//! Exit backstop (shutdown.rs):
//!     ExitBackstop dropped → request_shutdown("atexit")
//! ```
//!
//! # Design Decisions
//! - State only moves forward; reads are lock-free
//! - One reentrant lock guards state transitions and all hook registries
//! - Hooks are isolated from each other: a panicking hook never stops shutdown
//! - Thread joins are bounded: a stuck worker is abandoned, not waited on

pub mod hooks;
pub mod shutdown;
pub mod signals;
pub mod state;
pub mod threads;

pub use hooks::{Hook, HookPhase};
pub use shutdown::{ExitBackstop, ShutdownCoordinator, ShutdownError};
pub use signals::{ChainError, NodeSignal, PreviousHandler, SignalBridge, SignalError};
pub use state::LifecycleState;
pub use threads::{LivenessGuard, TrackedThread};
