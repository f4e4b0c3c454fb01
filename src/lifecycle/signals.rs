//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT and SIGTERM
//! - Forward each delivery into `request_shutdown("signal-<NAME>")`
//! - Chain to the handler that was in place before the bridge
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe); the shutdown sequence itself
//!   blocks, so it runs on the blocking pool
//! - On install, the disposition already in place is read with `sigaction`,
//!   reset to the default and recorded in a per-signal table, before Tokio
//!   registers its own handler. The previous handler therefore runs from the
//!   bridge after shutdown was requested, never from the signal registry
//! - Only a `PreviousHandler::Handler` is invoked; default and ignore
//!   dispositions have nothing to call, and the application exits once it
//!   observes shutdown
//! - A chained handler reporting an interrupt is swallowed so forwarding can
//!   never take the bridge down mid-teardown

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::lifecycle::shutdown::ShutdownCoordinator;

/// Signals the bridge listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeSignal {
    Interrupt,
    Terminate,
}

impl NodeSignal {
    pub const ALL: [NodeSignal; 2] = [NodeSignal::Interrupt, NodeSignal::Terminate];

    pub fn name(self) -> &'static str {
        match self {
            NodeSignal::Interrupt => "SIGINT",
            NodeSignal::Terminate => "SIGTERM",
        }
    }

    /// Shutdown reason used when this signal triggers shutdown.
    pub fn shutdown_reason(self) -> String {
        format!("signal-{}", self.name())
    }

    #[cfg(unix)]
    fn raw(self) -> libc::c_int {
        match self {
            NodeSignal::Interrupt => libc::SIGINT,
            NodeSignal::Terminate => libc::SIGTERM,
        }
    }

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;
        match self {
            NodeSignal::Interrupt => SignalKind::interrupt(),
            NodeSignal::Terminate => SignalKind::terminate(),
        }
    }
}

impl fmt::Display for NodeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a chained handler that did not complete normally.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The handler raised an interrupt of its own (e.g. a Ctrl-C handler
    /// that aborts the current operation).
    #[error("interrupted")]
    Interrupted,

    #[error("{0}")]
    Failed(String),
}

/// Handler callable from the bridge after shutdown has been requested.
pub type ChainedHandler = Arc<dyn Fn(NodeSignal) -> Result<(), ChainError> + Send + Sync>;

/// What was installed for a signal before the bridge took over.
#[derive(Clone, Default)]
pub enum PreviousHandler {
    /// The OS default disposition.
    #[default]
    Default,
    /// The signal was being ignored.
    Ignore,
    /// A custom handler; invoked after shutdown is requested.
    Handler(ChainedHandler),
}

impl PreviousHandler {
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(NodeSignal) -> Result<(), ChainError> + Send + Sync + 'static,
    {
        PreviousHandler::Handler(Arc::new(f))
    }
}

impl fmt::Debug for PreviousHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviousHandler::Default => f.write_str("Default"),
            PreviousHandler::Ignore => f.write_str("Ignore"),
            PreviousHandler::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Errors installing the bridge.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("signal handlers must be installed from within a Tokio runtime")]
    NoRuntime,

    #[error("failed to install {signal} handler: {source}")]
    Install {
        signal: NodeSignal,
        #[source]
        source: std::io::Error,
    },
}

/// Adapter from OS signals to the shutdown coordinator.
pub struct SignalBridge {
    coordinator: Arc<ShutdownCoordinator>,
    chain: Mutex<HashMap<NodeSignal, PreviousHandler>>,
    installed: AtomicBool,
}

impl SignalBridge {
    pub fn new(coordinator: Arc<ShutdownCoordinator>) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            chain: Mutex::new(HashMap::new()),
            installed: AtomicBool::new(false),
        })
    }

    /// Record the handler the bridge replaces for `signal`.
    ///
    /// An entry recorded here before [`install_handlers`](Self::install_handlers)
    /// takes precedence over the disposition found in the process. Returns
    /// whatever was recorded before.
    pub fn chain(&self, signal: NodeSignal, previous: PreviousHandler) -> PreviousHandler {
        self.chain.lock().insert(signal, previous).unwrap_or_default()
    }

    pub fn previous(&self, signal: NodeSignal) -> PreviousHandler {
        self.chain.lock().get(&signal).cloned().unwrap_or_default()
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Start listening for SIGINT and SIGTERM. Calling it again is a no-op.
    pub fn install_handlers(self: &Arc<Self>) -> Result<(), SignalError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SignalError::NoRuntime)?;
        if self.installed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _enter = runtime.enter();

        for signal in NodeSignal::ALL {
            if let Err(e) = self.listen(&runtime, signal) {
                self.installed.store(false, Ordering::Release);
                return Err(e);
            }
        }

        tracing::info!("Signal handlers installed for SIGINT, SIGTERM");
        Ok(())
    }

    #[cfg(unix)]
    fn listen(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Handle,
        signal: NodeSignal,
    ) -> Result<(), SignalError> {
        let displaced =
            disposition::displace(signal).map_err(|source| SignalError::Install { signal, source })?;
        let recorded = self.chain.lock().entry(signal).or_insert(displaced).clone();
        tracing::debug!(signal = %signal, previous = ?recorded, "Recorded previous signal handler");

        let mut stream = tokio::signal::unix::signal(signal.kind())
            .map_err(|source| SignalError::Install { signal, source })?;
        let bridge = Arc::clone(self);
        runtime.spawn(async move {
            while stream.recv().await.is_some() {
                let bridge = Arc::clone(&bridge);
                if let Err(e) = tokio::task::spawn_blocking(move || bridge.handle(signal)).await {
                    tracing::error!(signal = %signal, error = %e, "Signal bridge task failed");
                }
            }
        });
        Ok(())
    }

    #[cfg(not(unix))]
    fn listen(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Handle,
        signal: NodeSignal,
    ) -> Result<(), SignalError> {
        if signal != NodeSignal::Interrupt {
            return Ok(());
        }
        let bridge = Arc::clone(self);
        runtime.spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let bridge = Arc::clone(&bridge);
                if let Err(e) = tokio::task::spawn_blocking(move || bridge.handle(signal)).await {
                    tracing::error!(signal = %signal, error = %e, "Signal bridge task failed");
                }
            }
        });
        Ok(())
    }

    /// The bridging handler: request shutdown, then forward to the previous
    /// handler.
    pub fn handle(&self, signal: NodeSignal) {
        tracing::info!(signal = %signal, "Shutdown signal received");
        self.coordinator.request_shutdown(&signal.shutdown_reason());

        if let PreviousHandler::Handler(handler) = self.previous(signal) {
            match handler(signal) {
                Ok(()) => {}
                Err(ChainError::Interrupted) => {
                    tracing::debug!(signal = %signal, "Chained handler interrupted, ignoring");
                }
                Err(e) => {
                    tracing::warn!(signal = %signal, error = %e, "Chained signal handler failed");
                }
            }
        }
    }
}

/// Process-wide capture of the dispositions the bridge displaces.
#[cfg(unix)]
mod disposition {
    use std::collections::HashMap;
    use std::io;
    use std::sync::OnceLock;

    use parking_lot::Mutex;

    use super::{NodeSignal, PreviousHandler};

    fn displaced() -> &'static Mutex<HashMap<NodeSignal, PreviousHandler>> {
        static DISPLACED: OnceLock<Mutex<HashMap<NodeSignal, PreviousHandler>>> = OnceLock::new();
        DISPLACED.get_or_init(|| Mutex::new(HashMap::new()))
    }

    /// Read the current disposition of `signal` and reset it to the default.
    ///
    /// Only the first call per signal touches the OS; Tokio's handler is
    /// installed right after it and must never be displaced. Later calls
    /// return the disposition captured by the first.
    pub(super) fn displace(signal: NodeSignal) -> io::Result<PreviousHandler> {
        let mut table = displaced().lock();
        if let Some(previous) = table.get(&signal) {
            return Ok(previous.clone());
        }

        let signum = signal.raw();
        // SAFETY: both structs are fully initialised (zeroed, empty mask) and
        // only read or written by `sigaction` for the duration of the call.
        let current = unsafe {
            let mut current: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(signum, std::ptr::null(), &mut current) != 0 {
                return Err(io::Error::last_os_error());
            }
            let mut reset: libc::sigaction = std::mem::zeroed();
            reset.sa_sigaction = libc::SIG_DFL;
            libc::sigemptyset(&mut reset.sa_mask);
            if libc::sigaction(signum, &reset, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
            current
        };

        let previous = classify(&current);
        table.insert(signal, previous.clone());
        Ok(previous)
    }

    fn classify(action: &libc::sigaction) -> PreviousHandler {
        let raw = action.sa_sigaction;
        if raw == libc::SIG_DFL {
            return PreviousHandler::Default;
        }
        if raw == libc::SIG_IGN {
            return PreviousHandler::Ignore;
        }

        let takes_info = action.sa_flags & libc::SA_SIGINFO != 0;
        PreviousHandler::handler(move |signal| {
            // SAFETY: `raw` is the handler address the kernel held for this
            // signal, with the calling convention selected by SA_SIGINFO.
            unsafe {
                if takes_info {
                    let handler: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void) =
                        std::mem::transmute(raw);
                    let mut info: libc::siginfo_t = std::mem::zeroed();
                    handler(signal.raw(), &mut info, std::ptr::null_mut());
                } else {
                    let handler: extern "C" fn(libc::c_int) = std::mem::transmute(raw);
                    handler(signal.raw());
                }
            }
            Ok(())
        })
    }
}

impl fmt::Debug for SignalBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBridge")
            .field("installed", &self.is_installed())
            .field("chain", &*self.chain.lock())
            .finish()
    }
}
