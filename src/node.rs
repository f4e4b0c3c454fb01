//! Node context: one instance of each core service, shared by reference.
//!
//! # Responsibilities
//! - Own the shutdown coordinator, signal bridge, logger and RPC cache
//! - Move the lifecycle to `Running` once every service exists
//! - Resolve the configured master URI through the RPC cache

use std::sync::Arc;

use thiserror::Error;

use crate::config::NodeConfig;
use crate::lifecycle::{ExitBackstop, ShutdownCoordinator, SignalBridge, SignalError};
use crate::logging::RateLimitedLogger;
use crate::rpc::{HttpRpcConnector, RpcClientCache, RpcConnector, RpcError, RpcHandle};

/// Errors raised while assembling a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Failed to build RPC transport: {0}")]
    Rpc(#[from] RpcError),

    #[error("Failed to install signal handlers: {0}")]
    Signal(#[from] SignalError),
}

/// Service context handed to everything that runs inside the node.
pub struct Node<C: RpcConnector = HttpRpcConnector> {
    config: NodeConfig,
    coordinator: Arc<ShutdownCoordinator>,
    signals: Arc<SignalBridge>,
    logger: Arc<RateLimitedLogger>,
    rpc: Arc<RpcClientCache<C>>,
}

impl Node<HttpRpcConnector> {
    /// Build a node using the HTTP transport.
    ///
    /// The transport is blocking: call this from a plain thread or
    /// `spawn_blocking`, never directly on an async worker.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let connector = HttpRpcConnector::new(&config.rpc)?;
        Ok(Self::with_connector(config, connector))
    }
}

impl<C: RpcConnector> Node<C> {
    pub fn with_connector(config: NodeConfig, connector: C) -> Self {
        Self::with_logger(config, connector, Arc::new(RateLimitedLogger::new()))
    }

    /// Build a node around an existing logger (e.g. one on a manual clock).
    pub fn with_logger(config: NodeConfig, connector: C, logger: Arc<RateLimitedLogger>) -> Self {
        let coordinator = Arc::new(ShutdownCoordinator::new(&config.shutdown));
        let signals = SignalBridge::new(Arc::clone(&coordinator));
        let node = Self {
            coordinator,
            signals,
            logger,
            rpc: Arc::new(RpcClientCache::new(connector)),
            config,
        };
        node.coordinator.set_initialized();
        tracing::info!(
            node = %node.config.node.name,
            master_uri = node.config.node.master_uri.as_deref().unwrap_or("<unset>"),
            "Node initialized"
        );
        node
    }

    pub fn name(&self) -> &str {
        &self.config.node.name
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    pub fn signals(&self) -> &Arc<SignalBridge> {
        &self.signals
    }

    pub fn logger(&self) -> &Arc<RateLimitedLogger> {
        &self.logger
    }

    pub fn rpc(&self) -> &Arc<RpcClientCache<C>> {
        &self.rpc
    }

    /// Install SIGINT/SIGTERM handling. Requires a Tokio runtime.
    pub fn install_signal_handlers(&self) -> Result<(), NodeError> {
        self.signals.install_handlers()?;
        Ok(())
    }

    /// Guard that requests shutdown with reason `"atexit"` when dropped.
    pub fn exit_backstop(&self) -> ExitBackstop {
        self.coordinator.exit_backstop()
    }

    pub fn is_shutdown(&self) -> bool {
        self.coordinator.is_shutdown()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.coordinator.is_shutdown_requested()
    }

    /// Cached client for the configured master, if one is set and valid.
    pub fn master(&self) -> Option<RpcHandle<C::Client>> {
        let uri = self.config.node.master_uri.as_deref()?;
        self.rpc.get_client(uri)
    }
}

impl<C: RpcConnector> std::fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.config.node.name)
            .field("state", &self.coordinator.state())
            .field("rpc", &self.rpc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use url::Url;

    struct EchoConnector;

    impl RpcConnector for EchoConnector {
        type Client = String;

        fn connect(&self, uri: &Url) -> String {
            uri.to_string()
        }
    }

    fn config(master_uri: Option<&str>) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.node.name = "talker".to_string();
        config.node.master_uri = master_uri.map(str::to_string);
        config.shutdown.settle_ms = 0;
        config
    }

    #[test]
    fn test_new_node_is_running() {
        let node = Node::with_connector(config(None), EchoConnector);
        assert_eq!(node.coordinator().state(), LifecycleState::Running);
        assert_eq!(node.name(), "talker");
        assert!(!node.is_shutdown_requested());
    }

    #[test]
    fn test_master_client_is_cached() {
        let node = Node::with_connector(config(Some("http://localhost:11311/")), EchoConnector);
        let a = node.master().unwrap();
        let b = node.master().unwrap();
        assert!(a.same_client(&b));
        assert_eq!(a.call(|uri| uri.clone()), "http://localhost:11311/");
    }

    #[test]
    fn test_master_unset() {
        let node = Node::with_connector(config(None), EchoConnector);
        assert!(node.master().is_none());
        assert!(node.rpc().is_empty());
    }

    #[test]
    fn test_exit_backstop_requests_shutdown() {
        let node = Node::with_connector(config(None), EchoConnector);
        drop(node.exit_backstop());
        assert!(node.is_shutdown());
        assert_eq!(node.coordinator().shutdown_reason().as_deref(), Some("atexit"));
    }
}
