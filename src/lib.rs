//! Client node core: shutdown coordination, signal bridging, rate-limited
//! logging and RPC client caching.

pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod node;
pub mod observability;
pub mod rpc;

pub use config::schema::NodeConfig;
pub use lifecycle::{ShutdownCoordinator, SignalBridge};
pub use logging::RateLimitedLogger;
pub use node::{Node, NodeError};
pub use rpc::RpcClientCache;
