//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a node.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Node identity.
    pub node: NodeSection,

    /// Shutdown sequencing.
    pub shutdown: ShutdownConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// RPC client settings.
    pub rpc: RpcConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,
}

/// Node identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeSection {
    /// Node name, used in logs and as the default tracing field.
    pub name: String,

    /// Master XML-RPC URI (e.g., "http://localhost:11311/").
    pub master_uri: Option<String>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: "rosnode".to_string(),
            master_uri: None,
        }
    }
}

/// Shutdown sequencing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for each tracked thread, in seconds.
    pub join_timeout_secs: f64,

    /// Pause after joining threads, in milliseconds.
    pub settle_ms: u64,
}

impl ShutdownConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.join_timeout_secs).unwrap_or(Duration::from_secs(5))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            join_timeout_secs: 5.0,
            settle_ms: 100,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directives; `RUST_LOG` overrides.
    pub filter: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "rosnode_core=info,rosnode=info,rosout=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// RPC client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

/// Metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
