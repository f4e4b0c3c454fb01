//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. All problems are reported at
//! once rather than stopping at the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::NodeConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let name = config.node.name.trim();
    if name.is_empty() {
        errors.push(ValidationError::new("node.name", "must not be empty"));
    } else if name.chars().any(char::is_whitespace) {
        errors.push(ValidationError::new("node.name", "must not contain whitespace"));
    }

    if let Some(uri) = &config.node.master_uri {
        if let Err(e) = url::Url::parse(uri) {
            errors.push(ValidationError::new(
                "node.master_uri",
                format!("invalid URI '{}': {}", uri, e),
            ));
        }
    }

    let join = config.shutdown.join_timeout_secs;
    if !join.is_finite() || join <= 0.0 {
        errors.push(ValidationError::new(
            "shutdown.join_timeout_secs",
            "must be a positive number of seconds",
        ));
    }

    if config.rpc.request_timeout_secs == 0 {
        errors.push(ValidationError::new("rpc.request_timeout_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
