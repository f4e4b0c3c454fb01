//! ROSRPC service URIs.
//!
//! `rosrpc://host:port[/ignored]` names a TCP endpoint; `rosrpc://path` (no
//! colon) names a local unix-domain endpoint.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const ROSRPC: &str = "rosrpc://";

/// A service URI that could not be parsed. Always names the URI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterInvalid {
    #[error("Invalid protocol for ROS service URL: {0}")]
    Protocol(String),

    #[error("ROS service URL is invalid: {0}")]
    Malformed(String),
}

/// Parsed service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RosRpcAddress {
    Tcp { host: String, port: u16 },
    Local(String),
}

impl RosRpcAddress {
    pub fn is_local(&self) -> bool {
        matches!(self, RosRpcAddress::Local(_))
    }
}

impl fmt::Display for RosRpcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosRpcAddress::Tcp { host, port } => write!(f, "{}{}:{}", ROSRPC, host, port),
            RosRpcAddress::Local(path) => write!(f, "{}{}", ROSRPC, path),
        }
    }
}

impl FromStr for RosRpcAddress {
    type Err = ParameterInvalid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rosrpc_uri(s)
    }
}

/// Parse a ROSRPC URI.
///
/// The port is taken after the *last* colon so IPv6 hosts survive, and is cut
/// at the first `/` after that colon.
pub fn parse_rosrpc_uri(uri: &str) -> Result<RosRpcAddress, ParameterInvalid> {
    let rest = uri
        .strip_prefix(ROSRPC)
        .ok_or_else(|| ParameterInvalid::Protocol(uri.to_string()))?;

    let Some(colon) = rest.rfind(':') else {
        return Ok(RosRpcAddress::Local(rest.to_string()));
    };

    let addr = match rest[colon..].find('/') {
        Some(slash) => &rest[..colon + slash],
        None => rest,
    };
    let port = addr[colon + 1..]
        .parse::<u16>()
        .map_err(|_| ParameterInvalid::Malformed(uri.to_string()))?;

    Ok(RosRpcAddress::Tcp {
        host: addr[..colon].to_string(),
        port,
    })
}
