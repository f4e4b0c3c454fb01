//! Blocking HTTP transport for cached RPC clients.
//!
//! # Responsibilities
//! - Build one pooled `reqwest` client from the `[rpc]` config section
//! - Hand out cheap per-endpoint clients that share the pool
//! - Surface transport failures and non-success statuses as [`RpcError`]
//!
//! Callers must stay off async worker threads: the blocking client spins up its
//! own runtime internally.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::RpcConfig;
use crate::rpc::cache::RpcConnector;

/// Errors from an RPC round trip.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection, timeout or body decoding failure.
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("RPC endpoint {uri} returned {status}")]
    Status { status: StatusCode, uri: String },
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Connector producing [`HttpRpcClient`]s over one shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpRpcConnector {
    http: Client,
}

impl HttpRpcConnector {
    pub fn new(config: &RpcConfig) -> RpcResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http })
    }
}

impl RpcConnector for HttpRpcConnector {
    type Client = HttpRpcClient;

    fn connect(&self, uri: &Url) -> HttpRpcClient {
        HttpRpcClient {
            endpoint: uri.clone(),
            http: self.http.clone(),
        }
    }
}

/// Client bound to a single endpoint.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    endpoint: Url,
    http: Client,
}

impl HttpRpcClient {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST an XML-RPC body and return the response text.
    pub fn post(&self, body: impl Into<String>) -> RpcResult<String> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/xml")
            .body(body.into())
            .send()?;
        let response = self.check(response)?;
        Ok(response.text()?)
    }

    /// POST a JSON payload and decode the JSON reply.
    pub fn post_json(&self, payload: &serde_json::Value) -> RpcResult<serde_json::Value> {
        let response = self.http.post(self.endpoint.clone()).json(payload).send()?;
        let response = self.check(response)?;
        Ok(response.json()?)
    }

    fn check(&self, response: reqwest::blocking::Response) -> RpcResult<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            tracing::warn!(uri = %self.endpoint, status = %status, "RPC call rejected");
            Err(RpcError::Status {
                status,
                uri: self.endpoint.to_string(),
            })
        }
    }
}
