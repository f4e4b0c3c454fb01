//! RPC client plumbing.
//!
//! # Data Flow
//! ```text
//! get_client(uri)
//!     → cache.rs (lookup, or create once under the creation lock)
//!     → RpcHandle::Cached(Arc<LockedClient>)
//!     → handle.call(|client| client.post(..)) serialised per URI
//! ```
//!
//! `uri.rs` parses `rosrpc://` service addresses for the service layer.

pub mod cache;
pub mod client;
pub mod uri;

pub use cache::{endpoint, LockedClient, RpcClientCache, RpcConnector, RpcHandle};
pub use client::{HttpRpcClient, HttpRpcConnector, RpcError, RpcResult};
pub use uri::{parse_rosrpc_uri, ParameterInvalid, RosRpcAddress, ROSRPC};
