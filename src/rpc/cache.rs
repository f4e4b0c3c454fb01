//! Thread-safe cache of RPC client handles.
//!
//! # Design Decisions
//! - Entries are created lazily, at most once per URI: a lock-free lookup,
//!   then a single creation lock with a re-check
//! - The creation lock only guards creation; calls never take it
//! - Each cached client carries its own mutex, because transport handles are
//!   not safe for concurrent dispatch. Different URIs never contend

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use url::Url;

use crate::observability::metrics;

/// Builds transport clients for endpoints.
pub trait RpcConnector: Send + Sync + 'static {
    type Client: Send + 'static;

    fn connect(&self, uri: &Url) -> Self::Client;
}

/// A cached client plus the lock serialising calls through it.
pub struct LockedClient<T> {
    uri: String,
    inner: Mutex<T>,
}

impl<T> LockedClient<T> {
    fn new(uri: &str, client: T) -> Self {
        Self {
            uri: uri.to_string(),
            inner: Mutex::new(client),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Run `f` with exclusive use of the client.
    pub fn call<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let client = self.inner.lock();
        f(&client)
    }
}

impl<T> std::fmt::Debug for LockedClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedClient").field("uri", &self.uri).finish()
    }
}

/// Client handle returned by [`RpcClientCache`].
pub enum RpcHandle<T> {
    /// Shared, lock-wrapped client from the cache.
    Cached(Arc<LockedClient<T>>),
    /// Fresh client owned by the caller; no locking.
    Uncached(T),
}

impl<T> RpcHandle<T> {
    pub fn call<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self {
            RpcHandle::Cached(locked) => locked.call(f),
            RpcHandle::Uncached(client) => f(client),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, RpcHandle::Cached(_))
    }

    /// True if both handles dispatch through the same cached client.
    pub fn same_client(&self, other: &Self) -> bool {
        match (self, other) {
            (RpcHandle::Cached(a), RpcHandle::Cached(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> std::fmt::Debug for RpcHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcHandle::Cached(locked) => f.debug_tuple("Cached").field(locked).finish(),
            RpcHandle::Uncached(_) => f.write_str("Uncached(..)"),
        }
    }
}

/// Parse `uri` as an endpoint; `None` unless it has both a scheme and a host.
pub fn endpoint(uri: &str) -> Option<Url> {
    let parsed = Url::parse(uri).ok()?;
    let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());
    if parsed.scheme().is_empty() || !has_host {
        return None;
    }
    Some(parsed)
}

/// URI → lock-wrapped client, populated on first use.
pub struct RpcClientCache<C: RpcConnector> {
    connector: C,
    entries: DashMap<String, Arc<LockedClient<C::Client>>>,
    create: Mutex<()>,
}

impl<C: RpcConnector> RpcClientCache<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            entries: DashMap::new(),
            create: Mutex::new(()),
        }
    }

    /// Cached client for `uri`, or `None` if `uri` is not an endpoint.
    pub fn get_client(&self, uri: &str) -> Option<RpcHandle<C::Client>> {
        self.get_client_with(uri, true)
    }

    /// Client for `uri`. With `cache = false` a fresh, unshared client is
    /// built on every call.
    pub fn get_client_with(&self, uri: &str, cache: bool) -> Option<RpcHandle<C::Client>> {
        let parsed = endpoint(uri)?;
        if !cache {
            return Some(RpcHandle::Uncached(self.connector.connect(&parsed)));
        }

        if let Some(entry) = self.entries.get(uri) {
            return Some(RpcHandle::Cached(Arc::clone(entry.value())));
        }

        let _create = self.create.lock();
        // Another thread may have created it while we waited.
        if let Some(entry) = self.entries.get(uri) {
            return Some(RpcHandle::Cached(Arc::clone(entry.value())));
        }

        let client = Arc::new(LockedClient::new(uri, self.connector.connect(&parsed)));
        self.entries.insert(uri.to_string(), Arc::clone(&client));
        metrics::record_rpc_cache_size(self.entries.len());
        tracing::debug!(uri = %uri, entries = self.entries.len(), "Cached RPC client");
        Some(RpcHandle::Cached(client))
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached client. Handles already handed out stay usable.
    pub fn clear(&self) {
        let _create = self.create.lock();
        self.entries.clear();
        metrics::record_rpc_cache_size(0);
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: RpcConnector> std::fmt::Debug for RpcClientCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClientCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
