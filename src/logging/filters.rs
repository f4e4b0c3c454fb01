//! State tables behind the rate-limit policies.
//!
//! Each table is shared by every call site using the corresponding policy and
//! carries its own synchronisation.

use std::collections::HashMap;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::logging::callsite::Fingerprint;

/// Last emission time per call site.
#[derive(Debug, Default)]
pub struct ThrottleTable {
    last: Mutex<HashMap<Fingerprint, Duration>>,
}

impl ThrottleTable {
    /// Decide whether `key` may emit at `now`, recording `now` if so.
    ///
    /// A stored timestamp later than `now` means the clock went backwards;
    /// every entry is then stale, so the whole table is discarded.
    pub fn check(&self, key: Fingerprint, period: Duration, now: Duration) -> bool {
        let mut last = self.last.lock();
        match last.get(&key).copied() {
            None => {
                last.insert(key, now);
                true
            }
            Some(prev) if prev > now => {
                tracing::debug!(?prev, ?now, "Clock moved backwards, resetting throttle table");
                last.clear();
                last.insert(key, now);
                true
            }
            Some(prev) if now - prev > period => {
                last.insert(key, now);
                true
            }
            Some(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.last.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.lock().is_empty()
    }
}

/// Digest of the last emitted message per call site.
#[derive(Debug, Default)]
pub struct IdenticalTable {
    last: DashMap<Fingerprint, [u8; 32]>,
}

impl IdenticalTable {
    /// True (and records the new digest) if `message` differs from the last
    /// message recorded for `key`.
    ///
    /// `message` is the final text after format arguments were applied, so
    /// one template with changing arguments counts as changing messages.
    pub fn check(&self, key: Fingerprint, message: &str) -> bool {
        let digest: [u8; 32] = Sha256::digest(message.as_bytes()).into();
        match self.last.insert(key, digest) {
            Some(previous) => previous != digest,
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// Call sites that have already emitted. Never pruned.
#[derive(Debug, Default)]
pub struct OnceSet {
    seen: DashSet<Fingerprint>,
}

impl OnceSet {
    /// True only the first time `key` is seen.
    pub fn check(&self, key: Fingerprint) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
