//! Round-robin key selection
//!
//! Membership is fixed at construction; only the cursor moves. The cursor is
//! an `AtomicUsize` bumped with `fetch_add`, so concurrent requests never lose
//! an increment. Strict fairness between racing callers is not guaranteed,
//! only that every key is visited in configured order.

use std::sync::atomic::{AtomicUsize, Ordering};

use common::Secret;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A key handed out for one attempt.
#[derive(Debug, Clone)]
pub struct SelectedKey {
    /// Zero-based position in the configured list.
    pub index: usize,
    pub key: Secret<String>,
}

impl SelectedKey {
    /// Non-secret identifier for logs, e.g. `key#2`.
    pub fn label(&self) -> String {
        format!("key#{}", self.index + 1)
    }
}

/// Ordered, non-empty set of API keys with a shared cursor.
pub struct KeyPool {
    keys: Vec<Secret<String>>,
    next_index: AtomicUsize,
}

impl KeyPool {
    /// Create a pool from the configured keys.
    ///
    /// Returns `PoolEmpty` if `keys` is empty; this is the only place emptiness
    /// is checked.
    pub fn new(keys: Vec<Secret<String>>) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::PoolEmpty);
        }
        info!(keys = keys.len(), "key pool initialized");
        Ok(Self {
            keys,
            next_index: AtomicUsize::new(0),
        })
    }

    /// Select the next key and advance the cursor.
    pub fn next(&self) -> SelectedKey {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        debug!(key = index + 1, "key selected");
        SelectedKey {
            index,
            key: self.keys[index].clone(),
        }
    }

    /// Number of configured keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false: construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPool")
            .field("keys", &self.keys.len())
            .field("next_index", &self.next_index.load(Ordering::Relaxed))
            .finish()
    }
}
