//! Concurrency-safe lazy cache for expensive resource handles.
//!
//! [`ResourceCache`] guarantees at most one concurrent load per key while
//! allowing loads of *different* keys to proceed without blocking each other.
//! The discipline is double-checked locking: a lock-free read path when the
//! key is present, and on a miss a per-key async lock (created under a
//! short-lived lock over the key→lock map) with a re-check after acquisition,
//! so a thread that waited behind a loader reuses its result instead of
//! loading again.
//!
//! The cache exclusively owns every handle it creates; callers receive an
//! `Arc` clone whose lifetime is the process lifetime. There is no per-entry
//! eviction or TTL; [`ResourceCache::clear`] exists for tests and
//! operational resets only.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::errors::IngestError;

/// Keyed lazy-initialization cache with per-key load locking.
pub struct ResourceCache<T: ?Sized> {
    entries: RwLock<FxHashMap<String, Arc<T>>>,
    key_locks: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<T: ?Sized> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> ResourceCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            key_locks: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns the cached handle for `key`, if present. Never blocks on a
    /// load in progress.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.read().get(key).cloned()
    }

    /// Returns the handle for `key`, loading it with `load` on first use.
    ///
    /// Concurrent callers for the same key await the single in-flight load;
    /// callers for other keys proceed independently. A failed load is not
    /// cached; the error propagates and the next caller retries.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<Arc<T>, IngestError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, IngestError>>,
    {
        // Fast path: no locking beyond the read guard.
        if let Some(handle) = self.get(key) {
            debug!(key, "resource cache hit");
            return Ok(handle);
        }

        let key_lock = self.key_lock(key);
        let _guard = key_lock.lock().await;

        // Re-check: another task may have finished loading while we waited.
        if let Some(handle) = self.get(key) {
            debug!(key, "resource loaded by concurrent task");
            return Ok(handle);
        }

        info!(key, "loading resource");
        let started = std::time::Instant::now();
        let handle = load().await?;
        info!(key, elapsed = ?started.elapsed(), "resource loaded");

        self.entries
            .write()
            .insert(key.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Drops all cached entries. Per-key locks are retained so loads already
    /// queued keep their mutual exclusion.
    pub fn clear(&self) {
        self.entries.write().clear();
        info!("resource cache cleared");
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Keys currently cached, in arbitrary order.
    pub fn cached_keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
