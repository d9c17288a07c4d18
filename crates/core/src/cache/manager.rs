//! In-memory cache layered over the [`EntryStore`].
//!
//! The manager owns expiry, capacity eviction, the content-hash index and
//! startup preloading. All state lives behind one async mutex so memory and
//! disk change together.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::hash::content_digest;
use super::payload::{AnalysisPayload, CacheRecord};
use super::store::EntryStore;
use crate::Error;
use crate::clock::{Clock, SystemClock};

/// Cache limits and preload behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum number of entries kept in memory after a write.
    pub max_entries: usize,
    /// Age at which an entry expires.
    pub ttl: Duration,
    pub preload_enabled: bool,
    /// Number of most recent disk entries loaded at startup.
    pub preload_count: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_entries: 100, ttl: Duration::from_secs(1440 * 60), preload_enabled: false, preload_count: 20 }
    }
}

/// Entry counts by expiry status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    created_at: DateTime<Utc>,
    payload: AnalysisPayload,
    /// Insertion order, breaks eviction ties between equal timestamps.
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    memory_index: HashMap<String, CacheEntry>,
    content_index: HashMap<String, String>,
    preloaded: HashSet<String>,
    next_seq: u64,
}

impl CacheState {
    fn insert(&mut self, key: &str, created_at: DateTime<Utc>, payload: AnalysisPayload) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.memory_index.insert(key.to_string(), CacheEntry { created_at, payload, seq });
    }

    fn unindex(&mut self, key: &str) {
        self.content_index.retain(|_, owner| owner != key);
    }
}

#[derive(Debug)]
struct CacheInner {
    store: EntryStore,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

/// Cache of analysis payloads keyed by normalized URL.
#[derive(Debug, Clone)]
pub struct CacheManager {
    inner: Arc<CacheInner>,
}

impl CacheManager {
    /// Create a manager over `store`, preloading recent entries if enabled.
    pub async fn new(store: EntryStore, settings: CacheSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock)).await
    }

    /// Create a manager with an explicit time source.
    pub async fn with_clock(store: EntryStore, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        let preload = settings.preload_enabled;
        let manager =
            Self { inner: Arc::new(CacheInner { store, settings, clock, state: Mutex::new(CacheState::default()) }) };
        if preload {
            manager.preload().await;
        }
        manager
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    pub fn store(&self) -> &EntryStore {
        &self.inner.store
    }

    fn is_fresh(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - created_at).to_std() {
            Ok(age) => age < self.inner.settings.ttl,
            // Written "in the future" (clock skew): not yet aged.
            Err(_) => true,
        }
    }

    /// Look up a payload by key.
    ///
    /// Memory is consulted first, then disk. Expired entries are deleted
    /// and reported as absent.
    pub async fn get(&self, key: &str) -> Option<AnalysisPayload> {
        let mut state = self.inner.state.lock().await;
        self.get_locked(&mut state, key).await
    }

    async fn get_locked(&self, state: &mut CacheState, key: &str) -> Option<AnalysisPayload> {
        let now = self.inner.clock.now();

        if let Some(entry) = state.memory_index.get(key) {
            if self.is_fresh(entry.created_at, now) {
                tracing::debug!(key, "cache hit");
                return Some(entry.payload.clone());
            }
            tracing::debug!(key, "cache entry expired");
            self.remove_locked(state, key).await;
            return None;
        }

        let record = self.inner.store.read(key).await?;
        let created_at = record.created_at();
        if !self.is_fresh(created_at, now) {
            tracing::debug!(key, "disk cache entry expired");
            self.remove_locked(state, key).await;
            return None;
        }

        tracing::debug!(key, "cache hit from disk");
        if let Some(digest) = record.content_hash {
            state.content_index.insert(digest, key.to_string());
        }
        state.insert(key, created_at, record.result.clone());
        Some(record.result)
    }

    /// Look up a payload previously stored with identical extracted text.
    ///
    /// Hits are subject to the same expiry as [`CacheManager::get`].
    pub async fn get_by_content_hash(&self, content: &str) -> Option<AnalysisPayload> {
        let digest = content_digest(content);
        let mut state = self.inner.state.lock().await;
        let key = state.content_index.get(&digest).cloned()?;
        tracing::debug!(key, "content hash matched");
        self.get_locked(&mut state, &key).await
    }

    /// Store a payload under `key`, replacing any previous entry.
    ///
    /// The entry is kept in memory even when persisting fails; the write
    /// error is returned so the caller can decide how to proceed.
    pub async fn set(&self, key: &str, payload: AnalysisPayload) -> Result<(), Error> {
        self.store_entry(key, payload, None).await
    }

    /// Store a payload and index it by the digest of `content`.
    pub async fn set_with_content_hash(&self, key: &str, payload: AnalysisPayload, content: &str) -> Result<(), Error> {
        self.store_entry(key, payload, Some(content_digest(content))).await
    }

    async fn store_entry(&self, key: &str, payload: AnalysisPayload, digest: Option<String>) -> Result<(), Error> {
        let mut state = self.inner.state.lock().await;
        let now = self.inner.clock.now();

        state.unindex(key);
        if let Some(digest) = &digest {
            state.content_index.insert(digest.clone(), key.to_string());
        }
        let record = CacheRecord::new(key, now, payload.clone(), digest);
        state.insert(key, now, payload);

        let written = self.inner.store.write(&record).await;
        if let Err(e) = &written {
            tracing::warn!(key, error = %e, "cache entry kept in memory only");
        }

        self.cleanup_locked(&mut state, now).await;
        written
    }

    /// Remove an entry from memory, disk and both indexes.
    pub async fn delete(&self, key: &str) {
        let mut state = self.inner.state.lock().await;
        self.remove_locked(&mut state, key).await;
    }

    async fn remove_locked(&self, state: &mut CacheState, key: &str) {
        state.memory_index.remove(key);
        state.preloaded.remove(key);
        state.unindex(key);
        if let Err(e) = self.inner.store.delete(key).await {
            tracing::warn!(key, error = %e, "failed to delete cache files");
        }
    }

    /// Drop every entry in memory and on disk.
    pub async fn clear(&self) -> Result<(), Error> {
        let mut state = self.inner.state.lock().await;
        state.memory_index.clear();
        state.content_index.clear();
        state.preloaded.clear();
        let removed = self.inner.store.clear_all().await?;
        tracing::info!(removed, "cache cleared");
        Ok(())
    }

    /// Expire stale entries, then evict the oldest beyond capacity.
    async fn cleanup_locked(&self, state: &mut CacheState, now: DateTime<Utc>) {
        let expired: Vec<String> = state
            .memory_index
            .iter()
            .filter(|(_, entry)| !self.is_fresh(entry.created_at, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove_locked(state, key).await;
        }

        let max = self.inner.settings.max_entries;
        if state.memory_index.len() <= max {
            return;
        }

        let mut by_age: Vec<(DateTime<Utc>, u64, String)> = state
            .memory_index
            .iter()
            .map(|(key, entry)| (entry.created_at, entry.seq, key.clone()))
            .collect();
        by_age.sort();

        let excess = state.memory_index.len() - max;
        for (_, _, key) in by_age.into_iter().take(excess) {
            tracing::debug!(key, "evicting oldest cache entry");
            self.remove_locked(state, &key).await;
        }
    }

    /// Load the most recently written disk entries into memory.
    async fn preload(&self) -> usize {
        let keys = match self.inner.store.list_recent(self.inner.settings.preload_count).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "cache preload skipped");
                return 0;
            }
        };

        let mut state = self.inner.state.lock().await;
        let mut loaded = 0;
        // Oldest first so insertion order matches write order.
        for key in keys.iter().rev() {
            let Some(record) = self.inner.store.read(key).await else {
                continue;
            };
            if let Some(digest) = record.content_hash.clone() {
                state.content_index.insert(digest, key.clone());
            }
            state.insert(key, record.created_at(), record.result);
            state.preloaded.insert(key.clone());
            loaded += 1;
        }

        tracing::info!(loaded, "preloaded cache entries");
        loaded
    }

    /// Count entries by expiry status without modifying anything.
    pub async fn get_stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        let valid = state
            .memory_index
            .values()
            .filter(|entry| self.is_fresh(entry.created_at, now))
            .count();
        let total = state.memory_index.len();
        CacheStats { total, valid, expired: total - valid }
    }

    /// Unexpired in-memory entries, oldest first, without modifying anything.
    pub async fn valid_entries(&self) -> Vec<(String, AnalysisPayload)> {
        let state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        let mut entries: Vec<(&String, &CacheEntry)> = state
            .memory_index
            .iter()
            .filter(|(_, entry)| self.is_fresh(entry.created_at, now))
            .collect();
        entries.sort_by_key(|(_, entry)| (entry.created_at, entry.seq));
        entries
            .into_iter()
            .map(|(key, entry)| (key.clone(), entry.payload.clone()))
            .collect()
    }

    /// Whether `key` was loaded by the startup preload and is still cached.
    pub async fn is_preloaded(&self, key: &str) -> bool {
        self.inner.state.lock().await.preloaded.contains(key)
    }
}
