//! Local suggestion cache
//!
//! One entry per suggestion context, holding the last fetched candidate list
//! with a TTL and schema version. Corrupt, stale and foreign-version entries
//! are removed on touch. Storage quota errors trigger eviction of the oldest,
//! least hit entries and a single retry. No cache failure reaches the caller;
//! the worst case is a miss.

mod entry;
mod storage;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::error::CacheError;
use crate::suggestion::{Suggestion, SuggestionType};

pub use entry::{CACHE_VERSION, CacheEntry, CacheKey, KEY_PREFIX};
pub use storage::{CacheStore, DirCacheStore, MemoryCacheStore, default_cache_dir};

pub const DEFAULT_TTL_DAYS: i64 = 14;
pub const DEFAULT_MAX_ITEMS: usize = 100;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
pub const DEFAULT_EVICT_BATCH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub max_items: usize,
    pub max_payload_bytes: usize,
    /// Entries evicted on a quota error before the single retry
    pub evict_batch: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::days(DEFAULT_TTL_DAYS),
            max_items: DEFAULT_MAX_ITEMS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            evict_batch: DEFAULT_EVICT_BATCH,
        }
    }
}

/// What happened to a `set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Stored,
    /// Stored on the retry after evicting `evicted` entries
    StoredAfterEviction { evicted: usize },
    /// Payload over the size limit; nothing written
    Rejected,
    /// Storage kept failing; the key was cleared so reads miss
    Abandoned,
    /// The key was invalidated after the data was fetched; nothing written
    Superseded,
}

impl CacheWrite {
    pub fn is_stored(&self) -> bool {
        matches!(
            self,
            CacheWrite::Stored | CacheWrite::StoredAfterEviction { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub count: usize,
    pub total_items: usize,
    pub total_size_bytes: usize,
    pub by_type: BTreeMap<SuggestionType, usize>,
    pub avg_hit_count: f64,
}

pub struct SuggestionCache<S: CacheStore> {
    store: S,
    options: CacheOptions,
    /// Per storage key count of invalidations in this process
    invalidations: HashMap<String, u64>,
    clears: u64,
}

impl<S: CacheStore> SuggestionCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, CacheOptions::default())
    }

    pub fn with_options(store: S, options: CacheOptions) -> Self {
        Self {
            store,
            options,
            invalidations: HashMap::new(),
            clears: 0,
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.get_at(key, Utc::now())
    }

    /// Fresh entry for `key`, counting the hit.
    ///
    /// Missing, corrupt, foreign-version and expired entries all read as a
    /// miss; the last three are removed from storage.
    pub fn get_at(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        let storage_key = key.to_string();
        let raw = match self.store.get_item(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::debug!("Cache miss for {}", storage_key);
                return None;
            }
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", storage_key, e);
                return None;
            }
        };

        let mut entry = match CacheEntry::decode(&raw) {
            Ok(entry) if entry.scope != *key.scope() => {
                // Another scope whose key renders to the same string
                log::debug!("Cache entry {} belongs to another scope", storage_key);
                return None;
            }
            Ok(entry) if !entry.is_expired_at(now) => entry,
            Ok(_) => {
                log::debug!("Cache entry {} expired", storage_key);
                self.remove(&storage_key);
                return None;
            }
            Err(e) => {
                log::debug!("Dropping cache entry {}: {}", storage_key, e);
                self.remove(&storage_key);
                return None;
            }
        };

        entry.hit_count += 1;
        match entry.encode() {
            Ok(payload) => {
                if let Err(e) = self.store.set_item(&storage_key, &payload) {
                    log::debug!("Could not record cache hit for {}: {}", storage_key, e);
                }
            }
            Err(e) => log::debug!("Could not record cache hit for {}: {}", storage_key, e),
        }

        log::debug!(
            "Cache hit for {} ({} items, {} hits)",
            storage_key,
            entry.data.len(),
            entry.hit_count
        );
        Some(entry)
    }

    pub fn set(&mut self, key: &CacheKey, suggestions: &[Suggestion]) -> CacheWrite {
        self.set_at(key, suggestions, Utc::now())
    }

    /// Store a fresh snapshot, truncated to the item cap.
    pub fn set_at(
        &mut self,
        key: &CacheKey,
        suggestions: &[Suggestion],
        now: DateTime<Utc>,
    ) -> CacheWrite {
        self.write_at(key, suggestions, suggestions.len(), now)
    }

    fn write_at(
        &mut self,
        key: &CacheKey,
        suggestions: &[Suggestion],
        corpus_size: usize,
        now: DateTime<Utc>,
    ) -> CacheWrite {
        let storage_key = key.to_string();
        let entry = CacheEntry {
            data: suggestions
                .iter()
                .take(self.options.max_items)
                .cloned()
                .collect(),
            cached_at: now,
            expires_at: now + self.options.ttl,
            version: CACHE_VERSION.to_string(),
            hit_count: 0,
            scope: key.scope().clone(),
            corpus_size: corpus_size.max(suggestions.len()),
        };

        let payload = match entry.encode() {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Not caching {}: {}", storage_key, e);
                return CacheWrite::Rejected;
            }
        };
        if payload.len() > self.options.max_payload_bytes {
            let e = CacheError::PayloadTooLarge {
                bytes: payload.len(),
                limit: self.options.max_payload_bytes,
            };
            log::warn!("Not caching {}: {}", storage_key, e);
            return CacheWrite::Rejected;
        }

        self.clear_expired_at(now);

        match self.store.set_item(&storage_key, &payload) {
            Ok(()) => return CacheWrite::Stored,
            Err(CacheError::QuotaExceeded) => {
                log::warn!("Cache quota exceeded writing {}, evicting", storage_key);
            }
            Err(e) => {
                log::error!("Cache write for {} failed: {}", storage_key, e);
                self.remove(&storage_key);
                return CacheWrite::Abandoned;
            }
        }

        let evicted = self.evict_oldest(self.options.evict_batch);
        match self.store.set_item(&storage_key, &payload) {
            Ok(()) => CacheWrite::StoredAfterEviction { evicted },
            Err(e) => {
                log::error!(
                    "Cache write for {} failed after evicting {} entries: {}",
                    storage_key,
                    evicted,
                    e
                );
                self.remove(&storage_key);
                CacheWrite::Abandoned
            }
        }
    }

    /// Token that changes whenever `key` is invalidated or the cache cleared.
    ///
    /// Take it before fetching and hand it to [`Self::set_if_current`].
    pub fn epoch(&self, key: &CacheKey) -> u64 {
        let invalidations = self
            .invalidations
            .get(&key.to_string())
            .copied()
            .unwrap_or(0);
        invalidations.wrapping_add(self.clears)
    }

    /// Store a page of `corpus_size` candidates, unless `key` was
    /// invalidated since `epoch` was taken
    pub fn set_if_current(
        &mut self,
        key: &CacheKey,
        suggestions: &[Suggestion],
        corpus_size: usize,
        epoch: u64,
    ) -> CacheWrite {
        if self.epoch(key) != epoch {
            log::debug!("Not caching {}: invalidated during fetch", key);
            return CacheWrite::Superseded;
        }
        self.write_at(key, suggestions, corpus_size, Utc::now())
    }

    /// Drop the entry for `key`; true if one was stored
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        let storage_key = key.to_string();
        let count = self.invalidations.entry(storage_key.clone()).or_insert(0);
        *count = count.wrapping_add(1);
        let present = matches!(self.store.get_item(&storage_key), Ok(Some(_)));
        if present {
            self.remove(&storage_key);
            log::debug!("Invalidated cache entry {}", storage_key);
        }
        present
    }

    pub fn clear_expired(&mut self) -> usize {
        self.clear_expired_at(Utc::now())
    }

    /// Remove expired, foreign-version and unparseable entries
    pub fn clear_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for storage_key in self.cache_keys() {
            let stale = match self.store.get_item(&storage_key) {
                Ok(Some(raw)) => match CacheEntry::decode(&raw) {
                    Ok(entry) => entry.expires_at < now,
                    Err(_) => true,
                },
                _ => false,
            };
            if stale {
                self.remove(&storage_key);
                removed += 1;
            }
        }
        if removed > 0 {
            log::debug!("Cleared {} stale cache entries", removed);
        }
        removed
    }

    /// Remove up to `n` entries, oldest first, fewest hits breaking ties.
    ///
    /// Unreadable entries go first.
    pub fn evict_oldest(&mut self, n: usize) -> usize {
        let mut candidates: Vec<(Option<(DateTime<Utc>, u64)>, String)> = self
            .cache_keys()
            .into_iter()
            .map(|storage_key| {
                let age = self
                    .store
                    .get_item(&storage_key)
                    .ok()
                    .flatten()
                    .and_then(|raw| CacheEntry::decode(&raw).ok())
                    .map(|entry| (entry.cached_at, entry.hit_count));
                (age, storage_key)
            })
            .collect();
        candidates.sort();

        let mut removed = 0;
        for (_, storage_key) in candidates.into_iter().take(n) {
            self.remove(&storage_key);
            removed += 1;
        }
        if removed > 0 {
            log::warn!("Evicted {} cache entries", removed);
        }
        removed
    }

    /// Remove every entry this cache owns
    pub fn clear(&mut self) -> usize {
        self.clears = self.clears.wrapping_add(1);
        let keys = self.cache_keys();
        for storage_key in &keys {
            self.remove(storage_key);
        }
        keys.len()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        let mut hits = 0u64;

        for storage_key in self.cache_keys() {
            let Ok(Some(raw)) = self.store.get_item(&storage_key) else {
                continue;
            };
            stats.total_size_bytes += storage_key.len() + raw.len();
            let Ok(entry) = CacheEntry::decode(&raw) else {
                continue;
            };
            stats.count += 1;
            stats.total_items += entry.data.len();
            hits += entry.hit_count;
            if let Some(kind) = CacheKey::kind_of(&storage_key) {
                *stats.by_type.entry(kind).or_default() += 1;
            }
        }

        if stats.count > 0 {
            stats.avg_hit_count = hits as f64 / stats.count as f64;
        }
        stats
    }

    fn cache_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| CacheKey::is_cache_key(k))
                .collect(),
            Err(e) => {
                log::warn!("Could not list cache entries: {}", e);
                Vec::new()
            }
        }
    }

    fn remove(&mut self, storage_key: &str) {
        if let Err(e) = self.store.remove_item(storage_key) {
            log::warn!("Could not remove cache entry {}: {}", storage_key, e);
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
