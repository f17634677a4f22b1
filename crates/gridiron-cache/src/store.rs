//! The response cache.

use crate::clock::{Clock, SystemClock};
use crate::keys::CacheKey;
use crate::types::{CacheConfig, CacheEntryStatus, CacheStatus};
use gridiron_core::{Result, Table};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

struct CachedTable {
    table: Table,
    created_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, CachedTable>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// TTL-bounded, size-bounded cache of dataset results.
///
/// A single mutex guards the map. `get` followed by `set` is not atomic:
/// concurrent misses on one key may each load upstream, and the last `set`
/// wins.
pub struct ResponseCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl ResponseCache {
    /// Create a cache backed by the system clock.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // A panic while holding the lock cannot leave the map half-written, so a
    // poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    /// Look up a fresh entry, returning a copy the caller owns.
    ///
    /// A stale entry is removed and reported as absent.
    pub fn get(&self, key: &CacheKey) -> Option<Table> {
        let now = self.clock.now();
        let ttl = self.ttl();
        let mut inner = self.lock();

        let age = inner
            .entries
            .get(key)
            .map(|entry| now.saturating_duration_since(entry.created_at));
        let Some(age) = age else {
            inner.misses += 1;
            debug!(key = %key, "Cache miss");
            return None;
        };

        if age < ttl {
            inner.hits += 1;
            debug!(key = %key, age_seconds = age.as_secs(), "Cache hit");
            return inner.entries.get(key).map(|entry| entry.table.clone());
        }

        inner.entries.remove(key);
        inner.expirations += 1;
        inner.misses += 1;
        debug!(key = %key, age_seconds = age.as_secs(), "Cache entry expired");
        None
    }

    /// Store a copy of `table` under `key`, replacing any existing entry.
    ///
    /// When the cache is full and `key` is new, the entry inserted first is
    /// evicted.
    pub fn set(&self, key: CacheKey, table: &Table) {
        let now = self.clock.now();
        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                inner.evictions += 1;
                info!(key = %oldest, "Cache entry evicted");
            }
        }

        debug!(key = %key, rows = table.len(), "Cache set");
        inner.entries.insert(
            key,
            CachedTable {
                table: table.clone(),
                created_at: now,
            },
        );
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        info!(removed, "Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report live entries, oldest first, with counters.
    pub fn status(&self) -> CacheStatus {
        let now = self.clock.now();
        let ttl = self.ttl();
        let inner = self.lock();

        let mut live: Vec<(&CacheKey, &CachedTable)> = inner
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.created_at) < ttl)
            .collect();
        live.sort_by_key(|(_, entry)| entry.created_at);

        let entries = live
            .into_iter()
            .map(|(key, entry)| {
                let age_seconds = now.saturating_duration_since(entry.created_at).as_secs();
                CacheEntryStatus {
                    dataset: key.dataset,
                    seasons: key.seasons.as_slice().to_vec(),
                    include_ngs: key.include_ngs,
                    ngs_stat_type: key.ngs_stat_type,
                    rows: entry.table.len(),
                    age_seconds,
                    expires_in_seconds: self.config.ttl_seconds.saturating_sub(age_seconds),
                }
            })
            .collect::<Vec<_>>();

        CacheStatus {
            cache_size: entries.len(),
            max_size: self.config.capacity,
            ttl_seconds: self.config.ttl_seconds,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            entries,
        }
    }

    /// Return the cached table or load, store, and return it.
    ///
    /// The boolean is `true` when the result came from the cache. Load
    /// failures are returned as-is and never cached.
    pub async fn get_or_load<F, Fut>(&self, key: &CacheKey, load: F) -> Result<(Table, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Table>>,
    {
        if let Some(table) = self.get(key) {
            return Ok((table, true));
        }
        let table = load().await?;
        self.set(key.clone(), &table);
        Ok((table, false))
    }
}
