//! One named response cache: fingerprint → serialized response, bounded by
//! entry count and seconds since write.
//!
//! The fill path is single-flight: concurrent callers for one fingerprint
//! converge on a single in-flight computation. A failed computation is
//! logged and swallowed; the entry stays absent and the caller gets no
//! result for that invocation.

use dashmap::DashMap;
use gqlclient_core::{CacheKey, GraphqlClientError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// The cached outcome of one executed request: serialized body + duration.
#[derive(Debug, Clone)]
pub struct CachedResult {
    /// Serialized response body, as received from the endpoint.
    pub body: String,
    /// Duration of the network call that filled the entry.
    pub duration_ms: u64,
}

struct StoredEntry {
    result: CachedResult,
    created_at: Instant,
    hits: AtomicU64,
}

impl StoredEntry {
    fn new(result: CachedResult) -> Self {
        Self {
            result,
            created_at: Instant::now(),
            hits: AtomicU64::new(0),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

type Cell = Arc<OnceCell<StoredEntry>>;

/// A named cache mapping request fingerprints to computed responses.
pub struct ResponseCache {
    name: String,
    max_entries: usize,
    ttl: Duration,
    entries: DashMap<CacheKey, Cell>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    /// Create a cache bounded by `max_entries` and a per-entry TTL.
    pub fn new(name: impl Into<String>, max_entries: usize, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            max_entries,
            ttl,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Configured cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the cached result for `key`, or compute it through the cache.
    ///
    /// At most one computation runs per fingerprint at a time; concurrent
    /// callers for the same fingerprint share the in-flight computation. If
    /// the computation fails, the failure is logged, the entry is left
    /// absent, and `None` is returned instead of the propagated error.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, compute: F) -> Option<CachedResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedResult, GraphqlClientError>>,
    {
        if let Some(result) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache = %self.name, "Cache hit");
            return Some(result);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        self.evict_if_needed();

        let cell: Cell = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let outcome = cell
            .get_or_try_init(|| async { compute().await.map(StoredEntry::new) })
            .await;

        match outcome {
            Ok(entry) => {
                entry.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.result.clone())
            }
            Err(error) => {
                // Deliberate asymmetry with the uncached path: the failure
                // is swallowed here and the caller receives no result.
                warn!(
                    cache = %self.name,
                    error = %error,
                    "Cache fill computation failed; leaving entry absent"
                );
                self.entries
                    .remove_if(key, |_, existing| {
                        Arc::ptr_eq(existing, &cell) && existing.get().is_none()
                    });
                None
            }
        }
    }

    /// Look up a live entry without counting hit/miss.
    fn lookup(&self, key: &CacheKey) -> Option<CachedResult> {
        let cell: Cell = self.entries.get(key)?.clone();
        let entry = cell.get()?;
        if entry.is_expired(self.ttl) {
            let removed = self
                .entries
                .remove_if(key, |_, existing| Arc::ptr_eq(existing, &cell));
            if removed.is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            return None;
        }
        entry.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.result.clone())
    }

    /// Purge expired entries, then evict lowest-hit entries while over
    /// capacity. In-flight (pending) fills are never evicted.
    fn evict_if_needed(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, cell| match cell.get() {
            None => true,
            Some(entry) => !entry.is_expired(self.ttl),
        });
        let expired = before.saturating_sub(self.entries.len());
        if expired > 0 {
            self.evictions.fetch_add(expired as u64, Ordering::Relaxed);
        }

        if self.entries.len() >= self.max_entries {
            let mut hit_counts: Vec<(CacheKey, u64)> = self
                .entries
                .iter()
                .filter_map(|item| {
                    item.value()
                        .get()
                        .map(|entry| (item.key().clone(), entry.hits.load(Ordering::Relaxed)))
                })
                .collect();
            hit_counts.sort_by_key(|(_, hits)| *hits);

            let to_remove = self.entries.len().saturating_sub(self.max_entries) + 1;
            let mut removed = 0u64;
            for (key, _) in hit_counts.into_iter().take(to_remove) {
                if self.entries.remove(&key).is_some() {
                    removed += 1;
                }
            }
            if removed > 0 {
                self.evictions.fetch_add(removed, Ordering::Relaxed);
                debug!(cache = %self.name, removed, "Evicted entries over capacity");
            }
        }
    }

    /// Remove every entry, including pending fills.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove filled entries for which `predicate(key, serialized_body)` is
    /// true. Pending fills have no body yet and are skipped.
    pub fn remove_matching<P>(&self, predicate: P)
    where
        P: Fn(&CacheKey, &str) -> bool,
    {
        self.entries.retain(|key, cell| match cell.get() {
            None => true,
            Some(entry) => !predicate(key, &entry.result.body),
        });
    }

    /// Number of entries currently in the map (filled and pending).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.clone(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
            max_entries: self.max_entries,
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("name", &self.name)
            .field("max_entries", &self.max_entries)
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Per-cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Cache name.
    pub name: String,
    /// Hit count.
    pub hits: u64,
    /// Miss count.
    pub misses: u64,
    /// Eviction count (size- and age-bounded removals).
    pub evictions: u64,
    /// Current entry count.
    pub entries: usize,
    /// Configured maximum entry count.
    pub max_entries: usize,
}

impl CacheStats {
    /// Fraction of capacity currently filled.
    pub fn fill_ratio(&self) -> f64 {
        if self.max_entries == 0 {
            0.0
        } else {
            self.entries as f64 / self.max_entries as f64
        }
    }
}
