//! Regex cache (§4.2 "Regex cache"): an LRU memoization of `regex::Regex`
//! compilation, keyed by pattern string, shared by reader/writer discipline
//! — readers take a shared lock for the hit-check, only the rarer
//! move-to-front/insert path takes the exclusive lock; hit/miss counters
//! are plain atomics. Grounded in the teacher's `parking_lot::RwLock` use
//! for hot shared state (`upstream/circuit_breaker.rs`'s per-node mutex is
//! the closest teacher analogue; the `lru`-crate eviction order itself is
//! grounded in `lspecian-vexfs/rust/Cargo.toml`, which depends on `lru` for
//! exactly this kind of bounded cache).

use lru::LruCache;
use parking_lot::RwLock;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const DEFAULT_CAPACITY: usize = 256;

pub struct RegexCache {
    inner: RwLock<LruCache<String, Arc<Regex>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Pre-populate the cache from a known-pattern set, for warm starts
    /// (§4.2 "Pre-population from a known-pattern map is supported").
    /// Patterns that fail to compile are silently skipped — they will be
    /// reported properly by tree validation, which runs independently.
    pub fn warm<I: IntoIterator<Item = String>>(&self, patterns: I) {
        let mut inner = self.inner.write();
        for pattern in patterns {
            if let Ok(re) = Regex::new(&pattern) {
                inner.put(pattern, Arc::new(re));
            }
        }
        metrics::gauge!("routing_regex_cache_size").set(inner.len() as f64);
    }

    /// Get a compiled regex for `pattern`, compiling and caching on miss.
    /// Returns `None` only if the pattern fails to compile, which should
    /// not occur for a pattern that already passed tree validation — the
    /// caller treats this as "log and do not match" (§4.2).
    pub fn get_or_compile(&self, pattern: &str) -> Option<Arc<Regex>> {
        // Fast path: shared lock, non-mutating hit-check.
        let present = self.inner.read().peek(pattern).is_some();

        if present {
            // Upgrade to exclusive only to move the entry to the front.
            let mut inner = self.inner.write();
            if let Some(re) = inner.get(pattern) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("routing_regex_cache_hits_total").increment(1);
                return Some(re.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("routing_regex_cache_misses_total").increment(1);
        let re = Regex::new(pattern).ok()?;
        let re = Arc::new(re);
        self.inner.write().put(pattern.to_string(), re.clone());
        metrics::gauge!("routing_regex_cache_size").set(self.inner.read().len() as f64);
        Some(re)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new()
    }
}
