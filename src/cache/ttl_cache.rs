//! Thread-safe TTL cache.
//!
//! Entries carry the wall-clock time captured at `put` together with their
//! own time-to-live. An entry is logically absent once
//! `now - timestamp > ttl`; the first `get` that observes this removes it.
//! There is no background sweep and no capacity-based eviction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::cache::clock::{Clock, SystemClock};

/// A cached value with its creation time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub value: T,
    /// When the value was written.
    pub timestamp: DateTime<Utc>,
    /// Lifetime in seconds.
    pub ttl_secs: u64,
}

impl<T> CacheEntry<T> {
    /// Time elapsed since the entry was written.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// Whether the entry has outlived its TTL at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) > ttl_duration(self.ttl_secs)
    }
}

/// Largest TTL chrono can represent as a `Duration`.
const MAX_REPRESENTABLE_TTL_SECS: i64 = i64::MAX / 1_000;

fn ttl_duration(ttl_secs: u64) -> Duration {
    let secs = i64::try_from(ttl_secs)
        .unwrap_or(MAX_REPRESENTABLE_TTL_SECS)
        .min(MAX_REPRESENTABLE_TTL_SECS);
    Duration::try_seconds(secs).unwrap_or(Duration::MAX)
}

/// Per-entry view returned by [`TtlCache::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub age_seconds: f64,
    pub ttl_seconds: u64,
    /// Negative once the entry is stale but not yet evicted.
    pub expires_in: f64,
}

/// Summary of the cache contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub total_entries: usize,
    pub entries: Vec<CacheEntryInfo>,
}

/// Generic key→value store with lazy per-entry expiry.
///
/// Clones share the same storage, so one cache can be handed to several
/// components.
pub struct TtlCache<V> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    default_ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            default_ttl_secs: self.default_ttl_secs,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.read().len())
            .field("default_ttl_secs", &self.default_ttl_secs)
            .field("clock", &self.clock)
            .finish()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache on the system clock.
    pub fn new(default_ttl_secs: u64) -> Self {
        Self::with_clock(default_ttl_secs, Arc::new(SystemClock))
    }

    /// Create an empty cache on a caller-supplied clock.
    pub fn with_clock(default_ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl_secs,
            clock,
        }
    }

    /// TTL applied by [`put_with_default_ttl`](Self::put_with_default_ttl).
    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Look up a fresh value.
    ///
    /// A stale entry is removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            entries.remove(key);
            log::info!("Cache expired for {}", key);
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` under `key` for `ttl_secs` seconds from now.
    pub fn put(&self, key: impl Into<String>, value: V, ttl_secs: u64) {
        let entry = CacheEntry {
            value,
            timestamp: self.clock.now(),
            ttl_secs,
        };
        self.entries.write().insert(key.into(), entry);
    }

    /// Store `value` under `key` with the cache's default TTL.
    pub fn put_with_default_ttl(&self, key: impl Into<String>, value: V) {
        self.put(key, value, self.default_ttl_secs);
    }

    /// Drop the entry for `key`, returning whether one was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report age and remaining lifetime of every entry without evicting.
    pub fn snapshot(&self) -> CacheInfo {
        let now = self.clock.now();
        let entries = self.entries.read();

        let mut infos: Vec<CacheEntryInfo> = entries
            .iter()
            .map(|(key, entry)| {
                let age = entry.age_at(now).num_milliseconds() as f64 / 1000.0;
                CacheEntryInfo {
                    key: key.clone(),
                    age_seconds: age,
                    ttl_seconds: entry.ttl_secs,
                    expires_in: entry.ttl_secs as f64 - age,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));

        CacheInfo {
            total_entries: infos.len(),
            entries: infos,
        }
    }
}
