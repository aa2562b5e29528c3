//! Snapshots of server reads for viewing while offline.

use super::{CACHE_EXPIRY_MS, CACHE_FRESH_MS, CACHE_STALE_MS, CF_CACHE, CF_CACHE_AGE};
use crate::error::{LoopHubError, Result};
use crate::storage::{composite_key, BatchOp, RocksDbHandle};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

/// A cached response. The payload is kept as JSON text so any result type
/// can be cached without a schema of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    fetched_at: u64,
    json: String,
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    /// Younger than five minutes.
    Fresh(T),
    /// Older, but recent enough to show offline.
    Stale { value: T, age_ms: u64 },
    /// Absent or too old to show.
    Miss,
}

impl<T> CacheLookup<T> {
    /// The cached value, fresh or stale.
    pub fn into_value(self) -> Option<T> {
        match self {
            CacheLookup::Fresh(value) | CacheLookup::Stale { value, .. } => Some(value),
            CacheLookup::Miss => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, CacheLookup::Fresh(_))
    }
}

fn age_key(fetched_at: u64, key: &str) -> Vec<u8> {
    composite_key(&fetched_at.to_be_bytes(), key.as_bytes())
}

/// Splits an age index key back into its timestamp and cache key.
fn split_age_key(age_key: &[u8]) -> Option<(u64, &[u8])> {
    let stamp: [u8; 8] = age_key.get(..8)?.try_into().ok()?;
    Some((u64::from_be_bytes(stamp), age_key.get(9..)?))
}

/// Bounded key/value cache; the least recently fetched entries go first
/// when it is full.
///
/// Entries older than a day are no longer served but stay on disk until
/// [`OfflineCache::purge_expired`] drops them after a week, so the client
/// can still tell when a listing was last synced.
#[derive(Debug, Clone)]
pub struct OfflineCache {
    db: RocksDbHandle,
    capacity: usize,
}

impl OfflineCache {
    pub(crate) fn new(db: RocksDbHandle, capacity: usize) -> Self {
        Self { db, capacity }
    }

    /// Caps the number of entries; used by tests.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Stores a snapshot of `value` taken at `now`.
    pub fn put<T: Serialize>(&mut self, key: &str, value: &T, now: u64) -> Result<()> {
        let json = serde_json::to_string(value).map_err(LoopHubError::serialization)?;
        let mut ops = Vec::with_capacity(3);
        if let Some(old) = self.entry(key)? {
            ops.push(BatchOp::delete(CF_CACHE_AGE, age_key(old.fetched_at, key)));
        }
        ops.push(BatchOp::put(
            CF_CACHE,
            key.as_bytes().to_vec(),
            &CacheEntry {
                fetched_at: now,
                json,
            },
        )?);
        ops.push(BatchOp::marker(CF_CACHE_AGE, age_key(now, key)));
        self.db.write_batch(ops)?;
        self.evict_over_capacity()
    }

    fn entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.db.get(CF_CACHE, key.as_bytes())
    }

    /// Reads `key` and classifies it by age.
    pub fn get<T: DeserializeOwned>(&self, key: &str, now: u64) -> Result<CacheLookup<T>> {
        let Some(entry) = self.entry(key)? else {
            return Ok(CacheLookup::Miss);
        };
        let age_ms = now.saturating_sub(entry.fetched_at);
        if age_ms >= CACHE_STALE_MS {
            return Ok(CacheLookup::Miss);
        }
        let value = match serde_json::from_str(&entry.json) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, "Ignoring undecodable cache entry: {}", e);
                return Ok(CacheLookup::Miss);
            }
        };
        if age_ms < CACHE_FRESH_MS {
            Ok(CacheLookup::Fresh(value))
        } else {
            Ok(CacheLookup::Stale { value, age_ms })
        }
    }

    /// When `key` was last fetched, if it is still on disk.
    pub fn fetched_at(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.entry(key)?.map(|e| e.fetched_at))
    }

    pub fn invalidate(&mut self, key: &str) -> Result<()> {
        if let Some(old) = self.entry(key)? {
            self.db.write_batch(vec![
                BatchOp::delete(CF_CACHE, key.as_bytes().to_vec()),
                BatchOp::delete(CF_CACHE_AGE, age_key(old.fetched_at, key)),
            ])?;
        }
        Ok(())
    }

    /// Drops entries fetched a week or more before `now`.
    pub fn purge_expired(&mut self, now: u64) -> Result<usize> {
        let cutoff = now.saturating_sub(CACHE_EXPIRY_MS);
        let mut expired = Vec::new();
        self.db.iterate_all(CF_CACHE_AGE, |age_key, _| match split_age_key(age_key) {
            Some((fetched_at, _)) if fetched_at > cutoff => false,
            _ => {
                expired.push(age_key.to_vec());
                true
            }
        })?;
        let purged = self.remove_by_age_keys(expired)?;
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        Ok(purged)
    }

    fn evict_over_capacity(&mut self) -> Result<()> {
        let len = self.len()?;
        if len <= self.capacity {
            return Ok(());
        }
        let excess = len - self.capacity;
        let mut oldest = Vec::with_capacity(excess);
        self.db.iterate_all(CF_CACHE_AGE, |age_key, _| {
            oldest.push(age_key.to_vec());
            oldest.len() < excess
        })?;
        let evicted = self.remove_by_age_keys(oldest)?;
        debug!(evicted, "Evicted oldest cache entries");
        Ok(())
    }

    fn remove_by_age_keys(&mut self, age_keys: Vec<Vec<u8>>) -> Result<usize> {
        let count = age_keys.len();
        if count == 0 {
            return Ok(0);
        }
        let mut ops = Vec::with_capacity(count * 2);
        for age_key in age_keys {
            if let Some((_, key)) = split_age_key(&age_key) {
                ops.push(BatchOp::delete(CF_CACHE, key.to_vec()));
            }
            ops.push(BatchOp::delete(CF_CACHE_AGE, age_key));
        }
        self.db.write_batch(ops)?;
        Ok(count)
    }

    pub fn len(&self) -> Result<usize> {
        self.db.count_prefix(CF_CACHE, &[])
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::test_support::store;

    const MINUTE: u64 = 60 * 1_000;
    const HOUR: u64 = 60 * MINUTE;

    #[test]
    fn test_freshness_tiers() {
        let (store, _dir) = store();
        let mut cache = store.cache();
        cache.put("threads:rust", &vec!["a", "b"], 0).unwrap();

        let fresh: CacheLookup<Vec<String>> = cache.get("threads:rust", 4 * MINUTE).unwrap();
        assert!(fresh.is_fresh());

        match cache.get::<Vec<String>>("threads:rust", 2 * HOUR).unwrap() {
            CacheLookup::Stale { value, age_ms } => {
                assert_eq!(value, vec!["a", "b"]);
                assert_eq!(age_ms, 2 * HOUR);
            }
            other => panic!("expected stale, got {:?}", other),
        }

        let old: CacheLookup<Vec<String>> = cache.get("threads:rust", 25 * HOUR).unwrap();
        assert_eq!(old, CacheLookup::Miss);
        // Still on disk until purged.
        assert_eq!(cache.fetched_at("threads:rust").unwrap(), Some(0));

        let absent: CacheLookup<Vec<String>> = cache.get("nope", 0).unwrap();
        assert_eq!(absent, CacheLookup::Miss);
    }

    #[test]
    fn test_refresh_replaces_entry() {
        let (store, _dir) = store();
        let mut cache = store.cache();
        cache.put("k", &1u32, 0).unwrap();
        cache.put("k", &2u32, 10 * MINUTE).unwrap();

        assert_eq!(cache.len().unwrap(), 1);
        let value: CacheLookup<u32> = cache.get("k", 11 * MINUTE).unwrap();
        assert_eq!(value, CacheLookup::Fresh(2));
    }

    #[test]
    fn test_evicts_oldest_over_capacity() {
        let (store, _dir) = store();
        let mut cache = store.cache().with_capacity(3);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.put(key, &i, i as u64).unwrap();
        }
        // Refreshing "b" makes "c" the oldest.
        cache.put("b", &9, 10).unwrap();
        cache.put("e", &4, 11).unwrap();

        assert_eq!(cache.len().unwrap(), 3);
        assert_eq!(cache.fetched_at("a").unwrap(), None);
        assert_eq!(cache.fetched_at("c").unwrap(), None);
        assert!(cache.fetched_at("b").unwrap().is_some());
        assert!(cache.fetched_at("e").unwrap().is_some());
    }

    #[test]
    fn test_purge_expired() {
        let (store, _dir) = store();
        let mut cache = store.cache();
        cache.put("old", &1, 0).unwrap();
        cache.put("new", &2, CACHE_EXPIRY_MS).unwrap();

        assert_eq!(cache.purge_expired(CACHE_EXPIRY_MS + 1).unwrap(), 1);
        assert_eq!(cache.fetched_at("old").unwrap(), None);
        assert_eq!(cache.len().unwrap(), 1);

        cache.invalidate("new").unwrap();
        assert!(cache.is_empty().unwrap());
    }
}
