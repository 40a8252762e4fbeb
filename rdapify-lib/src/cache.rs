//! In-memory response cache with optional JSON persistence.
//!
//! Entries expire after the configured TTL. Expired entries are dropped on
//! read, but [`CacheManager::get_stale`] can still serve them so offline
//! mode keeps working with old data.

use crate::error::RdapError;
use crate::types::RdapResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

const SNAPSHOT_VERSION: u32 = 1;

/// Longest lifetime an entry can get; larger TTLs are clamped to it.
fn max_ttl() -> chrono::Duration {
    chrono::Duration::days(36500)
}

/// A cached response and its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub response: RdapResponse,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Thread-safe response cache keyed by [`QueryTarget::cache_key`](crate::QueryTarget::cache_key).
pub struct CacheManager {
    state: Mutex<CacheState>,
    ttl: chrono::Duration,
    max_entries: usize,
}

impl CacheManager {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl: chrono::Duration::from_std(ttl)
                .ok()
                .filter(|ttl| *ttl <= max_ttl())
                .unwrap_or_else(max_ttl),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>, RdapError> {
        self.state
            .lock()
            .map_err(|_| RdapError::internal("Failed to acquire response cache lock"))
    }

    /// Return a live entry's response. Expired entries are removed.
    pub fn get(&self, key: &str) -> Result<Option<RdapResponse>, RdapError> {
        let mut state = self.lock()?;

        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                let response = entry.response.clone();
                state.hits += 1;
                return Ok(Some(response));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!(key, "dropping expired cache entry");
            state.entries.remove(key);
        }
        state.misses += 1;
        Ok(None)
    }

    /// Return an entry's response even if it has expired.
    pub fn get_stale(&self, key: &str) -> Result<Option<RdapResponse>, RdapError> {
        Ok(self
            .lock()?
            .entries
            .get(key)
            .map(|entry| entry.response.clone()))
    }

    /// Store a response, evicting the oldest entry when full.
    pub fn insert(&self, key: &str, response: RdapResponse) -> Result<(), RdapError> {
        let mut state = self.lock()?;

        if !state.entries.contains_key(key) && state.entries.len() >= self.max_entries {
            evict_oldest(&mut state.entries);
        }

        let stored_at = Utc::now();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                response,
                stored_at,
                expires_at: stored_at
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        );
        Ok(())
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, RdapError> {
        let mut state = self.lock()?;
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired());
        Ok(before - state.entries.len())
    }

    /// Drop all entries and reset counters.
    pub fn clear(&self) -> Result<(), RdapError> {
        *self.lock()? = CacheState::default();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Result<CacheStats, RdapError> {
        let state = self.lock()?;
        Ok(CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        })
    }

    /// Write all entries (including expired ones) to a JSON snapshot.
    pub fn save_to_file(&self, path: &Path) -> Result<usize, RdapError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries: self.lock()?.entries.clone(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RdapError::file_error(parent.display().to_string(), e.to_string())
            })?;
        }

        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)
            .map_err(|e| RdapError::file_error(path.display().to_string(), e.to_string()))?;

        debug!(path = %path.display(), entries = snapshot.entries.len(), "cache snapshot saved");
        Ok(snapshot.entries.len())
    }

    /// Merge entries from a JSON snapshot. A missing file loads nothing.
    ///
    /// Entries already in memory win over older snapshot entries with the
    /// same key. Capacity is enforced after the merge.
    pub fn load_from_file(&self, path: &Path) -> Result<usize, RdapError> {
        if !path.exists() {
            return Ok(0);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RdapError::file_error(path.display().to_string(), e.to_string()))?;
        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
            RdapError::file_error(
                path.display().to_string(),
                format!("invalid cache snapshot: {}", e),
            )
        })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RdapError::file_error(
                path.display().to_string(),
                format!("unsupported cache snapshot version {}", snapshot.version),
            ));
        }

        let mut state = self.lock()?;
        let mut loaded = 0;
        for (key, entry) in snapshot.entries {
            let newer = state
                .entries
                .get(&key)
                .map(|existing| entry.stored_at > existing.stored_at)
                .unwrap_or(true);
            if newer {
                state.entries.insert(key, entry);
                loaded += 1;
            }
        }
        while state.entries.len() > self.max_entries {
            evict_oldest(&mut state.entries);
        }

        debug!(path = %path.display(), loaded, "cache snapshot loaded");
        Ok(loaded)
    }
}

fn evict_oldest(entries: &mut HashMap<String, CacheEntry>) {
    let oldest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.stored_at)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        debug!(key = key.as_str(), "evicting oldest cache entry");
        entries.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DomainRecord, QueryTarget, RdapRecord, ResponseMeta};
    use tempfile::tempdir;

    fn response(name: &str) -> RdapResponse {
        RdapResponse {
            query: QueryTarget::Domain(name.to_string()),
            record: RdapRecord::Domain(DomainRecord {
                name: name.to_string(),
                ..Default::default()
            }),
            meta: ResponseMeta {
                source: format!("https://rdap.test/domain/{}", name),
                queried_at: Utc::now(),
                cached: false,
                redacted: true,
                attempts: 1,
                duration_ms: 12,
            },
            raw: None,
        }
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let ttl = crate::config::parse_duration("10000000000h").unwrap();
        let cache = CacheManager::new(ttl, 10);

        cache.insert("domain:forever.test", response("forever.test")).unwrap();
        assert!(cache.get("domain:forever.test").unwrap().is_some());

        let state = cache.lock().unwrap();
        let entry = &state.entries["domain:forever.test"];
        assert!(entry.expires_at - entry.stored_at <= max_ttl());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_get_and_stats() {
        let cache = CacheManager::new(Duration::from_secs(60), 10);
        assert!(cache.get("domain:a.test").unwrap().is_none());

        cache.insert("domain:a.test", response("a.test")).unwrap();
        let hit = cache.get("domain:a.test").unwrap().unwrap();
        assert_eq!(hit.as_domain().unwrap().name, "a.test");

        let stats = cache.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_expired_entries_removed_but_stale_readable() {
        let cache = CacheManager::new(Duration::ZERO, 10);
        cache.insert("domain:a.test", response("a.test")).unwrap();

        assert!(cache.get_stale("domain:a.test").unwrap().is_some());
        assert!(cache.get("domain:a.test").unwrap().is_none());
        assert!(cache.is_empty());
        assert!(cache.get_stale("domain:a.test").unwrap().is_none());
    }

    #[test]
    fn test_purge_expired() {
        let cache = CacheManager::new(Duration::ZERO, 10);
        cache.insert("domain:a.test", response("a.test")).unwrap();
        cache.insert("domain:b.test", response("b.test")).unwrap();
        assert_eq!(cache.purge_expired().unwrap(), 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = CacheManager::new(Duration::from_secs(60), 2);
        cache.insert("domain:a.test", response("a.test")).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("domain:b.test", response("b.test")).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("domain:c.test", response("c.test")).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get_stale("domain:a.test").unwrap().is_none());
        assert!(cache.get_stale("domain:c.test").unwrap().is_some());

        // Replacing an existing key never evicts
        cache.insert("domain:c.test", response("c.test")).unwrap();
        assert!(cache.get_stale("domain:b.test").unwrap().is_some());
    }

    #[test]
    fn test_clear_resets_counters() {
        let cache = CacheManager::new(Duration::from_secs(60), 10);
        cache.insert("domain:a.test", response("a.test")).unwrap();
        cache.get("domain:a.test").unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = CacheManager::new(Duration::from_secs(60), 10);
        cache.insert("domain:a.test", response("a.test")).unwrap();
        cache.insert("domain:b.test", response("b.test")).unwrap();
        assert_eq!(cache.save_to_file(&path).unwrap(), 2);

        let restored = CacheManager::new(Duration::from_secs(60), 10);
        assert_eq!(restored.load_from_file(&path).unwrap(), 2);
        assert_eq!(
            restored.get("domain:b.test").unwrap(),
            cache.get_stale("domain:b.test").unwrap()
        );
    }

    #[test]
    fn test_load_missing_and_corrupt_files() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(Duration::from_secs(60), 10);
        assert_eq!(cache.load_from_file(&dir.path().join("absent.json")).unwrap(), 0);

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        let err = cache.load_from_file(&corrupt).unwrap_err();
        assert!(matches!(err, RdapError::File { .. }));
    }
}
