//! Cache implementations - 저장소 기반 캐시와 비활성 캐시

use super::entry::{CacheEntry, CacheKey};
use cmdgen_foundation::{Clock, FileStateStore, Result, StateStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// 명령어 캐시
///
/// 모든 연산은 best-effort: 저장소 오류는 경고 후 미스/건너뜀으로 처리한다.
pub trait CommandCache: Send + Sync {
    /// 유효한 엔트리 조회 (만료/손상 시 None)
    fn lookup(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// 저장 시도, 실제로 기록했으면 true
    fn store(&self, key: &CacheKey, command: &str) -> bool;

    /// 전체 삭제, 삭제한 엔트리 수 반환
    fn clear(&self) -> Result<usize>;

    fn is_enabled(&self) -> bool;
}

// ============================================================
// StoreCache
// ============================================================

/// `StateStore` 위의 캐시
pub struct StoreCache {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
}

impl StoreCache {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>, ttl_secs: u64) -> Self {
        Self {
            store,
            clock,
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// 만료/손상 엔트리 삭제 (다른 프로세스가 쓰는 중이면 건너뜀)
    fn evict(&self, key: &CacheKey) {
        match self.store.try_lock(key.as_str()) {
            Ok(Some(lock)) => {
                if let Err(e) = self.store.remove(&lock) {
                    warn!(key = %key, error = %e, "Failed to evict cache entry");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Failed to lock cache entry for eviction"),
        }
    }
}

impl CommandCache for StoreCache {
    fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let raw = match self.store.read(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt cache entry");
                self.evict(key);
                return None;
            }
        };

        if entry.key != key.as_str() {
            warn!(key = %key, stored = %entry.key, "Cache entry key mismatch");
            return None;
        }

        let now = self.clock.now();
        if entry.is_expired(now) {
            debug!(key = %key, age_secs = entry.age_secs(now), "Cache entry expired");
            self.evict(key);
            return None;
        }

        debug!(key = %key, "Cache hit");
        Some(entry)
    }

    fn store(&self, key: &CacheKey, command: &str) -> bool {
        let lock = match self.store.try_lock(key.as_str()) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                debug!(key = %key, "Another process is storing this entry, skipping");
                return false;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lock failed, skipping store");
                return false;
            }
        };

        let entry = CacheEntry::new(key, command, self.clock.now(), self.ttl_secs);
        let result = serde_json::to_string_pretty(&entry)
            .map_err(cmdgen_foundation::Error::from)
            .and_then(|json| self.store.write(&lock, &json));

        match result {
            Ok(()) => {
                debug!(key = %key, "Cache entry stored");
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }

    fn clear(&self) -> Result<usize> {
        let removed = self.store.clear("")?;
        debug!(removed, "Cache cleared");
        Ok(removed)
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

// ============================================================
// DisabledCache
// ============================================================

/// 캐시 비활성 (TTL 0, 쓰기 불가 디렉토리, `--no-cache`)
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

impl CommandCache for DisabledCache {
    fn lookup(&self, _key: &CacheKey) -> Option<CacheEntry> {
        None
    }

    fn store(&self, _key: &CacheKey, _command: &str) -> bool {
        false
    }

    fn clear(&self) -> Result<usize> {
        Ok(0)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// 캐시 디렉토리 상태에 따라 구현 선택
pub fn open(cache_dir: &Path, ttl_secs: u64, clock: Arc<dyn Clock>) -> Arc<dyn CommandCache> {
    if ttl_secs == 0 {
        debug!("Cache TTL is 0, caching disabled");
        return Arc::new(DisabledCache);
    }

    let store = FileStateStore::new(cache_dir);
    if let Err(e) = store.ensure_writable() {
        warn!(dir = %cache_dir.display(), error = %e, "Cache directory unavailable, caching disabled");
        return Arc::new(DisabledCache);
    }

    Arc::new(StoreCache::new(Arc::new(store), clock, ttl_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize_input;
    use cmdgen_foundation::{ManualClock, MemoryStateStore};
    use tempfile::TempDir;

    fn key(text: &str) -> CacheKey {
        CacheKey::new(&sanitize_input(text).unwrap(), false)
    }

    fn memory_cache(ttl: u64) -> (StoreCache, Arc<MemoryStateStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStateStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let cache = StoreCache::new(store.clone(), clock.clone(), ttl);
        (cache, store, clock)
    }

    #[test]
    fn test_store_and_lookup() {
        let (cache, _, _) = memory_cache(60);
        let k = key("list all python files");

        assert!(cache.lookup(&k).is_none());
        assert!(cache.store(&k, "find . -name '*.py'"));

        let entry = cache.lookup(&k).unwrap();
        assert_eq!(entry.command, "find . -name '*.py'");
        assert_eq!(entry.ttl_secs, 60);
    }

    #[test]
    fn test_expired_entry_is_miss_and_evicted() {
        let (cache, store, clock) = memory_cache(60);
        let k = key("list all python files");
        cache.store(&k, "find . -name '*.py'");

        clock.advance_secs(61);
        assert!(cache.lookup(&k).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_losing_lock_race_skips_store() {
        let (cache, store, _) = memory_cache(60);
        let k = key("show disk usage");

        let held = store.try_lock(k.as_str()).unwrap().unwrap();
        assert!(!cache.store(&k, "du -sh ."));
        assert!(cache.lookup(&k).is_none());

        drop(held);
        assert!(cache.store(&k, "du -sh ."));
    }

    #[test]
    fn test_corrupt_entry_is_miss() {
        let (cache, store, _) = memory_cache(60);
        let k = key("show disk usage");

        let lock = store.try_lock(k.as_str()).unwrap().unwrap();
        store.write(&lock, "{not json").unwrap();
        drop(lock);

        assert!(cache.lookup(&k).is_none());
        assert!(store.read(k.as_str()).unwrap().is_none());
    }

    #[test]
    fn test_file_layout_and_clear() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        let cache = open(&cache_dir, 60, Arc::new(ManualClock::starting_now()));
        assert!(cache.is_enabled());

        let k = key("list all python files");
        assert!(cache.store(&k, "find . -name '*.py'"));
        assert!(cache_dir.join(format!("{}.json", k)).is_file());
        assert!(!cache_dir.join(format!("{}.lock", k)).exists());

        assert!(cache.store(&key("show disk usage"), "du -sh ."));
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.lookup(&k).is_none());
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let temp = TempDir::new().unwrap();
        let cache = open(temp.path(), 0, Arc::new(ManualClock::starting_now()));

        let k = key("list all python files");
        assert!(!cache.is_enabled());
        assert!(!cache.store(&k, "ls"));
        assert!(cache.lookup(&k).is_none());
    }

    #[test]
    fn test_unwritable_directory_disables_cache() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let cache = open(&blocker.join("cache"), 60, Arc::new(ManualClock::starting_now()));
        assert!(!cache.is_enabled());
    }
}
