//! State Store - 프로세스 간 공유 상태 저장소
//!
//! 캐시 엔트리, 레이트 리밋 윈도우, 서킷 브레이커 상태처럼 여러 프로세스가
//! 공유하는 작은 레코드를 저장한다. 모든 쓰기는 레코드 락을 보유한 상태에서만
//! 가능하다 (`write`가 `RecordLock`을 요구).
//!
//! - `FileStateStore`: 디렉토리 락 + 원자적 rename 기반
//! - `MemoryStateStore`: 테스트용 인메모리 구현

use super::lock::{sweep_stale_locks, DirLock, LOCK_SUFFIX, STALE_LOCK_AGE};
use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const RECORD_SUFFIX: &str = ".json";

// ============================================================================
// Trait
// ============================================================================

/// 레코드 락 가드
///
/// drop 되면 락이 해제된다. 에러 경로와 취소 경로에서도 동일하게 동작.
pub struct RecordLock {
    record: String,
    _guard: Box<dyn Send + Sync>,
}

impl RecordLock {
    pub fn new(record: impl Into<String>, guard: impl Send + Sync + 'static) -> Self {
        Self {
            record: record.into(),
            _guard: Box::new(guard),
        }
    }

    pub fn record(&self) -> &str {
        &self.record
    }
}

impl std::fmt::Debug for RecordLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLock")
            .field("record", &self.record)
            .finish()
    }
}

/// 공유 상태 저장소
pub trait StateStore: Send + Sync {
    /// 레코드 읽기 (락 없이, 동시 쓰기와 경합 가능)
    fn read(&self, record: &str) -> Result<Option<String>>;

    /// 비차단 락 획득. 다른 보유자가 있으면 `Ok(None)`
    fn try_lock(&self, record: &str) -> Result<Option<RecordLock>>;

    /// 락을 보유한 레코드에 쓰기
    fn write(&self, lock: &RecordLock, contents: &str) -> Result<()>;

    /// 락을 보유한 레코드 삭제
    fn remove(&self, lock: &RecordLock) -> Result<()>;

    /// prefix 하위 레코드 전체 삭제, 삭제된 수 반환 (빈 prefix는 최상위)
    fn clear(&self, prefix: &str) -> Result<usize>;

    /// 오래된 락 회수
    fn reclaim_stale_locks(&self) -> Result<usize> {
        Ok(0)
    }
}

// ============================================================================
// Lock retry / JSON helpers
// ============================================================================

/// 락 재시도 정책 (상한이 있는 대기, 호출자가 대기 방식을 정한다)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl LockRetry {
    /// 한 번만 시도
    pub const NON_BLOCKING: LockRetry = LockRetry {
        attempts: 1,
        delay: Duration::ZERO,
    };
}

impl Default for LockRetry {
    fn default() -> Self {
        // 최대 약 0.5초 대기
        Self {
            attempts: 20,
            delay: Duration::from_millis(25),
        }
    }
}

/// JSON 레코드 읽기
pub fn read_json<T: DeserializeOwned>(store: &dyn StateStore, record: &str) -> Result<Option<T>> {
    match store.read(record)? {
        Some(content) => Ok(Some(serde_json::from_str(&content)?)),
        None => Ok(None),
    }
}

/// 보유한 락으로 보호된 read-modify-write
///
/// 레코드가 없거나 손상된 경우 기본값에서 시작한다. 락 대기는 호출자 몫이다
/// (백엔드 경로는 tokio 타이머로 기다린다).
pub fn modify_json<T, R, F>(store: &dyn StateStore, lock: &RecordLock, f: F) -> Result<R>
where
    T: Default + Serialize + DeserializeOwned,
    F: FnOnce(&mut T) -> R,
{
    let record = lock.record();
    let mut value: T = match store.read(record)? {
        Some(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(record, error = %e, "Corrupt state record, resetting");
            T::default()
        }),
        None => T::default(),
    };

    let output = f(&mut value);
    store.write(lock, &serde_json::to_string_pretty(&value)?)?;
    Ok(output)
}

// ============================================================================
// FileStateStore
// ============================================================================

/// 파일 기반 상태 저장소
///
/// 레코드 `cache/abc`는 `<base>/cache/abc.json`, 락은 `<base>/cache/abc.lock/`
#[derive(Debug, Clone)]
pub struct FileStateStore {
    base_dir: PathBuf,
    stale_after: Duration,
}

impl FileStateStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            stale_after: STALE_LOCK_AGE,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 디렉토리 생성 + 쓰기 가능 여부 확인
    pub fn ensure_writable(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).map_err(|e| {
            Error::Storage(format!(
                "Cannot create {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;

        // 임시 파일은 drop 시 삭제
        let mut scratch = tempfile::NamedTempFile::new_in(&self.base_dir).map_err(|e| {
            Error::Storage(format!(
                "{} is not writable: {}",
                self.base_dir.display(),
                e
            ))
        })?;
        scratch.write_all(b"cmdgen")?;
        Ok(())
    }

    fn record_path(&self, record: &str) -> Result<PathBuf> {
        validate_record_name(record)?;
        Ok(self.base_dir.join(format!("{record}{RECORD_SUFFIX}")))
    }

    fn lock_path(&self, record: &str) -> Result<PathBuf> {
        validate_record_name(record)?;
        Ok(self.base_dir.join(format!("{record}{LOCK_SUFFIX}")))
    }
}

impl StateStore for FileStateStore {
    fn read(&self, record: &str) -> Result<Option<String>> {
        let path = self.record_path(record)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn try_lock(&self, record: &str) -> Result<Option<RecordLock>> {
        let path = self.lock_path(record)?;
        let lock = DirLock::try_acquire(&path, self.stale_after).map_err(|e| {
            Error::Storage(format!("Failed to lock {}: {}", path.display(), e))
        })?;
        Ok(lock.map(|guard| RecordLock::new(record, guard)))
    }

    fn write(&self, lock: &RecordLock, contents: &str) -> Result<()> {
        let path = self.record_path(lock.record())?;
        let parent = path.parent().unwrap_or(&self.base_dir);
        fs::create_dir_all(parent)?;

        // 같은 디렉토리에 임시 파일 작성 후 rename (부분 쓰기 방지)
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| {
            Error::Storage(format!("Failed to write {}: {}", path.display(), e.error))
        })?;

        debug!(record = lock.record(), "State record written");
        Ok(())
    }

    fn remove(&self, lock: &RecordLock) -> Result<()> {
        let path = self.record_path(lock.record())?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn clear(&self, prefix: &str) -> Result<usize> {
        let dir = if prefix.is_empty() {
            self.base_dir.clone()
        } else {
            validate_record_name(prefix)?;
            self.base_dir.join(prefix)
        };
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_record = path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(RECORD_SUFFIX))
                    .unwrap_or(false);

            if is_record {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn reclaim_stale_locks(&self) -> Result<usize> {
        sweep_stale_locks(&self.base_dir, self.stale_after)
            .map_err(|e| Error::Storage(format!("Stale lock sweep failed: {}", e)))
    }
}

/// 레코드 이름은 상대 경로 조각만 허용 (`..`, 절대 경로 금지)
fn validate_record_name(record: &str) -> Result<()> {
    let valid = !record.is_empty()
        && !record.starts_with('/')
        && record.split('/').all(|part| !part.is_empty() && part != "." && part != "..")
        && record
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'));

    if valid {
        Ok(())
    } else {
        Err(Error::Storage(format!("Invalid record name: {:?}", record)))
    }
}

// ============================================================================
// MemoryStateStore
// ============================================================================

/// 인메모리 상태 저장소 (테스트 및 단일 프로세스용)
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: Arc<Mutex<HashMap<String, String>>>,
    locks: Arc<Mutex<HashSet<String>>>,
}

struct MemoryLockGuard {
    locks: Arc<Mutex<HashSet<String>>>,
    record: String,
}

impl Drop for MemoryLockGuard {
    fn drop(&mut self) {
        self.locks.lock().remove(&self.record);
    }
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 락이 걸려 있는지
    pub fn is_locked(&self, record: &str) -> bool {
        self.locks.lock().contains(record)
    }

    /// 레코드 수
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn read(&self, record: &str) -> Result<Option<String>> {
        Ok(self.records.lock().get(record).cloned())
    }

    fn try_lock(&self, record: &str) -> Result<Option<RecordLock>> {
        let mut locks = self.locks.lock();
        if !locks.insert(record.to_string()) {
            return Ok(None);
        }
        let guard = MemoryLockGuard {
            locks: Arc::clone(&self.locks),
            record: record.to_string(),
        };
        Ok(Some(RecordLock::new(record, guard)))
    }

    fn write(&self, lock: &RecordLock, contents: &str) -> Result<()> {
        self.records
            .lock()
            .insert(lock.record().to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, lock: &RecordLock) -> Result<()> {
        self.records.lock().remove(lock.record());
        Ok(())
    }

    fn clear(&self, prefix: &str) -> Result<usize> {
        let dir = format!("{prefix}/");
        let mut records = self.records.lock();
        let before = records.len();
        if prefix.is_empty() {
            records.retain(|k, _| k.contains('/'));
        } else {
            records.retain(|k, _| !k.starts_with(&dir));
        }
        Ok(before - records.len())
    }
}
