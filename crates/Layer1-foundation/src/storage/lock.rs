//! Directory lock - 프로세스 간 상호 배제
//!
//! 락 디렉토리는 보유자 기록(`owner`)을 담은 채로 rename 되어 한 번에 나타난다.
//! 따라서 비어 있지 않은 락 디렉토리는 항상 누군가의 것이고, rename 은
//! 비어 있지 않은 대상 위로 덮어쓰지 못하므로 동시에 둘이 잡을 수 없다.
//!
//! 오래된 락(보유자 크래시)은 고유한 이름(tombstone)으로 옮긴 뒤 지운다.
//! 옮긴 것이 판정한 그 락이 아니면 되돌려 놓는다. 해제 시에는 자기 토큰이
//! 기록된 락만 지운다.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

/// 이 시간보다 오래된 락은 버려진 것으로 간주
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

/// 보유 시간 상한에 더하는 여유
pub const STALE_LOCK_MARGIN: Duration = Duration::from_secs(30);

/// 락 디렉토리 확장자
pub const LOCK_SUFFIX: &str = ".lock";

const OWNER_FILE: &str = "owner";
const STAGING_PREFIX: &str = ".lock-staging-";
const TOMBSTONE_MARKER: &str = ".tombstone-";

/// 최대 `hold_limit` 동안 보유되는 락의 stale 임계값
///
/// 백엔드 호출 동안 잡고 있는 슬롯 락처럼 오래 보유되는 락은 호출 타임아웃보다
/// 먼저 회수되면 안 된다.
pub fn stale_lock_age(hold_limit: Duration) -> Duration {
    (hold_limit + STALE_LOCK_MARGIN).max(STALE_LOCK_AGE)
}

/// 락 보유자 기록
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockOwner {
    pid: u32,
    token: String,
    /// 보유자가 사용한 stale 임계값. 다른 프로세스도 이보다 일찍 회수하지 않는다.
    stale_after_ms: u64,
}

/// 락 디렉토리 가드 - drop 시 해제
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    token: String,
}

impl DirLock {
    /// 비차단 락 획득
    ///
    /// 다른 보유자가 있으면 `Ok(None)`. 오래된 락은 한 번 회수 후 재시도한다.
    pub fn try_acquire(path: impl Into<PathBuf>, stale_after: Duration) -> io::Result<Option<Self>> {
        let path = path.into();
        let owner = LockOwner {
            pid: std::process::id(),
            token: Uuid::new_v4().simple().to_string(),
            stale_after_ms: stale_after.as_millis().try_into().unwrap_or(u64::MAX),
        };

        if publish(&path, &owner)? {
            return Ok(Some(Self::held(path, owner.token)));
        }

        if !is_stale(&path, stale_after) || !reclaim(&path, stale_after)? {
            return Ok(None);
        }

        // 회수 직후 다른 프로세스가 먼저 잡을 수 있음
        if publish(&path, &owner)? {
            Ok(Some(Self::held(path, owner.token)))
        } else {
            Ok(None)
        }
    }

    fn held(path: PathBuf, token: String) -> Self {
        debug!(lock = %path.display(), "Lock acquired");
        Self { path, token }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 락 디렉토리가 아직 이 가드의 것인지
    pub fn is_held(&self) -> bool {
        owner_token(&self.path).as_deref() == Some(self.token.as_str())
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if !self.is_held() {
            warn!(lock = %self.path.display(), "Lock was reclaimed by another holder, leaving it in place");
            return;
        }

        match release(&self.path, &self.token) {
            Ok(()) => debug!(lock = %self.path.display(), "Lock released"),
            Err(e) => warn!(lock = %self.path.display(), error = %e, "Failed to release lock"),
        }
    }
}

/// 보유자 기록을 담은 디렉토리를 만들어 `path`로 rename
///
/// `Ok(false)`: 다른 보유자의 락이 이미 있음
fn publish(path: &Path, owner: &LockOwner) -> io::Result<bool> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    // 실패 경로에서는 drop 시 삭제된다
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)?;
    let record = serde_json::to_string(owner).map_err(io::Error::other)?;
    fs::write(staging.path().join(OWNER_FILE), record)?;

    match fs::rename(staging.path(), path) {
        Ok(()) => Ok(true),
        Err(_) if path.is_dir() => Ok(false),
        Err(e) => Err(e),
    }
}

fn read_owner(path: &Path) -> Option<LockOwner> {
    let content = fs::read_to_string(path.join(OWNER_FILE)).ok()?;
    serde_json::from_str(&content).ok()
}

fn owner_token(path: &Path) -> Option<String> {
    read_owner(path).map(|owner| owner.token)
}

/// 같은 디렉토리 안의 고유한 이름으로 옮긴다. 이미 없으면 `Ok(None)`
fn move_aside(path: &Path) -> io::Result<Option<PathBuf>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tombstone = path.with_file_name(format!(
        "{name}{TOMBSTONE_MARKER}{}",
        Uuid::new_v4().simple()
    ));

    match fs::rename(path, &tombstone) {
        Ok(()) => Ok(Some(tombstone)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// 잘못 옮긴 락을 되돌린다. 그 사이 자리가 차 있으면 버린다.
fn restore(tombstone: &Path, path: &Path) {
    if let Err(e) = fs::rename(tombstone, path) {
        warn!(lock = %path.display(), error = %e, "Could not restore moved lock");
        let _ = remove_dir(tombstone);
    }
}

fn remove_dir(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn release(path: &Path, token: &str) -> io::Result<()> {
    let Some(tombstone) = move_aside(path)? else {
        return Ok(());
    };
    if owner_token(&tombstone).as_deref() != Some(token) {
        restore(&tombstone, path);
        return Ok(());
    }
    remove_dir(&tombstone)
}

/// 오래된 락 회수. 동시에 여러 프로세스가 시도해도 하나만 `Ok(true)`
fn reclaim(path: &Path, stale_after: Duration) -> io::Result<bool> {
    let judged = owner_token(path);
    let Some(tombstone) = move_aside(path)? else {
        return Ok(false);
    };

    // 판정과 rename 사이에 새 보유자가 잡은 락이면 되돌린다
    if owner_token(&tombstone) != judged || !is_stale(&tombstone, stale_after) {
        restore(&tombstone, path);
        return Ok(false);
    }

    warn!(lock = %path.display(), "Reclaiming stale lock");
    remove_dir(&tombstone)?;
    Ok(true)
}

/// 락 나이가 임계값을 넘었는지
///
/// 보유자가 더 긴 임계값을 기록해 두었으면 그것을 따른다.
pub fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(t) => t,
        // 사라졌으면 stale 아님 (다음 시도에서 생성)
        Err(_) => return false,
    };

    let threshold = read_owner(path)
        .map(|owner| stale_after.max(Duration::from_millis(owner.stale_after_ms)))
        .unwrap_or(stale_after);

    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > threshold)
        .unwrap_or(false)
}

/// 회수 도중 남은 임시 디렉토리인지
fn is_debris(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX) || name.contains(TOMBSTONE_MARKER)
}

/// 디렉토리 트리에서 오래된 락을 모두 회수
///
/// 시작 시 정리와 에러 경로 정리에서 호출된다. 반환값은 회수한 락 수.
pub fn sweep_stale_locks(root: &Path, stale_after: Duration) -> io::Result<usize> {
    if !root.exists() {
        return Ok(0);
    }

    let mut reclaimed = 0;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            // 순회 중 회수되어 사라진 항목은 건너뜀
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if is_debris(&name) {
                if is_stale(&path, stale_after) {
                    debug!(path = %path.display(), "Removing leftover lock directory");
                    remove_dir(&path)?;
                }
                continue;
            }

            if !name.ends_with(LOCK_SUFFIX) {
                pending.push(path);
                continue;
            }

            if is_stale(&path, stale_after) && reclaim(&path, stale_after)? {
                warn!(lock = %path.display(), "Swept stale lock");
                reclaimed += 1;
            }
        }
    }

    Ok(reclaimed)
}
