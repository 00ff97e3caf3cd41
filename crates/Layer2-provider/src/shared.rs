//! Shared state on the async path
//!
//! 백엔드 호출 경로는 tokio 태스크 위에서 돈다. 레코드 락을 기다리는 동안
//! 워커 스레드를 재우지 않도록 `tokio::time::sleep`으로 대기한다.

use cmdgen_foundation::{modify_json, Error, LockRetry, RecordLock, Result, StateStore};
use serde::{de::DeserializeOwned, Serialize};

/// 재시도 정책에 따라 락 획득 (비동기 대기), 실패 시 `Error::LockBusy`
pub async fn lock_record_async(
    store: &dyn StateStore,
    record: &str,
    retry: LockRetry,
) -> Result<RecordLock> {
    let attempts = retry.attempts.max(1);

    for attempt in 0..attempts {
        if let Some(lock) = store.try_lock(record)? {
            return Ok(lock);
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(retry.delay).await;
        }
    }

    Err(Error::LockBusy(record.to_string()))
}

/// 락으로 보호된 read-modify-write (비동기 대기)
pub async fn update_json_async<T, R, F>(
    store: &dyn StateStore,
    record: &str,
    retry: LockRetry,
    f: F,
) -> Result<R>
where
    T: Default + Serialize + DeserializeOwned,
    F: FnOnce(&mut T) -> R,
{
    let lock = lock_record_async(store, record, retry).await?;
    modify_json(store, &lock, f)
}
