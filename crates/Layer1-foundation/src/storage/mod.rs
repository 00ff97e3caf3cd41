//! Storage module for cmdgen
//!
//! - `lock`: 디렉토리 락 (프로세스 간 상호 배제, stale 회수)
//! - `state`: 공유 상태 레코드 (캐시, 레이트 리밋, 브레이커)
//! - `json`: JSON 설정 파일 로드

mod json;
pub mod lock;
pub mod state;

// JSON Storage (설정)
pub use json::JsonStore;

// Locks
pub use lock::{stale_lock_age, sweep_stale_locks, DirLock, STALE_LOCK_AGE};

// Shared state
pub use state::{
    modify_json, read_json, FileStateStore, LockRetry, MemoryStateStore, RecordLock,
    StateStore,
};
