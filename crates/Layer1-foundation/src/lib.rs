//! # cmdgen-foundation
//!
//! Foundation layer for cmdgen:
//! - Error: 에러 분류와 종료 코드
//! - Config: 통합 설정 (CmdgenConfig, StatePaths)
//! - Storage: 디렉토리 락, 공유 상태 레코드, JSON 설정 저장소
//! - Audit: append-only 감사 로그
//! - Clock: 시간 소스 (테스트에서 주입)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  cmdgen-core (Pipeline)                                  │
//! │      │                                                   │
//! │      ▼                                                   │
//! │  StateStore ── FileStateStore (mkdir lock + rename)      │
//! │      │           ├── cache/<key>.json                    │
//! │      │           ├── state/ratelimit.json                │
//! │      │           └── state/breaker.json                  │
//! │      └──────── MemoryStateStore (tests)                  │
//! │                                                          │
//! │  AuditLogger ── audit.log (JSON Lines, O_APPEND)         │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{exit_code, Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    BreakerConfig, CmdgenConfig, MultilinePolicy, OutputMode, RateLimitConfig, StatePaths,
    CONFIG_FILE, MAX_INPUT_LENGTH_LIMIT, MAX_TIMEOUT_SECS,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{
    modify_json, read_json, stale_lock_age, sweep_stale_locks, DirLock, FileStateStore, JsonStore,
    LockRetry, MemoryStateStore, RecordLock, StateStore, STALE_LOCK_AGE,
};

// ============================================================================
// Audit (감사 로깅)
// ============================================================================
pub use audit::{
    AuditAction, AuditCategory, AuditEntry, AuditId, AuditLogger, AuditQuery, AuditResult,
    AuditStatistics,
};

// ============================================================================
// Clock
// ============================================================================
pub use clock::{Clock, ManualClock, SystemClock};
