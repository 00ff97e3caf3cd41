//! Command Cache - 검증을 통과한 명령어의 내용 주소 기반 캐시
//!
//! ## 레이아웃
//!
//! ```text
//! <cache_dir>/
//! ├── <sha256>.json        # CacheEntry
//! └── <sha256>.lock/       # 저장 중인 프로세스의 디렉토리 락
//! ```
//!
//! - 키는 정제된 입력 + safe mode 플래그의 SHA-256
//! - 만료는 조회 시점에 판단 (lazy expiry)
//! - 저장은 non-blocking: 락 경쟁에서 지면 건너뜀
//! - TTL 0 또는 쓰기 불가 디렉토리 → `DisabledCache`

mod entry;
mod store;

pub use entry::{CacheEntry, CacheKey, CACHE_KEY_VERSION};
pub use store::{open, CommandCache, DisabledCache, StoreCache};
