//! Configuration module
//!
//! - `settings`: CmdgenConfig (파일 + 환경 변수 + 검증)
//! - `paths`: 영속 상태 경로

mod paths;
mod settings;

pub use paths::{StatePaths, ENV_AUDIT_LOG, ENV_CACHE_DIR, ENV_CONFIG, ENV_HOME};
pub use settings::{
    BreakerConfig, CmdgenConfig, MultilinePolicy, OutputMode, RateLimitConfig, CONFIG_FILE,
    MAX_INPUT_LENGTH_LIMIT, MAX_TIMEOUT_SECS,
};
