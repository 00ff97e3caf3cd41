//! Backend-specific error types
//!
//! BackendError는 백엔드 호출 관련 세부 에러를 관리합니다.
//! cmdgen_foundation::Error와의 변환을 지원합니다.

use cmdgen_foundation::Error as FoundationError;
use thiserror::Error;

/// Exit status the backend uses for its own timeout
pub const EXIT_TIMEOUT: i32 = 124;

/// Exit status for "command not found"
pub const EXIT_NOT_FOUND: i32 = 127;

/// Errors that can occur while invoking the backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Call exceeded the per-call timeout
    #[error("Backend did not respond within {secs}s")]
    Timeout { secs: u64 },

    /// Backend executable is missing
    #[error("Backend executable not found: {0}")]
    NotFound(String),

    /// Non-zero exit
    #[error("Backend exited with status {exit_code}{}", format_stderr(.stderr))]
    Failed { exit_code: i32, stderr: String },

    /// Successful exit with nothing on stdout
    #[error("Backend returned empty output")]
    EmptyOutput,

    /// Circuit breaker is open
    #[error("Backend unavailable: circuit open, retry in {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: u64 },

    /// Every invocation slot stayed busy
    #[error("All {slots} backend slots are busy")]
    PoolExhausted { slots: usize },

    /// Process could not be spawned or awaited
    #[error("Failed to run backend: {0}")]
    Spawn(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed.lines().next().unwrap_or_default())
    }
}

impl BackendError {
    /// Classify a non-zero exit status
    pub fn from_exit(exit_code: i32, stderr: &str, timeout_secs: u64) -> Self {
        match exit_code {
            EXIT_TIMEOUT => BackendError::Timeout { secs: timeout_secs },
            EXIT_NOT_FOUND => BackendError::NotFound(stderr.trim().to_string()),
            _ => BackendError::Failed {
                exit_code,
                stderr: stderr.to_string(),
            },
        }
    }

    /// 서킷 브레이커 실패로 집계되는지
    ///
    /// 실행 파일 누락은 설정 문제이므로 상태를 바꾸지 않는다.
    pub fn trips_breaker(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout { .. } | BackendError::Failed { .. } | BackendError::EmptyOutput
        )
    }
}

// ============================================================================
// cmdgen_foundation::Error 변환
// ============================================================================

impl From<BackendError> for FoundationError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout { .. } => FoundationError::Timeout(err.to_string()),
            BackendError::NotFound(msg) => FoundationError::DependencyMissing(msg),
            BackendError::CircuitOpen { retry_after_secs } => {
                FoundationError::CircuitOpen { retry_after_secs }
            }
            BackendError::Failed { .. }
            | BackendError::EmptyOutput
            | BackendError::PoolExhausted { .. }
            | BackendError::Spawn(_) => FoundationError::Backend(err.to_string()),
        }
    }
}
