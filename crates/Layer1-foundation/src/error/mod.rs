//! Error types for cmdgen
//!
//! 모든 에러를 중앙에서 관리하고 종료 코드로 매핑

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes exposed to the invoking shell
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_INPUT: i32 = 1;
    pub const BACKEND_ERROR: i32 = 2;
    pub const DANGEROUS_COMMAND: i32 = 3;
    pub const TIMEOUT: i32 = 4;
    pub const CONFIG_ERROR: i32 = 5;
    pub const DEPENDENCY_MISSING: i32 = 6;
    pub const INTERRUPTED: i32 = 130;
}

/// cmdgen 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 입력 관련
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend answered with an error sentinel; surfaced verbatim
    #[error("{0}")]
    BackendRefused(String),

    // ========================================================================
    // 보안 관련
    // ========================================================================
    #[error("Dangerous command rejected: {reason}")]
    DangerousCommand { command: String, reason: String },

    // ========================================================================
    // Backend 관련
    // ========================================================================
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend unavailable: circuit open, retry in {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: u64 },

    #[error("Rate limited: retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // 시작 단계
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    #[error("Interrupted")]
    Interrupted,

    // ========================================================================
    // 저장소 / 락
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock busy: {0}")]
    LockBusy(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 종료 코드
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) | Error::BackendRefused(_) => exit_code::INVALID_INPUT,
            Error::DangerousCommand { .. } => exit_code::DANGEROUS_COMMAND,
            Error::Timeout(_) => exit_code::TIMEOUT,
            Error::Config(_) => exit_code::CONFIG_ERROR,
            Error::DependencyMissing(_) => exit_code::DEPENDENCY_MISSING,
            Error::Interrupted => exit_code::INTERRUPTED,
            Error::Backend(_)
            | Error::CircuitOpen { .. }
            | Error::RateLimited { .. }
            | Error::Storage(_)
            | Error::LockBusy(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Internal(_) => exit_code::BACKEND_ERROR,
        }
    }

    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Backend(_)
                | Error::Timeout(_)
                | Error::RateLimited { .. }
                | Error::CircuitOpen { .. }
        )
    }

    /// 감사 로그에 보안 이벤트로 남겨야 하는 에러인지
    pub fn is_security_event(&self) -> bool {
        matches!(self, Error::DangerousCommand { .. })
    }

    /// Suggested wait before retrying, if the error carries one
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Error::RateLimited { retry_after_secs } | Error::CircuitOpen { retry_after_secs } => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }

    /// DangerousCommand 생성 헬퍼
    pub fn dangerous(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DangerousCommand {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_taxonomy() {
        assert_eq!(Error::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(Error::BackendRefused("ERROR: no".into()).exit_code(), 1);
        assert_eq!(Error::Backend("x".into()).exit_code(), 2);
        assert_eq!(Error::RateLimited { retry_after_secs: 5 }.exit_code(), 2);
        assert_eq!(Error::CircuitOpen { retry_after_secs: 5 }.exit_code(), 2);
        assert_eq!(Error::dangerous("rm -rf /", "root").exit_code(), 3);
        assert_eq!(Error::Timeout("30s".into()).exit_code(), 4);
        assert_eq!(Error::Config("bad".into()).exit_code(), 5);
        assert_eq!(Error::DependencyMissing("claude".into()).exit_code(), 6);
        assert_eq!(Error::Interrupted.exit_code(), 130);
    }

    #[test]
    fn test_refusal_is_verbatim() {
        let err = Error::BackendRefused("ERROR: request too dangerous".into());
        assert_eq!(err.to_string(), "ERROR: request too dangerous");
    }

    #[test]
    fn test_retryable() {
        assert!(Error::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(Error::Timeout("t".into()).is_retryable());
        assert!(!Error::Config("c".into()).is_retryable());
        assert!(!Error::dangerous("x", "y").is_retryable());
        assert_eq!(
            Error::RateLimited { retry_after_secs: 7 }.retry_after_secs(),
            Some(7)
        );
    }
}
