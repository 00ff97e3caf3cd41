//! Cmdgen Config - 통합 설정
//!
//! 시작 시 한 번 만들어져 모든 컴포넌트 생성자에 전달되는 불변 설정.
//! 로드 순서: 기본값 → 설정 파일 → 환경 변수 → CLI 플래그, 마지막에 `validate()`.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 설정 파일명
pub const CONFIG_FILE: &str = "config.json";

/// 백엔드 호출 타임아웃 상한 (초)
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// 입력 길이 상한
pub const MAX_INPUT_LENGTH_LIMIT: usize = 10_000;

// ============================================================================
// Enums
// ============================================================================

/// 생성된 명령어 전달 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// prefill → clipboard → stdout 순으로 시도
    #[default]
    Auto,
    Prefill,
    Clipboard,
    Stdout,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Prefill => "prefill",
            Self::Clipboard => "clipboard",
            Self::Stdout => "stdout",
        }
    }
}

impl std::str::FromStr for OutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "prefill" => Ok(Self::Prefill),
            "clipboard" => Ok(Self::Clipboard),
            "stdout" => Ok(Self::Stdout),
            other => Err(Error::Config(format!(
                "Unknown output mode '{}' (expected auto, prefill, clipboard, stdout)",
                other
            ))),
        }
    }
}

/// 백엔드 출력이 여러 줄일 때의 처리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultilinePolicy {
    /// 첫 번째 비어있지 않은 줄만 사용
    #[default]
    FirstLine,
    /// 모든 줄을 공백으로 연결
    Join,
}

impl std::str::FromStr for MultilinePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_line" | "first-line" => Ok(Self::FirstLine),
            "join" => Ok(Self::Join),
            other => Err(Error::Config(format!(
                "Unknown multiline policy '{}' (expected first_line, join)",
                other
            ))),
        }
    }
}

// ============================================================================
// Sub configs
// ============================================================================

/// 레이트 리밋 설정 (슬라이딩 윈도우)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RateLimitConfig {
    /// 윈도우당 최대 요청 수 (0이면 비활성화)
    pub max_requests: u32,
    /// 윈도우 길이 (초)
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }
}

/// 서킷 브레이커 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BreakerConfig {
    /// OPEN 전환까지의 연속 실패 수
    pub failure_threshold: u32,
    /// OPEN 유지 시간 (초)
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

// ============================================================================
// CmdgenConfig
// ============================================================================

/// cmdgen 통합 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CmdgenConfig {
    pub output_mode: OutputMode,

    /// 캐시 TTL (초). 0이면 캐시 비활성화
    pub cache_ttl: u64,

    /// 읽기 전용 명령어만 허용
    pub safe_mode: bool,

    pub debug: bool,

    /// 백엔드 호출 타임아웃 (초, 1..=600)
    pub timeout: u64,

    /// 입력 최대 길이 (문자 수)
    pub max_input_length: usize,

    pub color_output: bool,

    pub multiline_policy: MultilinePolicy,

    /// 백엔드 실행 파일
    pub backend_command: String,

    /// 프롬프트 앞에 붙는 백엔드 인자
    pub backend_args: Vec<String>,

    pub rate_limit: RateLimitConfig,

    pub breaker: BreakerConfig,

    /// 동시 백엔드 호출 슬롯 수
    pub pool_slots: usize,
}

impl Default for CmdgenConfig {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::Auto,
            cache_ttl: 3600,
            safe_mode: false,
            debug: false,
            timeout: 30,
            max_input_length: 500,
            color_output: true,
            multiline_policy: MultilinePolicy::FirstLine,
            backend_command: "claude".to_string(),
            backend_args: vec!["-p".to_string()],
            rate_limit: RateLimitConfig::default(),
            breaker: BreakerConfig::default(),
            pool_slots: 4,
        }
    }
}

impl CmdgenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 설정 파일 로드 (없으면 기본값)
    pub fn load_from(path: &Path) -> Result<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;

        let config = JsonStore::new(dir)
            .load_optional::<CmdgenConfig>(filename)?
            .unwrap_or_default();
        Ok(config)
    }

    /// 환경 변수 오버라이드 적용
    ///
    /// `lookup`은 변수 이름으로 값을 조회한다 (테스트에서 주입 가능).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CMDGEN_SAFE_MODE") {
            self.safe_mode = parse_bool("CMDGEN_SAFE_MODE", &v)?;
        }
        if let Some(v) = lookup("CMDGEN_TIMEOUT") {
            self.timeout = parse_number("CMDGEN_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("CMDGEN_CACHE_TTL") {
            self.cache_ttl = parse_number("CMDGEN_CACHE_TTL", &v)?;
        }
        if let Some(v) = lookup("CMDGEN_OUTPUT_MODE") {
            self.output_mode = v.parse()?;
        }
        if let Some(v) = lookup("CMDGEN_DEBUG") {
            self.debug = parse_bool("CMDGEN_DEBUG", &v)?;
        }
        if let Some(v) = lookup("CMDGEN_BACKEND") {
            self.backend_command = v;
        }
        Ok(())
    }

    /// 범위 검증 - 실패 시 시작 단계에서 종료 (exit 5)
    pub fn validate(&self) -> Result<()> {
        if self.timeout == 0 || self.timeout > MAX_TIMEOUT_SECS {
            return Err(Error::Config(format!(
                "timeout must be between 1 and {} seconds (got {})",
                MAX_TIMEOUT_SECS, self.timeout
            )));
        }
        if self.max_input_length == 0 || self.max_input_length > MAX_INPUT_LENGTH_LIMIT {
            return Err(Error::Config(format!(
                "maxInputLength must be between 1 and {} (got {})",
                MAX_INPUT_LENGTH_LIMIT, self.max_input_length
            )));
        }
        if self.backend_command.trim().is_empty() {
            return Err(Error::Config("backendCommand must not be empty".to_string()));
        }
        if self.rate_limit.is_enabled() && self.rate_limit.window_secs == 0 {
            return Err(Error::Config(
                "rateLimit.windowSecs must be positive when rate limiting is enabled".to_string(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(Error::Config(
                "breaker.failureThreshold must be at least 1".to_string(),
            ));
        }
        if self.pool_slots == 0 || self.pool_slots > 32 {
            return Err(Error::Config(format!(
                "poolSlots must be between 1 and 32 (got {})",
                self.pool_slots
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_ttl > 0
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn safe_mode(mut self, enabled: bool) -> Self {
        self.safe_mode = enabled;
        self
    }

    pub fn cache_ttl(mut self, secs: u64) -> Self {
        self.cache_ttl = secs;
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn multiline_policy(mut self, policy: MultilinePolicy) -> Self {
        self.multiline_policy = policy;
        self
    }

    pub fn max_input_length(mut self, len: usize) -> Self {
        self.max_input_length = len;
        self
    }

    pub fn rate_limit(mut self, max_requests: u32, window_secs: u64) -> Self {
        self.rate_limit = RateLimitConfig {
            max_requests,
            window_secs,
        };
        self
    }

    pub fn breaker(mut self, failure_threshold: u32, cooldown_secs: u64) -> Self {
        self.breaker = BreakerConfig {
            failure_threshold,
            cooldown_secs,
        };
        self
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean (got '{}')",
            name, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number (got '{}')", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = CmdgenConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_input_length, 500);
        assert_eq!(config.timeout_duration(), Duration::from_secs(30));
        assert!(config.cache_enabled());
    }

    #[test]
    fn test_timeout_range() {
        assert!(CmdgenConfig::new().timeout(600).validate().is_ok());
        assert!(matches!(
            CmdgenConfig::new().timeout(601).validate(),
            Err(Error::Config(_))
        ));
        assert!(CmdgenConfig::new().timeout(0).validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{"safeMode": true, "cacheTtl": 0, "outputMode": "stdout", "rateLimit": {"maxRequests": 5}}"#,
        )
        .unwrap();

        let config = CmdgenConfig::load_from(&path).unwrap();
        assert!(config.safe_mode);
        assert!(!config.cache_enabled());
        assert_eq!(config.output_mode, OutputMode::Stdout);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.timeout, 30);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"safe_mode_typo": true}"#).unwrap();
        assert!(matches!(
            CmdgenConfig::load_from(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = CmdgenConfig::load_from(&temp.path().join("absent.json")).unwrap();
        assert_eq!(config, CmdgenConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CMDGEN_SAFE_MODE", "yes"),
            ("CMDGEN_TIMEOUT", "45"),
            ("CMDGEN_OUTPUT_MODE", "clipboard"),
        ]
        .into_iter()
        .collect();

        let mut config = CmdgenConfig::default();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert!(config.safe_mode);
        assert_eq!(config.timeout, 45);
        assert_eq!(config.output_mode, OutputMode::Clipboard);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = CmdgenConfig::default();
        let result = config.apply_env(|name| {
            (name == "CMDGEN_TIMEOUT").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("PREFILL".parse::<OutputMode>().unwrap(), OutputMode::Prefill);
        assert!("fax".parse::<OutputMode>().is_err());
        assert_eq!(
            "join".parse::<MultilinePolicy>().unwrap(),
            MultilinePolicy::Join
        );
    }
}
