//! 상태 파일 경로
//!
//! 모든 영속 상태는 하나의 base 디렉토리 아래에 둔다. 환경 변수로 재지정 가능.

use super::settings::CONFIG_FILE;
use crate::{Error, Result};
use std::path::PathBuf;

pub const ENV_HOME: &str = "CMDGEN_HOME";
pub const ENV_CACHE_DIR: &str = "CMDGEN_CACHE_DIR";
pub const ENV_AUDIT_LOG: &str = "CMDGEN_AUDIT_LOG";
pub const ENV_CONFIG: &str = "CMDGEN_CONFIG";

/// 영속 상태 경로 모음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    /// base 디렉토리
    pub base_dir: PathBuf,
    /// 캐시 엔트리 루트
    pub cache_dir: PathBuf,
    /// 레이트 리밋 / 브레이커 / 풀 슬롯
    pub state_dir: PathBuf,
    /// 감사 로그 (JSON Lines, append-only)
    pub audit_log: PathBuf,
    /// 설정 파일
    pub config_file: PathBuf,
}

impl StatePaths {
    /// base 디렉토리 하나로부터 기본 레이아웃 구성
    pub fn under(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            cache_dir: base_dir.join("cache"),
            state_dir: base_dir.join("state"),
            audit_log: base_dir.join("audit.log"),
            config_file: base_dir.join(CONFIG_FILE),
            base_dir,
        }
    }

    /// 환경 변수 + 플랫폼 기본 경로로 결정
    pub fn resolve<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_dir = match lookup(ENV_HOME) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_local_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
                .ok_or_else(|| Error::Config("Cannot determine data directory".to_string()))?
                .join("cmdgen"),
        };

        let mut paths = Self::under(&base_dir);

        paths.config_file = match lookup(ENV_CONFIG) {
            Some(file) if !file.trim().is_empty() => PathBuf::from(file),
            _ => dirs::config_dir()
                .map(|d| d.join("cmdgen").join(CONFIG_FILE))
                .unwrap_or_else(|| base_dir.join(CONFIG_FILE)),
        };

        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|d| !d.trim().is_empty()) {
            paths.cache_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(ENV_AUDIT_LOG).filter(|f| !f.trim().is_empty()) {
            paths.audit_log = PathBuf::from(file);
        }

        Ok(paths)
    }

    /// 실제 프로세스 환경으로 결정
    pub fn from_env() -> Result<Self> {
        Self::resolve(|name| std::env::var(name).ok())
    }
}
