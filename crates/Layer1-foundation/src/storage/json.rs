//! JSON 설정 파일 로드
//!
//! 설정 파일은 사람이 직접 편집하므로 파싱 에러에 줄/열 위치를 포함한다.
//! 읽기/파싱 실패는 모두 `Error::Config` (exit 5).

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};

/// 디렉토리 하나에 묶인 JSON 설정 파일들
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    /// 파일이 없으면 None
    pub fn load_optional<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        parse(&path, &content).map(Some)
    }
}

fn parse<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| {
        Error::Config(format!(
            "{}:{}:{}: {}",
            path.display(),
            e.line(),
            e.column(),
            e
        ))
    })
}
