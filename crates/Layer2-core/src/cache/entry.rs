//! 캐시 키와 엔트리

use crate::sanitize::SanitizedInput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// 키 형식이 바뀌면 올려서 이전 엔트리를 무효화
pub const CACHE_KEY_VERSION: &str = "v1";

/// 캐시 키 (64자 소문자 hex, 파일 이름으로 안전)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// 출력에 영향을 주는 모드 플래그까지 포함해 키 생성
    pub fn new(input: &SanitizedInput, safe_mode: bool) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_KEY_VERSION.as_bytes());
        hasher.update([0u8]);
        hasher.update(if safe_mode { b"safe=1" } else { b"safe=0" });
        hasher.update([0u8]);
        hasher.update(input.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 캐시 엔트리
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub command: String,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, command: impl Into<String>, created_at: DateTime<Utc>, ttl_secs: u64) -> Self {
        Self {
            key: key.as_str().to_string(),
            command: command.into(),
            created_at,
            ttl_secs,
        }
    }

    /// `now - created_at > ttl` 이면 만료
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let elapsed_ms = i128::from((now - self.created_at).num_milliseconds());
        elapsed_ms > i128::from(self.ttl_secs) * 1000
    }

    /// 경과 시간 (초)
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize_input;
    use chrono::Duration;

    #[test]
    fn test_key_is_hex_fingerprint() {
        let input = sanitize_input("list all python files").unwrap();
        let key = CacheKey::new(&input, false);

        assert_eq!(key.as_str().len(), 64);
        assert!(key
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_key_depends_on_input_and_mode() {
        let a = sanitize_input("list all python files").unwrap();
        let b = sanitize_input("list   all python\nfiles").unwrap();
        let c = sanitize_input("list all rust files").unwrap();

        // 정제 결과가 같으면 같은 키
        assert_eq!(CacheKey::new(&a, false), CacheKey::new(&b, false));
        assert_ne!(CacheKey::new(&a, false), CacheKey::new(&c, false));
        assert_ne!(CacheKey::new(&a, false), CacheKey::new(&a, true));
    }

    #[test]
    fn test_expiry_is_strict() {
        let input = sanitize_input("show disk usage").unwrap();
        let key = CacheKey::new(&input, false);
        let created = Utc::now();
        let entry = CacheEntry::new(&key, "du -sh .", created, 60);

        assert!(!entry.is_expired(created));
        assert!(!entry.is_expired(created + Duration::seconds(60)));
        assert!(entry.is_expired(created + Duration::seconds(61)));
        assert_eq!(entry.age_secs(created + Duration::seconds(61)), 61);
    }
}
