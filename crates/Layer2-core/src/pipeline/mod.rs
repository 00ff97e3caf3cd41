//! Pipeline - 요청 하나를 검증된 명령어로 바꾸는 전체 흐름
//!
//! ```text
//! Request
//!   → 길이 검사 → sanitize_input → validate_encoding → 인젝션 검사 → 민감 정보 경고
//!   → 캐시 조회 ─ hit ──────────────────────────────────────────────┐
//!               └ miss → rate limit → gateway (slot + breaker + timeout)
//!                      → sanitize_output → sentinel 검사 → validate_command
//!                      → 캐시 저장 ─────────────────────────────────┤
//!   → 감사 기록 (command + performance) ◀──────────────────────────┘
//! ```

mod builder;
mod orchestrator;

pub use builder::PipelineBuilder;
pub use orchestrator::Pipeline;

use crate::security::{SafetyWarning, SensitiveFinding};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::time::Duration;

/// 사용자 요청 (원문 바이트 + 수신 시각)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    raw: Vec<u8>,
    received_at: DateTime<Utc>,
}

impl Request {
    pub fn new(text: impl Into<String>) -> Self {
        Self::from_bytes(text.into().into_bytes())
    }

    /// 인코딩 검증 전 원문 그대로
    pub fn from_bytes(raw: impl Into<Vec<u8>>) -> Self {
        Self {
            raw: raw.into(),
            received_at: Utc::now(),
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// 손실 변환한 텍스트 (잘못된 바이트는 U+FFFD)
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// 파이프라인 결과
#[derive(Debug, Clone)]
pub struct Outcome {
    /// 검증된 한 줄 명령어 (절대 실행하지 않음)
    pub command: String,
    /// 캐시에서 제공되었는지
    pub cached: bool,
    /// 위험도 경고 (표시 전용)
    pub warning: Option<SafetyWarning>,
    /// 입력에서 탐지된 민감 정보 (경고 전용)
    pub sensitive: Vec<SensitiveFinding>,
    pub elapsed: Duration,
}
