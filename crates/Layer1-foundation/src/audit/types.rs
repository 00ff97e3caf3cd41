//! Audit Log Types - 감사 로그 타입 정의
//!
//! 명령어 생성, 보안 이벤트, 성능 측정 기록을 위한 타입들입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Audit Entry ID
// ============================================================================

/// 감사 로그 엔트리 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditId(pub String);

impl AuditId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Category / Action
// ============================================================================

/// 감사 레코드 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Command,
    SecurityEvent,
    Performance,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::SecurityEvent => "security_event",
            Self::Performance => "performance",
        }
    }
}

/// 감사 대상 액션 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // 명령어
    /// 백엔드에서 새로 생성
    CommandGenerated,
    /// 캐시에서 제공
    CommandCached,

    // 보안 이벤트
    /// 인코딩 검증 실패
    EncodingRejected,
    /// 인젝션 패턴 탐지
    InjectionDetected,
    /// 민감 정보 탐지 (경고만)
    SensitiveInfoDetected,
    /// 위험 명령어 차단
    CommandBlocked,
    /// 백엔드가 에러 응답
    BackendRefused,

    // 성능 / 운영
    /// 생성 소요 시간
    GenerationTimed,
    /// 백엔드 호출 실패
    BackendFailed,
    /// 레이트 리밋 초과
    RateLimited,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommandGenerated => "command_generated",
            Self::CommandCached => "command_cached",
            Self::EncodingRejected => "encoding_rejected",
            Self::InjectionDetected => "injection_detected",
            Self::SensitiveInfoDetected => "sensitive_info_detected",
            Self::CommandBlocked => "command_blocked",
            Self::BackendRefused => "backend_refused",
            Self::GenerationTimed => "generation_timed",
            Self::BackendFailed => "backend_failed",
            Self::RateLimited => "rate_limited",
        }
    }

    /// 액션이 속한 분류
    pub fn category(&self) -> AuditCategory {
        match self {
            Self::CommandGenerated | Self::CommandCached => AuditCategory::Command,
            Self::EncodingRejected
            | Self::InjectionDetected
            | Self::SensitiveInfoDetected
            | Self::CommandBlocked
            | Self::BackendRefused => AuditCategory::SecurityEvent,
            Self::GenerationTimed | Self::BackendFailed | Self::RateLimited => {
                AuditCategory::Performance
            }
        }
    }

    /// 위험도 레벨 (0-10)
    pub fn risk_level(&self) -> u8 {
        match self {
            Self::CommandGenerated => 2,
            Self::CommandCached => 1,
            Self::EncodingRejected => 5,
            Self::InjectionDetected => 8,
            Self::SensitiveInfoDetected => 4,
            Self::CommandBlocked => 8,
            Self::BackendRefused => 3,
            Self::GenerationTimed => 0,
            Self::BackendFailed => 2,
            Self::RateLimited => 1,
        }
    }
}

// ============================================================================
// Audit Result
// ============================================================================

/// 감사 대상 작업의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failure,
    Denied,
    Timeout,
    Warning,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Denied => "denied",
            Self::Timeout => "timeout",
            Self::Warning => "warning",
        }
    }
}

// ============================================================================
// Audit Entry
// ============================================================================

/// 감사 로그 엔트리 (한 줄 = 한 레코드)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,

    pub timestamp: DateTime<Utc>,

    pub category: AuditCategory,

    pub action: AuditAction,

    pub result: AuditResult,

    /// 대상 (명령어, 정제된 입력 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub description: String,

    /// 추가 데이터
    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 위험도 레벨 (0-10)
    pub risk_level: u8,

    /// 기록한 프로세스
    pub pid: u32,
}

impl AuditEntry {
    /// 새 감사 엔트리 생성
    pub fn new(action: AuditAction) -> Self {
        Self {
            id: AuditId::new(),
            timestamp: Utc::now(),
            category: action.category(),
            action,
            result: AuditResult::Success,
            target: None,
            description: String::new(),
            data: Value::Null,
            duration_ms: None,
            error: None,
            risk_level: action.risk_level(),
            pid: std::process::id(),
        }
    }

    pub fn with_result(mut self, result: AuditResult) -> Self {
        self.result = result;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// 에러 설정 (결과는 Failure로)
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.result = AuditResult::Failure;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ============================================================================
// Audit Query
// ============================================================================

/// 감사 로그 조회 쿼리 (조건은 AND)
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub categories: Option<Vec<AuditCategory>>,
    pub actions: Option<Vec<AuditAction>>,
    pub since: Option<DateTime<Utc>>,
    /// 최신순 N개
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(mut self, categories: Vec<AuditCategory>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_actions(mut self, actions: Vec<AuditAction>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.since = Some(from);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let category_ok = self
            .categories
            .as_ref()
            .map_or(true, |c| c.contains(&entry.category));
        let action_ok = self
            .actions
            .as_ref()
            .map_or(true, |a| a.contains(&entry.action));
        let since_ok = self.since.map_or(true, |from| entry.timestamp >= from);

        category_ok && action_ok && since_ok
    }
}

// ============================================================================
// Audit Statistics
// ============================================================================

/// 감사 로그 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditStatistics {
    pub total_entries: u64,

    /// 분류별 카운트
    pub by_category: HashMap<String, u64>,

    /// 액션별 카운트
    pub by_action: HashMap<String, u64>,

    /// 캐시 적중률 (명령어 기록 중 캐시 비율)
    pub cache_hit_ratio: f64,

    /// 백엔드 생성 평균 소요 시간
    pub avg_generation_ms: Option<f64>,

    /// 읽을 수 없던 줄 수
    pub malformed_lines: u64,

    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

impl AuditStatistics {
    /// 엔트리 목록에서 통계 계산
    pub fn from_entries(entries: &[AuditEntry]) -> Self {
        let mut stats = Self {
            total_entries: entries.len() as u64,
            ..Default::default()
        };

        let mut generated = 0u64;
        let mut cached = 0u64;
        let mut timed_total = 0u64;
        let mut timed_count = 0u64;

        for entry in entries {
            *stats
                .by_category
                .entry(entry.category.as_str().to_string())
                .or_insert(0) += 1;
            *stats
                .by_action
                .entry(entry.action.as_str().to_string())
                .or_insert(0) += 1;

            match entry.action {
                AuditAction::CommandGenerated => generated += 1,
                AuditAction::CommandCached => cached += 1,
                // 캐시 제공은 생성 지연 평균에서 제외
                AuditAction::GenerationTimed if !is_cached_timing(entry) => {
                    if let Some(ms) = entry.duration_ms {
                        timed_total += ms;
                        timed_count += 1;
                    }
                }
                _ => {}
            }

            stats.period_start = Some(match stats.period_start {
                Some(start) if start <= entry.timestamp => start,
                _ => entry.timestamp,
            });
            stats.period_end = Some(match stats.period_end {
                Some(end) if end >= entry.timestamp => end,
                _ => entry.timestamp,
            });
        }

        if generated + cached > 0 {
            stats.cache_hit_ratio = cached as f64 / (generated + cached) as f64;
        }
        if timed_count > 0 {
            stats.avg_generation_ms = Some(timed_total as f64 / timed_count as f64);
        }

        stats
    }
}

fn is_cached_timing(entry: &AuditEntry) -> bool {
    entry
        .data
        .get("cached")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

// ============================================================================
// 테스트
// ============================================================================
