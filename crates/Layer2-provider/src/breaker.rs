//! Circuit Breaker - 백엔드 상태 추적
//!
//! 상태는 `state/breaker.json` 레코드에 저장되어 모든 프로세스가 공유한다.
//! 상태 전이 로직(`BreakerState`)은 순수 함수로 분리되어 있어
//! 파일 시스템 없이 테스트 가능하다.
//!
//! ```text
//! CLOSED ──(연속 실패 >= threshold)──▶ OPEN
//!   ▲                                  │ (cooldown 경과)
//!   │ 성공                              ▼
//!   └────────────────────────────── HALF_OPEN ──(실패)──▶ OPEN
//! ```

use crate::error::BackendError;
use crate::shared::update_json_async;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cmdgen_foundation::{read_json, BreakerConfig, Clock, LockRetry, StateStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Breaker 상태 레코드 이름
pub const BREAKER_RECORD: &str = "breaker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerStatus {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

/// Breaker 통과 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// CLOSED 상태의 일반 호출
    Allowed,
    /// HALF_OPEN 상태의 유일한 시험 호출
    Trial,
    Rejected { retry_after_secs: u64 },
}

/// 영속 Breaker 상태
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakerState {
    pub status: BreakerStatus,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    /// 진행 중인 HALF_OPEN 시험 호출 시작 시각
    pub trial_started_at: Option<DateTime<Utc>>,
}

impl BreakerState {
    /// 호출 허용 여부 결정 (상태를 갱신할 수 있음)
    ///
    /// `trial_timeout`보다 오래된 시험 호출은 중단된 것으로 보고 새 시험을 허용한다.
    pub fn admit(
        &mut self,
        now: DateTime<Utc>,
        config: &BreakerConfig,
        trial_timeout: Duration,
    ) -> Admission {
        match self.status {
            BreakerStatus::Closed => Admission::Allowed,
            BreakerStatus::Open => {
                let cooldown = ChronoDuration::seconds(config.cooldown_secs as i64);
                let elapsed = now - self.opened_at.unwrap_or(now);
                if elapsed >= cooldown {
                    self.status = BreakerStatus::HalfOpen;
                    self.trial_started_at = Some(now);
                    Admission::Trial
                } else {
                    Admission::Rejected {
                        retry_after_secs: ceil_secs(cooldown - elapsed),
                    }
                }
            }
            BreakerStatus::HalfOpen => {
                let trial_timeout = ChronoDuration::from_std(trial_timeout)
                    .unwrap_or_else(|_| ChronoDuration::seconds(i64::from(u32::MAX)));
                match self.trial_started_at {
                    Some(started) if now - started < trial_timeout => Admission::Rejected {
                        retry_after_secs: ceil_secs(trial_timeout - (now - started)),
                    },
                    _ => {
                        self.trial_started_at = Some(now);
                        Admission::Trial
                    }
                }
            }
        }
    }

    /// 성공: 카운터 초기화 후 CLOSED
    pub fn on_success(&mut self) {
        *self = Self::default();
    }

    /// 실패 기록
    pub fn on_failure(&mut self, now: DateTime<Utc>, config: &BreakerConfig) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);

        match self.status {
            BreakerStatus::HalfOpen => self.open(now),
            BreakerStatus::Closed if self.consecutive_failures >= config.failure_threshold => {
                self.open(now)
            }
            _ => {}
        }
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.status = BreakerStatus::Open;
        self.opened_at = Some(now);
        self.trial_started_at = None;
    }
}

fn ceil_secs(d: ChronoDuration) -> u64 {
    let ms = d.num_milliseconds().max(0) as u64;
    ms.div_ceil(1000).max(1)
}

// ============================================================================
// CircuitBreaker (영속)
// ============================================================================

/// 공유 상태 저장소 위의 Circuit Breaker
///
/// 저장소 장애 시에는 호출을 허용한다 (경고 로그).
#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: BreakerConfig,
    trial_timeout: Duration,
    retry: LockRetry,
}

impl CircuitBreaker {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>, config: BreakerConfig) -> Self {
        Self {
            store,
            clock,
            config,
            trial_timeout: Duration::from_secs(60),
            retry: LockRetry::default(),
        }
    }

    /// 시험 호출이 중단된 것으로 간주하기까지의 시간 (보통 호출 타임아웃 + 여유)
    pub fn with_trial_timeout(mut self, trial_timeout: Duration) -> Self {
        self.trial_timeout = trial_timeout;
        self
    }

    /// 호출 전 게이트
    pub async fn admit(&self) -> Result<Admission, BackendError> {
        let now = self.clock.now();
        let config = self.config.clone();
        let trial_timeout = self.trial_timeout;

        let admission = match update_json_async(
            self.store.as_ref(),
            BREAKER_RECORD,
            self.retry,
            |state: &mut BreakerState| state.admit(now, &config, trial_timeout),
        )
        .await
        {
            Ok(admission) => admission,
            Err(e) => {
                warn!(error = %e, "Circuit breaker state unavailable, allowing call");
                Admission::Allowed
            }
        };

        match admission {
            Admission::Rejected { retry_after_secs } => {
                Err(BackendError::CircuitOpen { retry_after_secs })
            }
            Admission::Trial => {
                info!("Circuit breaker half-open, sending trial call");
                Ok(admission)
            }
            Admission::Allowed => Ok(admission),
        }
    }

    /// 성공 기록
    pub async fn record_success(&self) {
        let result = update_json_async(
            self.store.as_ref(),
            BREAKER_RECORD,
            self.retry,
            |state: &mut BreakerState| {
                let recovered = state.status != BreakerStatus::Closed;
                state.on_success();
                recovered
            },
        )
        .await;

        match result {
            Ok(true) => info!("Circuit breaker closed"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to record backend success"),
        }
    }

    /// 실패 기록
    pub async fn record_failure(&self) {
        let now = self.clock.now();
        let config = self.config.clone();

        let result = update_json_async(
            self.store.as_ref(),
            BREAKER_RECORD,
            self.retry,
            |state: &mut BreakerState| {
                let was_open = state.status == BreakerStatus::Open;
                state.on_failure(now, &config);
                (!was_open && state.status == BreakerStatus::Open, state.consecutive_failures)
            },
        )
        .await;

        match result {
            Ok((true, failures)) => warn!(failures, "Circuit breaker opened"),
            Ok((false, failures)) => info!(failures, "Backend failure recorded"),
            Err(e) => warn!(error = %e, "Failed to record backend failure"),
        }
    }

    /// 현재 상태 (진단용)
    pub fn state(&self) -> BreakerState {
        read_json(self.store.as_ref(), BREAKER_RECORD)
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("trial_timeout", &self.trial_timeout)
            .finish()
    }
}
