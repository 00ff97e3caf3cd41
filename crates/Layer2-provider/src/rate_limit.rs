//! Rate Limiter - 슬라이딩 윈도우
//!
//! 호출 시각 목록을 `state/ratelimit.json`에 저장한다.
//! 매 CLI 호출이 별도 프로세스이므로 윈도우 상태는 반드시 영속되어야 한다.

use crate::shared::update_json_async;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cmdgen_foundation::{Clock, Error, LockRetry, RateLimitConfig, Result, StateStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// 레이트 리밋 레코드 이름
pub const RATE_LIMIT_RECORD: &str = "ratelimit";

/// 윈도우 내 호출 시각들
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateWindow {
    pub timestamps: Vec<DateTime<Utc>>,
}

impl RateWindow {
    /// 허용되면 현재 시각을 기록, 초과면 대기 시간(초) 반환
    pub fn try_admit(
        &mut self,
        now: DateTime<Utc>,
        config: &RateLimitConfig,
    ) -> std::result::Result<(), u64> {
        let window = ChronoDuration::seconds(config.window_secs as i64);

        // 윈도우 밖 기록 제거 (시계가 뒤로 간 경우 미래 기록도 제거)
        self.timestamps.retain(|t| *t <= now && now - *t < window);

        if self.timestamps.len() >= config.max_requests as usize {
            let oldest = self.timestamps.iter().min().copied().unwrap_or(now);
            let wait = window - (now - oldest);
            let retry_after = (wait.num_milliseconds().max(0) as u64).div_ceil(1000).max(1);
            return Err(retry_after);
        }

        self.timestamps.push(now);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// 영속 레이트 리미터
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
    retry: LockRetry,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self {
            store,
            clock,
            config,
            retry: LockRetry::default(),
        }
    }

    /// 호출 허용 여부 확인 및 기록
    ///
    /// 초과 시 `Error::RateLimited`. 저장소 장애는 허용으로 처리한다.
    pub async fn check(&self) -> Result<()> {
        if !self.config.is_enabled() {
            return Ok(());
        }

        let now = self.clock.now();
        let config = self.config.clone();

        match update_json_async(
            self.store.as_ref(),
            RATE_LIMIT_RECORD,
            self.retry,
            |window: &mut RateWindow| window.try_admit(now, &config),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!("Rate limit check passed");
                Ok(())
            }
            Ok(Err(retry_after_secs)) => {
                warn!(
                    max_requests = self.config.max_requests,
                    window_secs = self.config.window_secs,
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                Err(Error::RateLimited { retry_after_secs })
            }
            Err(e) => {
                warn!(error = %e, "Rate limiter unavailable, allowing request");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdgen_foundation::{FileStateStore, ManualClock, MemoryStateStore};
    use tempfile::TempDir;

    fn config(max_requests: u32, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window_secs,
        }
    }

    #[test]
    fn test_window_rejects_over_limit() {
        let now = Utc::now();
        let mut window = RateWindow::default();
        let cfg = config(2, 60);

        assert!(window.try_admit(now, &cfg).is_ok());
        assert!(window.try_admit(now + ChronoDuration::seconds(10), &cfg).is_ok());
        assert_eq!(
            window.try_admit(now + ChronoDuration::seconds(20), &cfg),
            Err(40)
        );
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_window_slides() {
        let now = Utc::now();
        let mut window = RateWindow::default();
        let cfg = config(1, 60);

        assert!(window.try_admit(now, &cfg).is_ok());
        assert!(window.try_admit(now + ChronoDuration::seconds(59), &cfg).is_err());
        assert!(window.try_admit(now + ChronoDuration::seconds(60), &cfg).is_ok());
    }

    #[tokio::test]
    async fn test_limiter_n_plus_one_rejected() {
        let store = Arc::new(MemoryStateStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let limiter = RateLimiter::new(store, clock, config(3, 60));

        for _ in 0..3 {
            limiter.check().await.unwrap();
        }
        let err = limiter.check().await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_limiter_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());

        let first = RateLimiter::new(
            Arc::new(FileStateStore::new(temp.path())),
            clock.clone(),
            config(1, 60),
        );
        first.check().await.unwrap();

        let second = RateLimiter::new(
            Arc::new(FileStateStore::new(temp.path())),
            clock.clone(),
            config(1, 60),
        );
        assert!(second.check().await.is_err());

        clock.advance_secs(61);
        assert!(second.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_limiter_always_allows() {
        let store = Arc::new(MemoryStateStore::new());
        let limiter = RateLimiter::new(
            store.clone(),
            Arc::new(ManualClock::starting_now()),
            config(0, 60),
        );
        for _ in 0..10 {
            limiter.check().await.unwrap();
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_held_lock_degrades_to_allow() {
        let store = Arc::new(MemoryStateStore::new());
        let _held = store.try_lock(RATE_LIMIT_RECORD).unwrap().unwrap();
        let limiter = RateLimiter {
            retry: LockRetry::NON_BLOCKING,
            ..RateLimiter::new(
                store.clone(),
                Arc::new(ManualClock::starting_now()),
                config(1, 60),
            )
        };

        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_ok());
    }
}
