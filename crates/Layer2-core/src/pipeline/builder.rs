//! Pipeline builder - 저장소, 캐시, 시계 주입

use super::orchestrator::Pipeline;
use crate::cache::{CommandCache, DisabledCache};
use crate::prompt::PromptBuilder;
use cmdgen_foundation::{
    AuditLogger, Clock, CmdgenConfig, Error, MemoryStateStore, Result, StateStore, SystemClock,
};
use cmdgen_provider::{Backend, CircuitBreaker, Gateway, InvocationPool, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

/// 지정하지 않은 협력 객체는 프로세스 로컬 기본값을 쓴다
/// (메모리 상태 저장소, 캐시 비활성, 감사 로그 없음, 시스템 시계).
pub struct PipelineBuilder {
    config: CmdgenConfig,
    backend: Option<Arc<dyn Backend>>,
    state_store: Option<Arc<dyn StateStore>>,
    pool_store: Option<Arc<dyn StateStore>>,
    cache: Option<Arc<dyn CommandCache>>,
    audit: Option<AuditLogger>,
    clock: Option<Arc<dyn Clock>>,
    prompt: Option<PromptBuilder>,
    pool_max_wait: Option<Duration>,
    use_cache: bool,
}

impl PipelineBuilder {
    pub fn new(config: CmdgenConfig) -> Self {
        Self {
            config,
            backend: None,
            state_store: None,
            pool_store: None,
            cache: None,
            audit: None,
            clock: None,
            prompt: None,
            pool_max_wait: None,
            use_cache: true,
        }
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// 레이트 리밋 / breaker 상태 저장소
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// 호출 슬롯 락 저장소 (기본: 상태 저장소와 공유)
    pub fn pool_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.pool_store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CommandCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn audit_logger(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(logger);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn pool_max_wait(mut self, max_wait: Duration) -> Self {
        self.pool_max_wait = Some(max_wait);
        self
    }

    /// false면 이번 실행에서 캐시 조회/저장을 건너뜀 (`--no-cache`)
    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let backend = self
            .backend
            .ok_or_else(|| Error::Internal("Pipeline requires a backend".to_string()))?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let state_store = self
            .state_store
            .unwrap_or_else(|| Arc::new(MemoryStateStore::new()));
        let pool_store = self.pool_store.unwrap_or_else(|| state_store.clone());

        let timeout = self.config.timeout_duration();

        // 호출 타임아웃을 넘긴 시험 호출은 중단된 것으로 간주
        let breaker = CircuitBreaker::new(
            state_store.clone(),
            clock.clone(),
            self.config.breaker.clone(),
        )
        .with_trial_timeout(timeout + Duration::from_secs(5));

        let mut pool = InvocationPool::new(pool_store, self.config.pool_slots);
        if let Some(max_wait) = self.pool_max_wait {
            pool = pool.with_max_wait(max_wait);
        }

        let rate_limiter = RateLimiter::new(
            state_store,
            clock.clone(),
            self.config.rate_limit.clone(),
        );

        let cache = if self.use_cache {
            self.cache.unwrap_or_else(|| Arc::new(DisabledCache))
        } else {
            Arc::new(DisabledCache)
        };

        Ok(Pipeline::from_parts(
            self.config,
            Gateway::new(backend, breaker, pool, timeout),
            rate_limiter,
            cache,
            self.audit,
            clock,
            self.prompt.unwrap_or_default(),
        ))
    }
}
