//! Backend Gateway - 슬롯 풀 + 서킷 브레이커 + 타임아웃으로 감싼 백엔드 호출
//!
//! 모든 호출은 슬롯을 잡고, breaker 게이트를 통과한 뒤, 호출 타임아웃 안에서만 실행된다.

use crate::{
    backend::Backend, breaker::CircuitBreaker, error::BackendError, pool::InvocationPool,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Gateway that guards every backend invocation
pub struct Gateway {
    backend: Arc<dyn Backend>,
    breaker: CircuitBreaker,
    pool: InvocationPool,
    timeout: Duration,
}

impl Gateway {
    pub fn new(
        backend: Arc<dyn Backend>,
        breaker: CircuitBreaker,
        pool: InvocationPool,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            breaker,
            pool,
            timeout,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// 프롬프트 전송, 백엔드 stdout 반환
    pub async fn invoke(&self, prompt: &str) -> Result<String, BackendError> {
        let _slot = self.pool.acquire().await?;
        let admission = self.breaker.admit().await?;

        let started = Instant::now();
        let result = self
            .backend
            .invoke(prompt, self.timeout)
            .await
            .and_then(|output| output.into_text(self.timeout));

        match &result {
            Ok(_) => {
                debug!(
                    backend = self.backend.name(),
                    ?admission,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Backend call succeeded"
                );
                self.breaker.record_success().await;
            }
            Err(e) if e.trips_breaker() => {
                warn!(backend = self.backend.name(), error = %e, "Backend call failed");
                self.breaker.record_failure().await;
            }
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Backend unavailable");
            }
        }

        result
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("backend", &self.backend.name())
            .field("breaker", &self.breaker)
            .field("pool", &self.pool)
            .field("timeout", &self.timeout)
            .finish()
    }
}
