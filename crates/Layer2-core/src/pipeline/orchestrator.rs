//! Orchestrator - 단계별 검증과 백엔드 호출 조율

use super::{Outcome, PipelineBuilder, Request};
use crate::cache::{self, CacheKey, CommandCache};
use crate::prompt::{is_error_sentinel, PromptBuilder};
use crate::sanitize::{sanitize_input, sanitize_output, SanitizedInput};
use crate::security::{
    check_injection_attempts, check_sensitive_info, generate_safety_warning, validate_command,
    validate_encoding, SensitiveFinding,
};
use cmdgen_foundation::{
    stale_lock_age, AuditAction, AuditEntry, AuditLogger, AuditResult, Clock, CmdgenConfig,
    Error, FileStateStore, Result, StatePaths, SystemClock,
};
use cmdgen_provider::{Backend, BackendError, Gateway, RateLimiter};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// 명령어 생성 파이프라인
pub struct Pipeline {
    config: CmdgenConfig,
    gateway: Gateway,
    rate_limiter: RateLimiter,
    cache: Arc<dyn CommandCache>,
    audit: Option<AuditLogger>,
    clock: Arc<dyn Clock>,
    prompt: PromptBuilder,
}

impl Pipeline {
    pub(super) fn from_parts(
        config: CmdgenConfig,
        gateway: Gateway,
        rate_limiter: RateLimiter,
        cache: Arc<dyn CommandCache>,
        audit: Option<AuditLogger>,
        clock: Arc<dyn Clock>,
        prompt: PromptBuilder,
    ) -> Self {
        Self {
            config,
            gateway,
            rate_limiter,
            cache,
            audit,
            clock,
            prompt,
        }
    }

    pub fn builder(config: CmdgenConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// 파일 기반 상태로 파이프라인 구성
    ///
    /// `state/`에 레이트 리밋과 breaker, `pool/`에 슬롯 락, `cache/`에 캐시 엔트리.
    pub fn open(
        config: CmdgenConfig,
        paths: &StatePaths,
        backend: Arc<dyn Backend>,
        use_cache: bool,
    ) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = cache::open(&paths.cache_dir, config.cache_ttl, clock.clone());
        // 슬롯 락은 백엔드 호출 내내 보유된다
        let slot_stale_after = stale_lock_age(config.timeout_duration());

        PipelineBuilder::new(config)
            .backend(backend)
            .state_store(Arc::new(FileStateStore::new(&paths.state_dir)))
            .pool_store(Arc::new(
                FileStateStore::new(paths.base_dir.join("pool")).with_stale_after(slot_stale_after),
            ))
            .cache(cache)
            .audit_logger(AuditLogger::new(&paths.audit_log))
            .clock(clock)
            .use_cache(use_cache)
            .build()
    }

    pub fn config(&self) -> &CmdgenConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn cache(&self) -> &Arc<dyn CommandCache> {
        &self.cache
    }

    // ========================================================================
    // Run
    // ========================================================================

    /// 요청 처리. 생성된 명령어는 반환만 하고 실행하지 않는다.
    pub async fn run(&self, request: &Request) -> Result<Outcome> {
        let started = Instant::now();
        let safe_mode = self.config.safe_mode;
        let text = request.text();

        // 1. 길이 (부수 효과 없음)
        let length = text.chars().count();
        if length > self.config.max_input_length {
            return Err(Error::InvalidInput(format!(
                "request is {} characters long, the maximum is {}",
                length, self.config.max_input_length
            )));
        }

        // 2. 정제
        let input = sanitize_input(&text)?;

        // 3. 인코딩
        if !validate_encoding(request.raw()) {
            self.audit(
                AuditEntry::new(AuditAction::EncodingRejected)
                    .with_result(AuditResult::Denied)
                    .with_description("Malformed UTF-8 or disallowed code points"),
            );
            return Err(Error::InvalidInput(
                "request contains invalid or disallowed characters".to_string(),
            ));
        }

        // 4. 인젝션 (정제 전 원문 대상)
        if let Some(finding) = check_injection_attempts(&text) {
            warn!(kind = finding.kind, "Injection attempt detected");
            self.audit(
                AuditEntry::new(AuditAction::InjectionDetected)
                    .with_result(AuditResult::Denied)
                    .with_target(input.as_str())
                    .with_description(finding.description)
                    .with_data(json!({ "kind": finding.kind })),
            );
            return Err(Error::InvalidInput(format!(
                "request looks like an injection attempt: {}",
                finding.description
            )));
        }

        // 5. 민감 정보 (경고만)
        let sensitive = check_sensitive_info(&text);
        if !sensitive.is_empty() {
            let kinds: Vec<&str> = sensitive.iter().map(|f| f.kind).collect();
            warn!(?kinds, "Request appears to contain sensitive information");
            self.audit(
                AuditEntry::new(AuditAction::SensitiveInfoDetected)
                    .with_result(AuditResult::Warning)
                    .with_data(json!({ "kinds": kinds })),
            );
        }

        let key = CacheKey::new(&input, safe_mode);

        // 6. 캐시 조회 (적중해도 현재 규칙으로 재검증)
        if let Some(entry) = self.cache.lookup(&key) {
            match validate_command(&entry.command, safe_mode) {
                Ok(()) => {
                    return Ok(self.finish(entry.command, true, &input, &key, sensitive, started));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Cached command no longer passes validation");
                }
            }
        }

        // 7. 레이트 리밋
        if let Err(e) = self.rate_limiter.check().await {
            self.audit(
                AuditEntry::new(AuditAction::RateLimited)
                    .with_error(e.to_string())
                    .with_result(AuditResult::Denied),
            );
            return Err(e);
        }

        // 8. 백엔드 호출
        let prompt = self.prompt.build(&input, safe_mode);
        let backend_started = Instant::now();
        let raw_output = match self.gateway.invoke(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                self.audit_backend_failure(&e, backend_started);
                return Err(e.into());
            }
        };

        // 9. 출력 정제
        let command = sanitize_output(&raw_output, self.config.multiline_policy);
        if command.is_empty() {
            self.audit(
                AuditEntry::new(AuditAction::BackendFailed)
                    .with_error("Backend output was empty after sanitization")
                    .with_duration(elapsed_ms(backend_started)),
            );
            return Err(Error::Backend(
                "backend returned no usable command".to_string(),
            ));
        }

        // 10. 거부 응답
        if is_error_sentinel(&command) {
            info!(response = %command, "Backend refused the request");
            self.audit(
                AuditEntry::new(AuditAction::BackendRefused)
                    .with_result(AuditResult::Denied)
                    .with_target(input.as_str())
                    .with_description(command.as_str()),
            );
            return Err(Error::BackendRefused(command));
        }

        // 11. 명령어 검증
        if let Err(e) = validate_command(&command, safe_mode) {
            warn!(command = %command, error = %e, "Generated command rejected");
            self.audit(
                AuditEntry::new(AuditAction::CommandBlocked)
                    .with_result(AuditResult::Denied)
                    .with_target(command.as_str())
                    .with_description(e.to_string())
                    .with_data(json!({ "safeMode": safe_mode })),
            );
            return Err(e);
        }

        // 12. 캐시 저장 (실패해도 무시)
        self.cache.store(&key, &command);

        Ok(self.finish(command, false, &input, &key, sensitive, started))
    }

    /// 성공 기록 + 결과 구성
    fn finish(
        &self,
        command: String,
        cached: bool,
        input: &SanitizedInput,
        key: &CacheKey,
        sensitive: Vec<SensitiveFinding>,
        started: Instant,
    ) -> Outcome {
        let elapsed = started.elapsed();
        let warning = generate_safety_warning(&command);

        let action = if cached {
            AuditAction::CommandCached
        } else {
            AuditAction::CommandGenerated
        };

        // 민감 정보가 있으면 입력은 기록하지 않음
        let mut data = json!({
            "cacheKey": key.as_str(),
            "safeMode": self.config.safe_mode,
            "backend": self.gateway.backend_name(),
        });
        if sensitive.is_empty() {
            data["input"] = json!(input.as_str());
        }
        if let Some(warning) = &warning {
            data["riskTier"] = json!(warning.tier.as_str());
        }

        self.audit(
            AuditEntry::new(action)
                .with_target(command.as_str())
                .with_data(data),
        );
        self.audit(
            AuditEntry::new(AuditAction::GenerationTimed)
                .with_duration(elapsed.as_millis() as u64)
                .with_data(json!({ "cached": cached })),
        );

        info!(
            cached,
            elapsed_ms = elapsed.as_millis() as u64,
            "Command ready"
        );

        Outcome {
            command,
            cached,
            warning,
            sensitive,
            elapsed,
        }
    }

    fn audit_backend_failure(&self, error: &BackendError, started: Instant) {
        let result = match error {
            BackendError::Timeout { .. } => AuditResult::Timeout,
            BackendError::CircuitOpen { .. } => AuditResult::Denied,
            _ => AuditResult::Failure,
        };

        self.audit(
            AuditEntry::new(AuditAction::BackendFailed)
                .with_error(error.to_string())
                .with_result(result)
                .with_duration(elapsed_ms(started))
                .with_data(json!({ "backend": self.gateway.backend_name() })),
        );
    }

    /// 감사 기록 실패는 요청을 실패시키지 않는다
    fn audit(&self, entry: AuditEntry) {
        let Some(logger) = &self.audit else {
            return;
        };
        if let Err(e) = logger.log(entry.with_timestamp(self.clock.now())) {
            warn!(path = %logger.path().display(), error = %e, "Failed to write audit record");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("safe_mode", &self.config.safe_mode)
            .field("gateway", &self.gateway)
            .field("cache_enabled", &self.cache.is_enabled())
            .field("audit", &self.audit.as_ref().map(|a| a.path().to_path_buf()))
            .finish()
    }
}
