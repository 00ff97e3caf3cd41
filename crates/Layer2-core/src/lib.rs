//! cmdgen-core: Core pipeline for cmdgen
//!
//! Layer2 - 자연어 요청을 검증된 한 줄 셸 명령어로 바꾸는 파이프라인
//!
//! # 주요 모듈
//!
//! - `sanitize`: 입력/백엔드 출력 정제
//! - `security`: 인코딩/인젝션/민감 정보 검사, 위험 명령어 차단, safe mode 판정
//! - `cache`: 내용 주소 기반 명령어 캐시 (TTL, 프로세스 간 락)
//! - `prompt`: 백엔드 프롬프트 구성
//! - `pipeline`: 전체 흐름 조율 (Orchestrator)
//!
//! # 사용 예시
//!
//! ```ignore
//! use cmdgen_core::{Pipeline, Request};
//!
//! let pipeline = Pipeline::open(config, &paths, backend, true)?;
//! let outcome = pipeline.run(&Request::new("list all python files")).await?;
//! println!("{}", outcome.command);
//! ```
//!
//! 생성된 명령어는 절대 실행하지 않는다.

pub mod cache;
pub mod pipeline;
pub mod prompt;
pub mod sanitize;
pub mod security;

// Re-exports: Pipeline
pub use pipeline::{Outcome, Pipeline, PipelineBuilder, Request};

// Re-exports: Sanitizer
pub use sanitize::{sanitize_input, sanitize_output, SanitizedInput};

// Re-exports: Security
pub use security::{
    check_injection_attempts, check_sensitive_info, generate_safety_warning, validate_command,
    validate_encoding, CommandAnalyzer, InjectionFinding, RiskTier, SafetyWarning,
    SensitiveFinding,
};

// Re-exports: Cache
pub use cache::{CacheEntry, CacheKey, CommandCache, DisabledCache, StoreCache};

// Re-exports: Prompt
pub use prompt::{is_error_sentinel, PromptBuilder, ERROR_SENTINEL};
