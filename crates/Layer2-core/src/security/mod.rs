//! Security - 입력 검사와 명령어 안전성 분석
//!
//! - `input`: 인코딩 / 인젝션 / 민감 정보 (sanitize 전 원문 대상)
//! - `patterns`: 금지 패턴, 읽기 전용 명령어 목록
//! - `shell`: 따옴표 인식 세그먼트 분리
//! - `targets`: 삭제/쓰기 대상 경로 정규화 (루트, 홈, 원시 디스크)
//! - `analyzer`: 금지 패턴 매칭, 읽기 전용 판정, 위험도 분류
//! - `validator`: 생성된 명령어 최종 검증

mod analyzer;
mod input;
mod patterns;
mod shell;
mod targets;
mod validator;

pub use analyzer::{analyzer, CommandAnalyzer, RiskTier, SafetyWarning};
pub use input::{
    check_injection_attempts, check_sensitive_info, validate_encoding, InjectionFinding,
    SensitiveFinding,
};
pub use patterns::{DenyPattern, PatternType};
pub use shell::{split_segments, Redirect, Segment};
pub use validator::{generate_safety_warning, validate_command};
