//! Audit System - 감사 로깅 시스템
//!
//! 명령어 생성, 보안 이벤트, 성능 측정을 append-only로 기록합니다.
//!
//! ## 사용법
//!
//! ```ignore
//! use cmdgen_foundation::audit::{AuditLogger, AuditEntry, AuditAction, AuditResult, AuditQuery};
//!
//! let logger = AuditLogger::new(paths.audit_log.clone());
//!
//! logger.log(
//!     AuditEntry::new(AuditAction::CommandBlocked)
//!         .with_result(AuditResult::Denied)
//!         .with_target("rm -rf /"),
//! )?;
//!
//! let blocked = logger.query(
//!     &AuditQuery::new()
//!         .with_actions(vec![AuditAction::CommandBlocked])
//!         .with_limit(20),
//! )?;
//!
//! let stats = logger.statistics()?;
//! ```
//!
//! ## 감사 대상 이벤트
//!
//! | 분류 | 이벤트 | 위험도 |
//! |------|--------|-------|
//! | command | 생성 / 캐시 제공 | 1-2 |
//! | security_event | 인코딩 거부, 인젝션, 민감 정보, 차단, 백엔드 거부 | 3-8 |
//! | performance | 소요 시간, 백엔드 실패, 레이트 리밋 | 0-2 |

pub mod logger;
pub mod types;

// Re-exports
pub use logger::AuditLogger;
pub use types::{
    AuditAction, AuditCategory, AuditEntry, AuditId, AuditQuery, AuditResult, AuditStatistics,
};
