//! Command Validator - 생성된 명령어의 최종 안전 검증

use super::analyzer::{analyzer, SafetyWarning};
use crate::sanitize::EXECUTION_TRIGGERS;
use cmdgen_foundation::{Error, Result};
use tracing::debug;

/// 명령어 검증
///
/// 1. 금지 패턴 (모드와 무관)
/// 2. 구조 검사: 비어 있지 않음, 제어 문자 없음, 치환 없음, 따옴표 균형
/// 3. safe mode: 모든 세그먼트가 읽기 전용이어야 함
pub fn validate_command(command: &str, safe_mode: bool) -> Result<()> {
    let analyzer = analyzer();

    if let Some(reason) = analyzer.check_denylist(command) {
        return Err(Error::dangerous(command, reason));
    }

    check_structure(command)?;

    if safe_mode {
        analyzer
            .check_read_only(command)
            .map_err(|reason| Error::dangerous(command, format!("Safe mode: {}", reason)))?;
    }

    debug!(command, safe_mode, "Command validated");
    Ok(())
}

fn check_structure(command: &str) -> Result<()> {
    if command.trim().is_empty() {
        return Err(Error::InvalidInput("generated command is empty".to_string()));
    }
    if command.chars().any(char::is_control) {
        return Err(Error::dangerous(command, "contains control characters"));
    }
    // 출력 정제를 거쳤어도 캐시나 다른 경로로 들어온 명령어는 다시 막는다
    if command.contains('`') || EXECUTION_TRIGGERS.iter().any(|t| command.contains(t)) {
        return Err(Error::dangerous(
            command,
            "contains command or process substitution",
        ));
    }
    match shlex::split(command) {
        Some(tokens) if !tokens.is_empty() => Ok(()),
        Some(_) => Err(Error::InvalidInput("generated command is empty".to_string())),
        None => Err(Error::dangerous(command, "unbalanced quoting")),
    }
}

/// 위험도 경고 생성 (표시 전용)
pub fn generate_safety_warning(command: &str) -> Option<SafetyWarning> {
    analyzer().safety_warning(command)
}
