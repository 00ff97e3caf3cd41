//! Sanitizer - 입력 및 백엔드 출력 정제
//!
//! - `input`: 사용자 요청 정제 (셸 메타문자, 제어 문자, 줄바꿈 제거)
//! - `output`: 백엔드 출력 정제 (ANSI, 코드 펜스, 실행 트리거 제거, 한 줄 강제)

mod input;
mod output;

pub use input::{sanitize_input, SanitizedInput, SHELL_METACHARACTERS};
pub use output::{sanitize_output, EXECUTION_TRIGGERS};
