//! Input sanitization

use cmdgen_foundation::{Error, Result};
use std::fmt;

/// 입력에서 제거되는 셸 메타문자
pub const SHELL_METACHARACTERS: &[char] = &['`', '$', ';', '|', '&', '<', '>', '\\'];

/// 정제된 사용자 요청
///
/// 제어 문자, 셸 메타문자, 줄바꿈이 없고 공백이 하나로 정규화된 비어있지 않은 문자열.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedInput(String);

impl SanitizedInput {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// 문자 수
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for SanitizedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedInput {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 사용자 요청 정제
///
/// 결과가 비어 있으면 `Error::InvalidInput`.
pub fn sanitize_input(raw: &str) -> Result<SanitizedInput> {
    let mut cleaned = String::with_capacity(raw.len());

    for c in raw.chars() {
        if SHELL_METACHARACTERS.contains(&c) {
            continue;
        }
        if c.is_whitespace() {
            // 줄바꿈, 탭 등은 공백으로
            cleaned.push(' ');
        } else if !c.is_control() {
            cleaned.push(c);
        }
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        return Err(Error::InvalidInput(
            "Input is empty after sanitization".to_string(),
        ));
    }

    Ok(SanitizedInput(collapsed))
}
