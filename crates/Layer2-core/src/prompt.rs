//! Prompt - 백엔드에 전달할 프롬프트 구성

use crate::sanitize::SanitizedInput;

/// 백엔드가 요청을 거부할 때 출력하는 접두어
pub const ERROR_SENTINEL: &str = "ERROR:";

/// 정제된 백엔드 출력이 거부 응답인지
pub fn is_error_sentinel(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_SENTINEL)
}

/// 프롬프트 빌더 (OS / 셸 컨텍스트 포함)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    os: String,
    shell: String,
}

impl PromptBuilder {
    pub fn new(os: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            shell: shell.into(),
        }
    }

    /// 현재 프로세스 환경에서 OS와 `$SHELL` 감지
    pub fn from_env() -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .and_then(|path| path.rsplit('/').next().map(str::to_string))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "sh".to_string());
        Self::new(std::env::consts::OS, shell)
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn build(&self, request: &SanitizedInput, safe_mode: bool) -> String {
        let mut prompt = format!(
            "You translate requests into a single {shell} command for {os}.\n\
             \n\
             Rules:\n\
             - Reply with exactly one line containing only the command.\n\
             - No explanations, no markdown, no code fences, no comments.\n\
             - Prefer standard tools that are available by default on {os}.\n\
             - If the request is unsafe, destructive, or cannot be expressed as a command, \
             reply with `{sentinel} <short reason>` instead.\n",
            shell = self.shell,
            os = self.os,
            sentinel = ERROR_SENTINEL,
        );

        if safe_mode {
            prompt.push_str(
                "- Safe mode is on: only use read-only commands that never modify files, \
                 processes, or system state. Do not use redirections that write files.\n",
            );
        }

        prompt.push_str("\nRequest: ");
        prompt.push_str(request.as_str());
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from_env()
    }
}
