//! Clipboard - 생성된 명령어 복사
//!
//! 디스플레이 서버가 없는 환경(SSH, CI)에서는 열리지 않으므로
//! 시작 시 한 번 열어보고 실패하면 전달 단계에서 건너뛴다.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("clipboard not available")]
    Unavailable,

    #[error("clipboard rejected the text: {0}")]
    Rejected(String),
}

/// 클립보드 쓰기 수단
pub trait Clipboard {
    fn copy(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// arboard 기반 시스템 클립보드
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    /// 열 수 없으면 None
    pub fn open() -> Option<Self> {
        match arboard::Clipboard::new() {
            Ok(inner) => Some(Self { inner }),
            Err(e) => {
                debug!(error = %e, "System clipboard unavailable");
                None
            }
        }
    }
}

impl Clipboard for SystemClipboard {
    fn copy(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.inner
            .set_text(text)
            .map_err(|e| ClipboardError::Rejected(e.to_string()))
    }
}
