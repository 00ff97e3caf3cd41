//! Delivery - 명령어를 사용자에게 전달 (실행하지 않음)
//!
//! - prefill: 셸 통합이 `CMDGEN_PREFILL_FILE`로 지정한 파일에 기록, 셸이 입력 줄에 채움
//! - clipboard: 시스템 클립보드
//! - stdout: 표준 출력
//!
//! `auto`는 prefill → clipboard → stdout 순으로 시도하고, 명시한 방식이
//! 실패해도 stdout으로 내려간다.

use crate::clipboard::{Clipboard, SystemClipboard};
use cmdgen_foundation::OutputMode;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 셸 통합이 설정하는 prefill 파일 경로
pub const ENV_PREFILL_FILE: &str = "CMDGEN_PREFILL_FILE";

/// 실제로 사용된 전달 방식
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Prefill(PathBuf),
    Clipboard,
    Stdout,
}

impl fmt::Display for Delivered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivered::Prefill(_) => write!(f, "prefill"),
            Delivered::Clipboard => write!(f, "clipboard"),
            Delivered::Stdout => write!(f, "stdout"),
        }
    }
}

/// 시작 시 사용 가능한 전달 수단을 확인한 결과
pub struct Delivery {
    prefill_file: Option<PathBuf>,
    clipboard: Option<Box<dyn Clipboard>>,
}

impl Delivery {
    pub fn new(prefill_file: Option<PathBuf>, clipboard: Option<Box<dyn Clipboard>>) -> Self {
        Self {
            prefill_file,
            clipboard,
        }
    }

    /// 프로세스 환경에서 prefill 파일과 클립보드 확인
    pub fn detect() -> Self {
        let prefill_file = std::env::var_os(ENV_PREFILL_FILE)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let clipboard = SystemClipboard::open().map(|c| Box::new(c) as Box<dyn Clipboard>);
        Self::new(prefill_file, clipboard)
    }

    pub fn deliver(
        &mut self,
        command: &str,
        mode: OutputMode,
        out: &mut dyn Write,
    ) -> io::Result<Delivered> {
        let attempts: &[OutputMode] = match mode {
            OutputMode::Auto => &[OutputMode::Prefill, OutputMode::Clipboard],
            OutputMode::Prefill => &[OutputMode::Prefill],
            OutputMode::Clipboard => &[OutputMode::Clipboard],
            OutputMode::Stdout => &[],
        };

        for attempt in attempts {
            let delivered = match attempt {
                OutputMode::Prefill => self.try_prefill(command),
                OutputMode::Clipboard => self.try_clipboard(command),
                OutputMode::Auto | OutputMode::Stdout => None,
            };
            if let Some(delivered) = delivered {
                debug!(method = %delivered, "Command delivered");
                return Ok(delivered);
            }
        }

        if mode != OutputMode::Stdout && mode != OutputMode::Auto {
            warn!(mode = mode.as_str(), "Delivery unavailable, falling back to stdout");
        }
        writeln!(out, "{}", command)?;
        out.flush()?;
        Ok(Delivered::Stdout)
    }

    fn try_prefill(&self, command: &str) -> Option<Delivered> {
        let path = self.prefill_file.as_ref()?;
        match write_atomically(path, command) {
            Ok(()) => Some(Delivered::Prefill(path.clone())),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Prefill failed");
                None
            }
        }
    }

    fn try_clipboard(&mut self, command: &str) -> Option<Delivered> {
        let clipboard = self.clipboard.as_mut()?;
        match clipboard.copy(command) {
            Ok(()) => Some(Delivered::Clipboard),
            Err(e) => {
                warn!(error = %e, "Clipboard copy failed");
                None
            }
        }
    }
}

/// 같은 디렉토리의 임시 파일에 쓴 뒤 rename. 중단되면 임시 파일은 drop 시 삭제된다.
fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
