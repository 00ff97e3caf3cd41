//! Backend trait and the external-process implementation

use crate::error::BackendError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Raw result of one backend invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOutput {
    pub stdout: String,
    pub exit_code: i32,
    pub stderr: String,
}

impl BackendOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: 0,
            stderr: String::new(),
        }
    }

    /// Classify the invocation: non-zero exit and empty stdout are errors
    pub fn into_text(self, timeout: Duration) -> Result<String, BackendError> {
        if self.exit_code != 0 {
            return Err(BackendError::from_exit(
                self.exit_code,
                &self.stderr,
                timeout.as_secs(),
            ));
        }
        if self.stdout.trim().is_empty() {
            return Err(BackendError::EmptyOutput);
        }
        Ok(self.stdout)
    }
}

/// Text-generation backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name (logging)
    fn name(&self) -> &str;

    /// Send one prompt; must not outlive `timeout`
    async fn invoke(&self, prompt: &str, timeout: Duration) -> Result<BackendOutput, BackendError>;
}

// ============================================================================
// ProcessBackend
// ============================================================================

/// Runs an external CLI (`<program> <args...> <prompt>`) per call
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessBackend {
    /// Resolve `command` on PATH once at startup
    pub fn resolve(command: &str, args: Vec<String>) -> Result<Self, BackendError> {
        let program = which::which(command)
            .map_err(|_| BackendError::NotFound(command.to_string()))?;

        debug!(program = %program.display(), "Resolved backend executable");

        Ok(Self {
            name: command.to_string(),
            program,
            args,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Backend for ProcessBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, prompt: &str, timeout: Duration) -> Result<BackendOutput, BackendError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::NotFound(self.program.display().to_string())
            } else {
                BackendError::Spawn(e.to_string())
            }
        })?;

        // 타임아웃 시 future가 drop되면서 child도 종료된다 (kill_on_drop)
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| BackendError::Timeout {
                secs: timeout.as_secs(),
            })?
            .map_err(|e| BackendError::Spawn(e.to_string()))?;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(backend = %self.name, exit_code, "Backend process finished");

        Ok(BackendOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
