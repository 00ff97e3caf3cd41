//! Audit Logger - 감사 로그 기록 및 조회
//!
//! JSON Lines 파일에 append-only로 기록한다. 레코드 하나를 한 번의 `write`로
//! 추가하므로 (`O_APPEND`) 여러 프로세스가 동시에 기록해도 락이 필요 없다.
//! 로그 보존/순환은 외부 도구의 몫이며 여기서는 절대 수정하거나 삭제하지 않는다.

use super::types::{AuditEntry, AuditId, AuditQuery, AuditStatistics};
use crate::Result;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 감사 로거
#[derive(Debug, Clone)]
pub struct AuditLogger {
    path: PathBuf,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 감사 로그 기록
    pub fn log(&self, entry: AuditEntry) -> Result<AuditId> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        debug!(
            audit_id = %entry.id,
            action = entry.action.as_str(),
            category = entry.category.as_str(),
            "Audit entry logged"
        );

        Ok(entry.id)
    }

    /// 전체 엔트리 읽기 (손상된 줄은 건너뜀)
    pub fn read_all(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.read_with_malformed()?.0)
    }

    fn read_with_malformed(&self) -> Result<(Vec<AuditEntry>, u64)> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        let mut malformed = 0;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    malformed += 1;
                    warn!(line = index + 1, error = %e, "Skipping malformed audit line");
                }
            }
        }

        Ok((entries, malformed))
    }

    /// 쿼리로 감사 로그 조회 (최신순)
    pub fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self
            .read_all()?
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }

        Ok(entries)
    }

    /// 통계 계산
    pub fn statistics(&self) -> Result<AuditStatistics> {
        let (entries, malformed) = self.read_with_malformed()?;
        let mut stats = AuditStatistics::from_entries(&entries);
        stats.malformed_lines = malformed;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::types::{AuditAction, AuditCategory, AuditResult};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp.path().join("logs/audit.log"));

        logger
            .log(AuditEntry::new(AuditAction::CommandGenerated).with_target("ls -la"))
            .unwrap();
        logger
            .log(
                AuditEntry::new(AuditAction::CommandBlocked)
                    .with_result(AuditResult::Denied)
                    .with_target("rm -rf /"),
            )
            .unwrap();

        let entries = logger.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].target.as_deref(), Some("ls -la"));

        let content = fs::read_to_string(logger.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_missing_log_is_empty() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp.path().join("absent.log"));
        assert!(logger.read_all().unwrap().is_empty());
        assert_eq!(logger.statistics().unwrap().total_entries, 0);
    }

    #[test]
    fn test_query_newest_first_with_limit() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp.path().join("audit.log"));
        let base = Utc::now();

        for offset in 0..3 {
            logger
                .log(
                    AuditEntry::new(AuditAction::CommandGenerated)
                        .with_timestamp(base + Duration::seconds(offset))
                        .with_target(format!("cmd-{offset}")),
                )
                .unwrap();
        }
        logger
            .log(AuditEntry::new(AuditAction::InjectionDetected))
            .unwrap();

        let commands = logger
            .query(
                &AuditQuery::new()
                    .with_categories(vec![AuditCategory::Command])
                    .with_limit(2),
            )
            .unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].target.as_deref(), Some("cmd-2"));
        assert_eq!(commands[1].target.as_deref(), Some("cmd-1"));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp.path().join("audit.log"));
        logger
            .log(AuditEntry::new(AuditAction::CommandCached))
            .unwrap();

        let mut file = OpenOptions::new().append(true).open(logger.path()).unwrap();
        writeln!(file, "{{truncated").unwrap();

        let stats = logger.statistics().unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.malformed_lines, 1);
    }
}
