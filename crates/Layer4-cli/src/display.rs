//! Display - stderr 출력 (경고, 에러, 통계)
//!
//! stdout은 명령어 전용이므로 나머지는 모두 stderr로 간다.

use cmdgen_core::{RiskTier, SafetyWarning, SensitiveFinding};
use cmdgen_foundation::{AuditEntry, AuditStatistics, Error};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, IsTerminal, Write};

/// stderr 스타일 출력기
#[derive(Debug, Clone, Copy)]
pub struct Display {
    color: bool,
}

impl Display {
    /// 설정이 허용하고 stderr가 터미널이며 `NO_COLOR`가 없을 때만 색상 사용
    pub fn new(color_output: bool) -> Self {
        let color = color_output
            && io::stderr().is_terminal()
            && std::env::var_os("NO_COLOR").is_none();
        Self { color }
    }

    fn line(&self, color: Color, prefix: &str, message: &str) {
        let mut stderr = io::stderr();
        let result = if self.color {
            execute!(
                stderr,
                SetForegroundColor(color),
                Print(prefix),
                ResetColor,
                Print(format!(" {}\n", message))
            )
        } else {
            writeln!(stderr, "{} {}", prefix, message)
        };
        // stderr 기록 실패는 무시
        let _ = result;
    }

    pub fn error(&self, error: &Error) {
        match error {
            // 백엔드 거부 응답은 그대로 보여줌
            Error::BackendRefused(text) => self.line(Color::Red, "cmdgen:", text),
            other => self.line(Color::Red, "cmdgen:", &other.to_string()),
        }
        if let Error::DangerousCommand { command, .. } = error {
            self.line(Color::DarkGrey, "  command:", command);
        }
    }

    pub fn notice(&self, message: &str) {
        self.line(Color::DarkGrey, "cmdgen:", message);
    }

    /// moderate / high 위험도만 표시
    pub fn safety_warning(&self, warning: &SafetyWarning) {
        let color = match warning.tier {
            RiskTier::High => Color::Red,
            RiskTier::Moderate => Color::Yellow,
            RiskTier::Low | RiskTier::None => return,
        };
        self.line(color, "warning:", &warning.message());
    }

    pub fn sensitive(&self, findings: &[SensitiveFinding]) {
        if findings.is_empty() {
            return;
        }
        let kinds: Vec<&str> = findings.iter().map(|f| f.description).collect();
        self.line(
            Color::Yellow,
            "warning:",
            &format!(
                "request appears to contain sensitive data ({}); it was sent to the backend",
                kinds.join(", ")
            ),
        );
    }

    pub fn statistics(&self, stats: &AuditStatistics, recent_events: &[AuditEntry]) {
        let mut stderr = io::stderr();
        let _ = write_statistics(&mut stderr, stats)
            .and_then(|_| write_security_events(&mut stderr, recent_events));
    }
}

/// 통계 요약 텍스트
pub fn write_statistics(out: &mut dyn Write, stats: &AuditStatistics) -> io::Result<()> {
    writeln!(out, "Audit log summary")?;
    writeln!(out, "{}", "-".repeat(40))?;
    writeln!(out, "{:<24} {}", "Total records", stats.total_entries)?;

    if let (Some(start), Some(end)) = (stats.period_start, stats.period_end) {
        writeln!(
            out,
            "{:<24} {} .. {}",
            "Period",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        )?;
    }

    writeln!(out, "{:<24} {:.1}%", "Cache hit ratio", stats.cache_hit_ratio * 100.0)?;
    match stats.avg_generation_ms {
        Some(ms) => writeln!(out, "{:<24} {:.0} ms", "Mean generation time", ms)?,
        None => writeln!(out, "{:<24} -", "Mean generation time")?,
    }

    if !stats.by_category.is_empty() {
        writeln!(out, "\nBy category")?;
        let mut categories: Vec<_> = stats.by_category.iter().collect();
        categories.sort();
        for (category, count) in categories {
            writeln!(out, "  {:<22} {}", category, count)?;
        }
    }

    if !stats.by_action.is_empty() {
        writeln!(out, "\nBy action")?;
        let mut actions: Vec<_> = stats.by_action.iter().collect();
        actions.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (action, count) in actions {
            writeln!(out, "  {:<22} {}", action, count)?;
        }
    }

    if stats.malformed_lines > 0 {
        writeln!(out, "\n{} malformed line(s) skipped", stats.malformed_lines)?;
    }
    Ok(())
}

/// 최근 보안 이벤트 (최신순)
pub fn write_security_events(out: &mut dyn Write, events: &[AuditEntry]) -> io::Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    writeln!(out, "\nRecent security events")?;
    for event in events {
        write!(
            out,
            "  {}  {:<24}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.action.as_str()
        )?;
        match &event.target {
            Some(target) => writeln!(out, " {}", target)?,
            None => writeln!(out)?,
        }
    }
    Ok(())
}
