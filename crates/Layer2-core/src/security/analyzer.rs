//! Command Analyzer - 위험 명령어 차단, 읽기 전용 판정, 위험도 분류

use super::patterns::{
    forbidden_patterns, readonly_commands, DenyPattern, FIND_MUTATING_OPTIONS,
    GIT_READONLY_SUBCOMMANDS, HIGH_RISK_COMMANDS, LOW_RISK_COMMANDS, MODERATE_RISK_COMMANDS,
    RAW_DISK_WRITE, ROOT_DELETION,
};
use super::shell::{split_segments, Segment};
use super::targets::{is_raw_disk, is_root_or_home};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

// ============================================================
// 위험도
// ============================================================

/// 사용자 표시용 위험도 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    None,
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::None => "none",
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 안전 경고 (표시 전용, 흐름에 영향 없음)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyWarning {
    pub tier: RiskTier,
    pub reason: String,
}

impl SafetyWarning {
    pub fn message(&self) -> String {
        match self.tier {
            RiskTier::High => format!("High risk: {}. Review carefully before running.", self.reason),
            RiskTier::Moderate => format!("Caution: {}.", self.reason),
            RiskTier::Low | RiskTier::None => format!("Note: {}.", self.reason),
        }
    }
}

// ============================================================
// 명령어 분석기
// ============================================================

/// 명령어 분석기 (패턴은 생성 시 한 번 컴파일)
pub struct CommandAnalyzer {
    forbidden: Vec<DenyPattern>,
    readonly: HashSet<&'static str>,
}

static ANALYZER: OnceLock<CommandAnalyzer> = OnceLock::new();

/// 전역 분석기 접근
pub fn analyzer() -> &'static CommandAnalyzer {
    ANALYZER.get_or_init(CommandAnalyzer::new)
}

impl CommandAnalyzer {
    pub fn new() -> Self {
        Self {
            forbidden: forbidden_patterns(),
            readonly: readonly_commands().into_iter().collect(),
        }
    }

    /// 금지 패턴 매칭, 차단 사유 반환
    ///
    /// 텍스트 패턴을 먼저 보고, 세그먼트별 토큰으로 삭제/쓰기 대상을 검사한다.
    pub fn check_denylist(&self, command: &str) -> Option<&str> {
        if let Some(pattern) = self.forbidden.iter().find(|p| p.matches(command)) {
            return Some(pattern.reason.as_str());
        }
        split_segments(command).iter().find_map(destructive_target)
    }

    /// 금지 명령어인지 확인
    pub fn is_forbidden(&self, command: &str) -> bool {
        self.check_denylist(command).is_some()
    }

    /// 모든 세그먼트가 읽기 전용인지 확인, 아니면 사유 반환
    pub fn check_read_only(&self, command: &str) -> Result<(), String> {
        if command.contains("$(") || command.contains('`') {
            return Err("command substitution is not allowed".to_string());
        }

        let segments = split_segments(command);
        if segments.is_empty() {
            return Err("empty command".to_string());
        }

        for segment in &segments {
            self.check_segment(segment)?;
        }
        Ok(())
    }

    /// 읽기 전용 여부
    pub fn is_read_only(&self, command: &str) -> bool {
        self.check_read_only(command).is_ok()
    }

    fn check_segment(&self, segment: &Segment) -> Result<(), String> {
        if let Some(redirect) = segment.redirects.iter().find(|r| !r.is_harmless()) {
            return Err(format!("writes to '{}'", redirect.target));
        }

        let tokens = segment
            .tokens()
            .ok_or_else(|| format!("cannot parse '{}'", segment.text))?;
        let words = skip_assignments(&tokens);

        let Some(program) = words.first() else {
            // 리다이렉트만 있는 세그먼트 (이미 무해한 것만 남음)
            return Ok(());
        };
        let name = command_name(program);
        let args = &words[1..];

        if !self.readonly.contains(name) {
            return Err(format!("'{}' is not a recognized read-only command", name));
        }

        check_options(name, args)
    }

    /// 위험도 분류
    pub fn risk_tier(&self, command: &str) -> (RiskTier, String) {
        if let Some(reason) = self.check_denylist(command) {
            return (RiskTier::High, reason.to_lowercase());
        }

        let mut worst = (RiskTier::None, String::new());

        for segment in split_segments(command) {
            let candidate = segment_risk(&segment);
            if candidate.0 > worst.0 {
                worst = candidate;
            }
        }

        worst
    }

    /// 위험도 경고 생성 (None 단계면 경고 없음)
    pub fn safety_warning(&self, command: &str) -> Option<SafetyWarning> {
        let (tier, reason) = self.risk_tier(command);
        (tier > RiskTier::None).then_some(SafetyWarning { tier, reason })
    }
}

impl Default for CommandAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// 헬퍼
// ============================================================

/// `/usr/bin/ls` → `ls`
fn command_name(program: &str) -> &str {
    program.rsplit('/').next().unwrap_or(program)
}

/// 앞쪽의 `VAR=value` 할당 건너뛰기
fn skip_assignments(tokens: &[String]) -> &[String] {
    let start = tokens
        .iter()
        .position(|t| !is_assignment(t))
        .unwrap_or(tokens.len());
    &tokens[start..]
}

fn is_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

fn has_flag(args: &[String], flags: &[&str]) -> bool {
    args.iter().any(|a| {
        flags
            .iter()
            .any(|f| a == f || (f.starts_with("--") && a.starts_with(&format!("{f}="))))
    })
}

/// 짧은 옵션 묶음(`-ni`)에 특정 문자가 포함되는지
fn has_short_flag(args: &[String], flag: char) -> bool {
    args.iter()
        .any(|a| a.starts_with('-') && !a.starts_with("--") && a[1..].contains(flag))
}

/// 명령어별 쓰기 옵션 검사
fn check_options(name: &str, args: &[String]) -> Result<(), String> {
    match name {
        "find" => {
            if let Some(opt) = args
                .iter()
                .find(|a| FIND_MUTATING_OPTIONS.contains(&a.as_str()))
            {
                return Err(format!("find {} can modify or execute", opt));
            }
        }
        "sed" => {
            if has_short_flag(args, 'i') || has_flag(args, &["--in-place"]) {
                return Err("sed in-place editing modifies files".to_string());
            }
        }
        "awk" | "gawk" => {
            if args.iter().any(|a| a.contains("system(") || a.contains("print >")) {
                return Err("awk program can execute commands or write files".to_string());
            }
        }
        "sort" => {
            if has_flag(args, &["-o", "--output"]) {
                return Err("sort -o writes a file".to_string());
            }
        }
        "date" => {
            if has_flag(args, &["-s", "--set"]) {
                return Err("date --set changes the system clock".to_string());
            }
        }
        "hostname" => {
            if args.iter().any(|a| !a.starts_with('-')) {
                return Err("hostname with an argument changes the hostname".to_string());
            }
        }
        "env" => {
            if args.iter().any(|a| !a.starts_with('-') && !is_assignment(a)) {
                return Err("env runs another command".to_string());
            }
        }
        "git" => return check_git(args),
        _ => {}
    }
    Ok(())
}

fn check_git(args: &[String]) -> Result<(), String> {
    let Some(position) = args.iter().position(|a| !a.starts_with('-')) else {
        return Ok(());
    };
    let subcommand = args[position].as_str();
    let rest = &args[position + 1..];
    let only_flags = |allowed: &[&str]| rest.iter().all(|a| allowed.contains(&a.as_str()));

    let read_only = match subcommand {
        s if GIT_READONLY_SUBCOMMANDS.contains(&s) => true,
        "branch" => only_flags(&["-a", "-r", "-v", "-vv", "--list", "-l", "--all", "--remotes"]),
        "tag" => only_flags(&["-l", "--list", "-n"]),
        "remote" => rest.is_empty() || only_flags(&["-v", "--verbose"]) || rest[0] == "show",
        "stash" => rest.first().map(String::as_str) == Some("list"),
        "config" => rest.iter().any(|a| a == "--get" || a == "--list" || a == "-l"),
        _ => false,
    };

    if read_only {
        Ok(())
    } else {
        Err(format!("git {} is not read-only", subcommand))
    }
}

/// 세그먼트 토큰 (따옴표 불균형이면 공백 기준으로 나누고 따옴표만 벗긴다)
fn segment_words(segment: &Segment) -> Vec<String> {
    segment.tokens().unwrap_or_else(|| {
        segment
            .text
            .split_whitespace()
            .map(|w| w.trim_matches(&['\'', '"'][..]).to_string())
            .collect()
    })
}

/// 앞쪽의 `sudo` / `doas` (및 그 옵션) 제거, 권한 상승 여부 반환
fn strip_elevation(mut words: &[String]) -> (&[String], bool) {
    let mut elevated = false;
    while let Some(first) = words.first() {
        if !matches!(command_name(first), "sudo" | "doas") {
            break;
        }
        elevated = true;
        words = &words[1..];
        while words.first().is_some_and(|w| w.starts_with('-')) {
            words = &words[1..];
        }
    }
    (words, elevated)
}

/// 옵션이 아닌 인자 (`--` 이후는 모두 인자)
fn operands(args: &[String]) -> impl Iterator<Item = &str> {
    let mut after_separator = false;
    args.iter().map(String::as_str).filter(move |a| {
        if after_separator {
            return true;
        }
        if *a == "--" {
            after_separator = true;
            return false;
        }
        !a.starts_with('-')
    })
}

/// 루트/홈 삭제, 원시 디스크 쓰기 차단 사유
fn destructive_target(segment: &Segment) -> Option<&'static str> {
    if segment.redirects.iter().any(|r| is_raw_disk(&r.target)) {
        return Some(RAW_DISK_WRITE);
    }

    let tokens = segment_words(segment);
    let (words, _) = strip_elevation(skip_assignments(&tokens));
    let (program, args) = words.split_first()?;

    match command_name(program) {
        "rm" if operands(args).any(is_root_or_home) => Some(ROOT_DELETION),
        "dd" if args
            .iter()
            .filter_map(|a| a.strip_prefix("of="))
            .any(is_raw_disk) =>
        {
            Some(RAW_DISK_WRITE)
        }
        _ => None,
    }
}

/// 세그먼트 하나의 위험도
fn segment_risk(segment: &Segment) -> (RiskTier, String) {
    let tokens = segment_words(segment);
    let (words, elevated) = strip_elevation(skip_assignments(&tokens));

    let (mut tier, mut reason) = match words.first() {
        Some(program) => verb_risk(command_name(program), &words[1..]),
        None => (RiskTier::None, String::new()),
    };

    if elevated && tier < RiskTier::Moderate {
        tier = RiskTier::Moderate;
        reason = "runs with elevated privileges".to_string();
    }

    for redirect in &segment.redirects {
        if redirect.is_harmless() {
            continue;
        }
        let (redirect_tier, redirect_reason) = if redirect.append {
            (RiskTier::Low, format!("appends to '{}'", redirect.target))
        } else {
            (RiskTier::Moderate, format!("overwrites '{}'", redirect.target))
        };
        if redirect_tier > tier {
            tier = redirect_tier;
            reason = redirect_reason;
        }
    }

    (tier, reason)
}

fn verb_risk(name: &str, args: &[String]) -> (RiskTier, String) {
    let recursive_or_forced = has_short_flag(args, 'r')
        || has_short_flag(args, 'R')
        || has_short_flag(args, 'f')
        || has_flag(args, &["--recursive", "--force"]);

    match name {
        "rm" if recursive_or_forced => (
            RiskTier::High,
            "recursive or forced deletion".to_string(),
        ),
        "chmod" | "chown" | "chgrp" if has_short_flag(args, 'R') || has_flag(args, &["--recursive"]) => (
            RiskTier::High,
            format!("recursive {} change", name),
        ),
        "git" => git_risk(args),
        "sed" if has_short_flag(args, 'i') || has_flag(args, &["--in-place"]) => {
            (RiskTier::Low, "edits files in place".to_string())
        }
        n if HIGH_RISK_COMMANDS.contains(&n) || n.starts_with("mkfs") => {
            (RiskTier::High, format!("{} can destroy data", n))
        }
        n if MODERATE_RISK_COMMANDS.contains(&n) => {
            (RiskTier::Moderate, format!("{} modifies system state", n))
        }
        n if LOW_RISK_COMMANDS.contains(&n) => (RiskTier::Low, format!("{} writes files", n)),
        _ => (RiskTier::None, String::new()),
    }
}

fn git_risk(args: &[String]) -> (RiskTier, String) {
    let subcommand = args
        .iter()
        .find(|a| !a.starts_with('-'))
        .map(String::as_str)
        .unwrap_or("");
    let forced = has_flag(args, &["-f", "--force", "--hard"]);

    match subcommand {
        "push" | "reset" | "clean" if forced => (
            RiskTier::High,
            format!("git {} discards history or work", subcommand),
        ),
        "clean" => (RiskTier::High, "git clean deletes untracked files".to_string()),
        "push" | "reset" | "checkout" | "rebase" | "restore" => (
            RiskTier::Moderate,
            format!("git {} rewrites the working tree or remote", subcommand),
        ),
        "add" | "commit" | "merge" | "pull" | "stash" | "tag" | "branch" => {
            (RiskTier::Low, format!("git {} changes the repository", subcommand))
        }
        _ => (RiskTier::None, String::new()),
    }
}
