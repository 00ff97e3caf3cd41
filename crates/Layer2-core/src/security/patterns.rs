//! Security patterns - 금지 패턴 및 읽기 전용 명령어 목록

use regex::Regex;

// ============================================================
// 금지 명령어 패턴 (모드와 무관하게 항상 차단)
// ============================================================

/// 금지된 명령어 패턴들
pub fn forbidden_patterns() -> Vec<DenyPattern> {
    vec![
        // 루트 / 홈 삭제와 원시 디스크 쓰기는 토큰 단위로 분석기에서 검사
        DenyPattern::contains("--no-preserve-root", "Root filesystem deletion"),
        // Fork bomb
        DenyPattern::exact(":(){ :|:& };:", "Fork bomb"),
        DenyPattern::regex(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:", "Fork bomb"),
        // 디스크 파괴
        DenyPattern::regex(r"\bmkfs(?:\.\w+)?\b", "Filesystem format"),
        DenyPattern::regex(r"\bwipefs\b", "Filesystem signature wipe"),
        DenyPattern::regex(r"\bshred\b.*\s/dev/", "Device shred"),
        // 시스템 종료
        DenyPattern::regex(
            r"^\s*(?:sudo\s+)?(?:shutdown|reboot|halt|poweroff)\b",
            "System shutdown",
        ),
        DenyPattern::regex(r"\binit\s+[06]\b", "System halt"),
        // 권한 파괴
        DenyPattern::regex(
            r"\bchmod\s+(?:-R\s+)?[0-7]?777\s+/(?:\s|$)",
            "Dangerous permission change on root",
        ),
        DenyPattern::regex(
            r"\bch(?:mod|own)\s+-R\s+\S+\s+/(?:\s|$)",
            "Recursive permission change on root",
        ),
        // 신뢰할 수 없는 내용을 인터프리터로 파이프
        DenyPattern::regex(
            r"\b(?:curl|wget|fetch)\b[^|]*\|\s*(?:sudo\s+)?(?:ba|z|k|da)?sh\b",
            "Piping downloaded content to a shell",
        ),
        DenyPattern::regex(
            r"\b(?:curl|wget|fetch)\b[^|]*\|\s*(?:sudo\s+)?(?:python[0-9.]*|perl|ruby|node|php)\b",
            "Piping downloaded content to an interpreter",
        ),
        DenyPattern::regex(
            r"\bbase64\s+(?:-d|-D|--decode)\b[^|]*\|\s*(?:sudo\s+)?(?:ba|z|k|da)?sh\b",
            "Decoding a payload into a shell",
        ),
        // 네트워크 악용
        DenyPattern::contains("/dev/tcp/", "Network device access"),
        DenyPattern::contains("/dev/udp/", "Network device access"),
        DenyPattern::regex(r"\b(?:nc|ncat|netcat)\b.*\s-[ec]\s", "Potential reverse shell"),
        // 히스토리 삭제
        DenyPattern::exact("history -c", "History clear"),
        DenyPattern::regex(r">\s*~/\.(?:bash|zsh)_history", "History deletion"),
        DenyPattern::regex(r"\brm\s+.*\.(?:bash|zsh)_history", "History deletion"),
        // 시스템 파일 덮어쓰기
        DenyPattern::regex(r">\s*/etc/(?:passwd|shadow|sudoers|group)\b", "System file overwrite"),
        DenyPattern::regex(r"\bcrontab\s+-r\b", "Crontab removal"),
        // 커널 모듈
        DenyPattern::regex(r"\b(?:insmod|rmmod)\s+", "Kernel module change"),
        DenyPattern::regex(r"\bmodprobe\s+(?:-r\s+)?\w", "Kernel module loading"),
        // 프로세스 무차별 종료
        DenyPattern::regex(r"\bkill\s+-9\s+-1\b", "Mass process kill"),
        DenyPattern::contains("killall -9", "Mass process kill"),
    ]
}

/// 원시 디스크 장치 이름 접두사 (`/dev/<prefix>...`)
pub const RAW_DISK_PREFIXES: &[&str] = &["sd", "hd", "nvme", "xvd", "vd", "disk", "mmcblk"];

pub const ROOT_DELETION: &str = "Recursive deletion of a root or home path";
pub const RAW_DISK_WRITE: &str = "Raw disk write";

/// 금지 패턴 정의
#[derive(Debug, Clone)]
pub struct DenyPattern {
    pub pattern: PatternType,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum PatternType {
    Exact(String),
    Contains(String),
    /// 컴파일 실패한 패턴은 매칭되지 않는다
    Regex(Option<Regex>),
}

impl DenyPattern {
    pub fn exact(exact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: PatternType::Exact(exact.into()),
            reason: reason.into(),
        }
    }

    pub fn contains(substring: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: PatternType::Contains(substring.into()),
            reason: reason.into(),
        }
    }

    pub fn regex(pattern: &str, reason: impl Into<String>) -> Self {
        Self {
            pattern: PatternType::Regex(Regex::new(pattern).ok()),
            reason: reason.into(),
        }
    }

    /// 명령어가 이 패턴에 매칭되는지 확인
    pub fn matches(&self, command: &str) -> bool {
        match &self.pattern {
            PatternType::Exact(s) => command.trim() == s,
            PatternType::Contains(s) => command.contains(s.as_str()),
            PatternType::Regex(Some(re)) => re.is_match(command),
            PatternType::Regex(None) => false,
        }
    }
}

// ============================================================
// 읽기 전용 명령어 (safe mode 허용 목록)
// ============================================================

/// 읽기 전용으로 확신할 수 있는 명령어들
///
/// 옵션에 따라 쓰기가 가능한 명령어(find, sed, sort, git 등)는
/// 분석기에서 옵션을 추가로 검사한다.
pub fn readonly_commands() -> Vec<&'static str> {
    vec![
        // 파일 시스템 조회
        "ls", "dir", "pwd", "cd", "cat", "head", "tail", "less", "more", "file", "stat", "wc",
        "find", "locate", "tree", "du", "df", "lsblk", "realpath", "readlink", "basename",
        "dirname",
        // 텍스트 처리 (읽기)
        "grep", "egrep", "fgrep", "zgrep", "zcat", "rg", "ag", "awk", "gawk", "sed", "sort",
        "uniq", "cut", "tr", "diff", "cmp", "comm", "column", "nl", "fold", "paste", "join", "rev",
        "tac", "jq", "strings", "xxd", "hexdump", "od",
        // 체크섬
        "md5sum", "sha1sum", "sha256sum", "shasum", "cksum",
        // 시스템 정보
        "whoami", "id", "groups", "hostname", "uname", "date", "cal", "uptime", "free", "ps",
        "pgrep", "lsof", "top",
        // 환경
        "env", "printenv", "echo", "printf", "which", "whereis", "type", "man", "true", "false",
        "seq", "test",
        // Git (하위 명령어 추가 검사)
        "git",
    ]
}

/// 쓰기/실행을 유발하는 find 옵션
pub const FIND_MUTATING_OPTIONS: &[&str] = &[
    "-delete", "-exec", "-execdir", "-ok", "-okdir", "-fprint", "-fprint0", "-fprintf", "-fls",
];

/// 읽기 전용 git 하위 명령어
pub const GIT_READONLY_SUBCOMMANDS: &[&str] = &[
    "status", "log", "diff", "show", "blame", "ls-files", "rev-parse", "shortlog", "describe",
    "grep", "reflog",
];

/// 위험도 판정에 쓰이는 동사
pub const HIGH_RISK_COMMANDS: &[&str] = &["dd", "shred", "wipefs", "truncate", "mkfs"];

pub const MODERATE_RISK_COMMANDS: &[&str] = &[
    "rm", "rmdir", "unlink", "mv", "chmod", "chown", "chgrp", "kill", "pkill", "killall",
    "crontab", "systemctl", "service", "sudo", "doas", "su",
];

pub const LOW_RISK_COMMANDS: &[&str] = &[
    "cp", "mkdir", "touch", "ln", "tee", "install", "rsync", "scp", "npm", "pip", "pip3",
    "cargo", "apt", "apt-get", "brew", "yum", "dnf", "make",
];
