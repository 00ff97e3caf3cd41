//! Destructive targets - 토큰 단위 경로 판정
//!
//! 정규식은 따옴표나 경로 표기 변형(`'/'`, `//`, `/.`, `"$HOME"`)을 놓치기 쉬워서
//! 삭제 대상과 쓰기 대상은 shlex 토큰으로 분리한 뒤 경로를 정규화해서 비교한다.

use super::patterns::RAW_DISK_PREFIXES;

const HOME_PREFIXES: &[&str] = &["${HOME}", "$HOME", "~"];

/// 정규화하면 루트(`/`), 홈, 또는 그 바로 아래 전체(`/*`, `~/*`)가 되는 경로인지
pub fn is_root_or_home(target: &str) -> bool {
    let (rest, home) = match HOME_PREFIXES.iter().find_map(|p| target.strip_prefix(p)) {
        Some(rest) => (rest, true),
        None if target.starts_with('/') => (target, false),
        None => return false,
    };

    // `~user`, `$HOMEDIR` 는 다른 경로
    if !rest.is_empty() && !rest.starts_with('/') {
        return false;
    }

    let mut components: Vec<&str> = Vec::new();
    for component in rest.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                // 홈 위로 벗어나면 홈보다 넓은 범위
                if components.pop().is_none() && home {
                    return true;
                }
            }
            other => components.push(other),
        }
    }

    components.iter().all(|c| c.chars().all(|ch| ch == '*'))
}

/// `/dev/sda`, `//dev/./nvme0n1` 같은 원시 디스크 장치 경로인지
pub fn is_raw_disk(target: &str) -> bool {
    if !target.starts_with('/') {
        return false;
    }

    let mut components = target.split('/').filter(|c| !c.is_empty() && *c != ".");
    match (components.next(), components.next()) {
        (Some("dev"), Some(device)) => RAW_DISK_PREFIXES.iter().any(|p| device.starts_with(p)),
        _ => false,
    }
}
