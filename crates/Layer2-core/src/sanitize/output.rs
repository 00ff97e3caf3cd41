//! Backend output sanitization
//!
//! 백엔드 출력은 신뢰하지 않는다. 한 번 정제한 결과를 다시 정제해도
//! 변하지 않도록 (멱등) 고정점에 도달할 때까지 반복한다.

use cmdgen_foundation::MultilinePolicy;

/// 실행을 유발하는 시퀀스 (명령 치환, 프로세스 치환)
pub const EXECUTION_TRIGGERS: &[&str] = &["$(", "<(", ">("];

/// 백엔드 출력 → 한 줄 명령어
///
/// 결과가 비어 있을 수 있으며, 이 경우 호출자가 에러로 처리한다.
pub fn sanitize_output(text: &str, policy: MultilinePolicy) -> String {
    let mut current = single_pass(text, policy);

    // 첫 패스 이후에는 삭제만 일어나므로 길이가 줄어들다 반드시 멈춘다
    loop {
        let next = single_pass(&current, policy);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn single_pass(text: &str, policy: MultilinePolicy) -> String {
    let stripped = strip_ansi_escapes::strip_str(text);

    // 코드 펜스 줄 제거 후 줄 정책 적용
    let lines = stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"));

    let line = match policy {
        MultilinePolicy::FirstLine => lines.take(1).collect::<String>(),
        MultilinePolicy::Join => lines.collect::<Vec<_>>().join(" "),
    };

    let mut command = line.replace('`', "");
    for trigger in EXECUTION_TRIGGERS {
        command = command.replace(trigger, "");
    }

    command
        .chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
