//! Shell splitting - 따옴표를 인식하는 파이프라인/체인 분리
//!
//! `a | b && c; d > out` → 세그먼트 `a`, `b`, `c`, `d` (+ 리다이렉트 `out`).
//! 완전한 셸 파서가 아니며 safe mode 판정에 필요한 만큼만 해석한다.

/// 출력 리다이렉트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// 대상 파일 (`&1` 같은 fd 복제 포함)
    pub target: String,
    pub append: bool,
}

impl Redirect {
    /// 파일 시스템에 쓰지 않는 리다이렉트인지
    pub fn is_harmless(&self) -> bool {
        self.target == "/dev/null" || self.target.starts_with('&')
    }
}

/// 파이프/체인으로 분리된 단일 명령
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub redirects: Vec<Redirect>,
}

impl Segment {
    /// shlex 토큰 (따옴표 불균형 시 None)
    pub fn tokens(&self) -> Option<Vec<String>> {
        shlex::split(&self.text)
    }
}

const OPERATORS: &[char] = &['|', ';', '&', '\n'];

/// 명령어를 세그먼트로 분리
pub fn split_segments(command: &str) -> Vec<Segment> {
    let chars: Vec<char> = command.chars().collect();
    let mut segments = Vec::new();
    let mut current = Segment::default();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_single {
            if c == '\'' {
                in_single = false;
            }
            current.text.push(c);
            i += 1;
            continue;
        }

        if c == '\\' {
            current.text.push(c);
            if let Some(&next) = chars.get(i + 1) {
                current.text.push(next);
            }
            i += 2;
            continue;
        }

        if in_double {
            if c == '"' {
                in_double = false;
            }
            current.text.push(c);
            i += 1;
            continue;
        }

        match c {
            '\'' => {
                in_single = true;
                current.text.push(c);
                i += 1;
            }
            '"' => {
                in_double = true;
                current.text.push(c);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'>') => {
                // &> file
                i = read_redirect(&chars, i + 1, &mut current);
            }
            '>' => {
                i = read_redirect(&chars, i, &mut current);
            }
            c if OPERATORS.contains(&c) => {
                push_segment(&mut segments, std::mem::take(&mut current));
                i += 1;
            }
            _ => {
                current.text.push(c);
                i += 1;
            }
        }
    }

    push_segment(&mut segments, current);
    segments
}

fn push_segment(segments: &mut Vec<Segment>, mut segment: Segment) {
    segment.text = segment.text.trim().to_string();
    if !segment.text.is_empty() || !segment.redirects.is_empty() {
        segments.push(segment);
    }
}

/// `>` 위치에서 리다이렉트를 읽고 다음 인덱스 반환
fn read_redirect(chars: &[char], start: usize, segment: &mut Segment) -> usize {
    let mut i = start + 1;
    let mut append = false;

    if chars.get(i) == Some(&'>') {
        append = true;
        i += 1;
    } else if chars.get(i) == Some(&'|') {
        i += 1;
    }

    // fd 복제 (2>&1)
    let dup = chars.get(i) == Some(&'&');
    if dup {
        i += 1;
    }

    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }

    let mut target = String::new();
    let mut quote: Option<char> = None;
    while let Some(&c) = chars.get(i) {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => target.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() || OPERATORS.contains(&c) || c == '>' || c == '<' => break,
            None => target.push(c),
        }
        i += 1;
    }

    if dup {
        target.insert(0, '&');
    }

    strip_fd_number(&mut segment.text);

    segment.redirects.push(Redirect { target, append });
    i
}

/// 리다이렉트 앞의 fd 번호 (`2>`의 `2`) 제거
fn strip_fd_number(text: &mut String) {
    let mut rev = text.chars().rev();
    if let Some(last) = rev.next() {
        if last.is_ascii_digit() && rev.next().map_or(true, char::is_whitespace) {
            text.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(command: &str) -> Vec<String> {
        split_segments(command).into_iter().map(|s| s.text).collect()
    }

    #[test]
    fn test_splits_on_operators() {
        assert_eq!(
            texts("ls -la | grep foo && wc -l; echo done & pwd || true"),
            vec!["ls -la", "grep foo", "wc -l", "echo done", "pwd", "true"]
        );
    }

    #[test]
    fn test_quoted_operators_are_not_split() {
        assert_eq!(
            texts(r#"grep 'a|b;c' file | awk "{print \$1 > 2}""#),
            vec!["grep 'a|b;c' file", r#"awk "{print \$1 > 2}""#]
        );
        assert!(split_segments(r#"awk "{print \$1 > 2}""#)[0]
            .redirects
            .is_empty());
    }

    #[test]
    fn test_redirect_targets() {
        let segments = split_segments("find . -name '*.log' 2>/dev/null > out.txt");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "find . -name '*.log'");
        assert_eq!(
            segments[0].redirects,
            vec![
                Redirect {
                    target: "/dev/null".into(),
                    append: false
                },
                Redirect {
                    target: "out.txt".into(),
                    append: false
                },
            ]
        );
        assert!(segments[0].redirects[0].is_harmless());
        assert!(!segments[0].redirects[1].is_harmless());
    }

    #[test]
    fn test_fd_duplication_and_append() {
        let segments = split_segments("make 2>&1 >> build.log");
        assert_eq!(segments[0].text, "make");
        assert_eq!(segments[0].redirects[0].target, "&1");
        assert!(segments[0].redirects[0].is_harmless());
        assert!(segments[0].redirects[1].append);
        assert_eq!(segments[0].redirects[1].target, "build.log");
    }

    #[test]
    fn test_ampersand_redirect() {
        let segments = split_segments("ls &> all.txt");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].redirects[0].target, "all.txt");
    }
}
