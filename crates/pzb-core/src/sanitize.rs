//! Hostname list cleaning.
//!
//! Turns lines like `https://www.Example.com/some/path?x=1` into `example.com`.
//! Pure functions only: callers own any file I/O.

use std::sync::OnceLock;

use regex::Regex;

static SCHEME_RE: OnceLock<Regex> = OnceLock::new();
static WWW_RE: OnceLock<Regex> = OnceLock::new();
static LINE_BREAK_RE: OnceLock<Regex> = OnceLock::new();

fn scheme_re() -> &'static Regex {
    SCHEME_RE.get_or_init(|| Regex::new(r"(?i)^https?://").expect("valid regex"))
}

fn www_re() -> &'static Regex {
    WWW_RE.get_or_init(|| Regex::new(r"(?i)^www\.").expect("valid regex"))
}

fn line_break_re() -> &'static Regex {
    LINE_BREAK_RE.get_or_init(|| Regex::new(r"\r\n|\n|\r").expect("valid regex"))
}

/// Result of cleaning a whole file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SanitizedPayload {
    /// Non-empty cleaned lines, in input order.
    pub lines: Vec<String>,
    /// Every input line, including blank ones.
    pub total: usize,
    /// Lines whose cleaned value is non-empty and differs from the trimmed input.
    pub changed: usize,
}

impl SanitizedPayload {
    /// File content: one hostname per line, newline-terminated.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn clean_once(line: &str) -> String {
    let s = line.trim();
    if s.is_empty() {
        return String::new();
    }
    let s = scheme_re().replace(s, "");
    let s = www_re().replace(&s, "");
    let s = match s.split_once('/') {
        Some((host, _)) => host,
        None => s.as_ref(),
    };
    s.trim().to_lowercase()
}

/// Clean a single line down to its hostname.
///
/// Strips a leading `http://`/`https://`, a leading `www.`, and everything from
/// the first `/`. Repeats until stable so `sanitize_line` is idempotent.
pub fn sanitize_line(line: &str) -> String {
    let mut current = clean_once(line);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Decode bytes leniently (invalid UTF-8 sequences are dropped, not replaced).
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Clean every line of `lines`.
pub fn sanitize_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> SanitizedPayload {
    let mut payload = SanitizedPayload::default();
    for raw in lines {
        payload.total += 1;
        let original = raw.trim();
        let cleaned = sanitize_line(original);
        if cleaned.is_empty() {
            continue;
        }
        if cleaned != original {
            payload.changed += 1;
        }
        payload.lines.push(cleaned);
    }
    payload
}

/// Split on `\n`, `\r\n` and lone `\r`. A final line terminator does not
/// start another line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = line_break_re().split(text).collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Decode and clean a whole uploaded file.
pub fn sanitize_bytes(bytes: &[u8]) -> SanitizedPayload {
    let text = decode_lossy(bytes);
    sanitize_lines(split_lines(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_www_and_path() {
        assert_eq!(sanitize_line("https://WWW.Example.com/a/b"), "example.com");
        assert_eq!(sanitize_line("http://cdn.example.org/"), "cdn.example.org");
        assert_eq!(sanitize_line("HTTP://www.site.net?q=1"), "site.net?q=1");
        assert_eq!(sanitize_line("  www.foo.io/index.html  "), "foo.io");
    }

    #[test]
    fn plain_hostname_is_unchanged() {
        assert_eq!(sanitize_line("example.com"), "example.com");
        let p = sanitize_lines(["example.com"]);
        assert_eq!(p.changed, 0);
        assert_eq!(p.lines, vec!["example.com".to_string()]);
    }

    #[test]
    fn blank_lines_clean_to_empty() {
        assert_eq!(sanitize_line("   "), "");
        assert_eq!(sanitize_line(""), "");
        assert_eq!(sanitize_line("https://"), "");
        assert_eq!(sanitize_line("/only/a/path"), "");
    }

    #[test]
    fn is_idempotent() {
        for input in [
            "https://WWW.Example.com/a/b",
            "www.www.example.com",
            "https://https://x.com/y",
            "www. www.spaced.com",
            "ftp://not-a-web-scheme.com/x",
            "  MiXeD.Case.ORG  ",
            "www.https://nested.com/",
            "",
        ] {
            let once = sanitize_line(input);
            assert_eq!(sanitize_line(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn scheme_must_be_a_prefix() {
        assert_eq!(sanitize_line("example.com/https://x"), "example.com");
        assert_eq!(sanitize_line("notwww.example.com"), "notwww.example.com");
    }

    #[test]
    fn counts_total_and_changed() {
        let input = "https://a.com/x\n\nb.com\nwww.c.com\n   \nd.com/path\n";
        let p = sanitize_bytes(input.as_bytes());
        assert_eq!(p.total, 6);
        assert_eq!(p.changed, 3);
        assert_eq!(p.lines, vec!["a.com", "b.com", "c.com", "d.com"]);
        assert!(p.lines.len() <= p.total);
    }

    #[test]
    fn lines_that_clean_to_empty_are_dropped_but_counted() {
        let p = sanitize_lines(["https://", "   ", "x.com"]);
        assert_eq!(p.total, 3);
        assert_eq!(p.changed, 0);
        assert_eq!(p.lines, vec!["x.com"]);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let p = sanitize_bytes(b"http://a.com/\r\nb.com\r\n");
        assert_eq!(p.total, 2);
        assert_eq!(p.lines, vec!["a.com", "b.com"]);
    }

    #[test]
    fn handles_bare_cr_line_endings() {
        let p = sanitize_bytes(b"https://a.com/x\rhttps://b.com/y\rc.com\r");
        assert_eq!(p.total, 3);
        assert_eq!(p.changed, 2);
        assert_eq!(p.lines, vec!["a.com", "b.com", "c.com"]);
    }

    #[test]
    fn mixed_terminators_keep_blank_lines_counted() {
        assert_eq!(split_lines("a\r\nb\rc\nd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\n\r\nb\n"), vec!["a", "", "b"]);
        assert!(split_lines("").is_empty());
        let p = sanitize_bytes(b"a.com\r\rb.com");
        assert_eq!(p.total, 3);
        assert_eq!(p.lines, vec!["a.com", "b.com"]);
    }

    #[test]
    fn invalid_utf8_is_discarded_not_fatal() {
        let bytes = b"exa\xffmple.com\n\xfe\xffhttps://ok.com/\n";
        let p = sanitize_bytes(bytes);
        assert_eq!(p.total, 2);
        assert_eq!(p.lines[0], "example.com");
        assert_eq!(p.lines[1], "ok.com");
    }

    #[test]
    fn payload_bytes_are_newline_terminated() {
        let p = sanitize_lines(["a.com", "https://b.com/"]);
        assert_eq!(p.to_bytes(), b"a.com\nb.com\n".to_vec());
        assert!(SanitizedPayload::default().to_bytes().is_empty());
    }
}
