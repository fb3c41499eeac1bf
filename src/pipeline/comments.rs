//! Comment stripping
//!
//! Removes line comments (unescaped `%` to end of line) and `comment`
//! block environments. Content inside verbatim-like environments keeps its
//! comment markers: a `%` in a code listing is data, not a comment. Other
//! environments get no such shielding, so a `%` inside e.g. a `tikzpicture`
//! string literal is still treated as a comment — stripping stays best-effort
//! rather than semantic.

use std::sync::LazyLock;

use regex::Regex;

use super::scan::{self, Segment};

/// Environments whose content is exempt from comment stripping.
const VERBATIM_ENVIRONMENTS: &[&str] = &["verbatim", "Verbatim", "lstlisting"];

static VERBATIM_SPLITTER: LazyLock<Regex> =
    LazyLock::new(|| scan::environment_pattern(VERBATIM_ENVIRONMENTS));

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\begin\s*\{\s*comment\s*\}.*?\\end\s*\{\s*comment\s*\}\s*\n?")
        .expect("block comment pattern")
});

/// Removes all comments from `text`.
///
/// Line comments consume their trailing newline, mirroring TeX's behavior of
/// joining a `%`-terminated line with the next one. Escaped markers (`\%`)
/// are kept. Stripping is idempotent.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in scan::split_protected(&VERBATIM_SPLITTER, text) {
        match segment {
            Segment::Protected(s) => out.push_str(s),
            Segment::Plain(s) => {
                let without_lines = strip_line_comments(s);
                out.push_str(&BLOCK_COMMENT.replace_all(&without_lines, ""));
            }
        }
    }
    out
}

/// Truncates every line at its first unescaped `%`, consuming the newline.
pub(crate) fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut escaped = false;
    let mut in_comment = false;
    for ch in text.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            continue;
        }
        match ch {
            '\\' if !escaped => {
                escaped = true;
                out.push(ch);
            }
            '%' if !escaped => in_comment = true,
            _ => {
                escaped = false;
                out.push(ch);
            }
        }
    }
    out
}
