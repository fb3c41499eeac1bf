//! Brace-aware text scanning
//!
//! The directive vocabulary is matched as fixed-shape textual patterns, not a
//! grammar. Directive heads are regular; their brace-delimited arguments are
//! not (arguments nest), so heads are found with `regex` and argument extents
//! with the balanced-brace scanner here.

use regex::Regex;

/// A region of a document, as produced by [`split_protected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Ordinary text, safe to rewrite.
    Plain(&'a str),
    /// The full text of a protected environment, `\begin` through `\end`.
    Protected(&'a str),
}

impl<'a> Segment<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Segment::Plain(s) | Segment::Protected(s) => s,
        }
    }
}

/// Builds the pattern matching any `\begin{env}...\end{env}` block for the
/// given environment names.
///
/// Mirrors TeX's own tolerance for whitespace inside the braces. The pattern
/// does not require the `\end` name to match the `\begin` name; nesting of
/// protected environments inside each other is handled well enough for the
/// conservative uses this crate has (never rewriting too much).
pub fn environment_pattern(environments: &[&str]) -> Regex {
    let names = environments
        .iter()
        .map(|env| regex::escape(env))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"(?s)\\begin\s*\{{\s*(?:{names})\s*\}}.*?\\end\s*\{{\s*(?:{names})\s*\}}"
    );
    Regex::new(&pattern).expect("environment pattern is built from escaped literals")
}

/// Splits `text` into plain and protected segments using a pattern built by
/// [`environment_pattern`]. Concatenating the segments yields `text` exactly.
pub fn split_protected<'a>(pattern: &Regex, text: &'a str) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for found in pattern.find_iter(text) {
        if found.start() > last {
            segments.push(Segment::Plain(&text[last..found.start()]));
        }
        segments.push(Segment::Protected(found.as_str()));
        last = found.end();
    }
    if last < text.len() {
        segments.push(Segment::Plain(&text[last..]));
    }
    segments
}

/// Finds the byte index of the `}` matching the `{` at `open`.
///
/// Escaped braces (`\{`, `\}`) do not affect nesting. Returns `None` when
/// `open` does not point at a `{` or the group never closes.
pub fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 1usize;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Collapses runs of blank (or whitespace-only) lines into a single blank
/// line.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;
    let mut seen_content = false;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            pending_blank = seen_content;
            continue;
        }
        if seen_content {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        out.push_str(line);
        pending_blank = false;
        seen_content = true;
    }
    if text.ends_with('\n') && seen_content {
        out.push('\n');
    }
    out
}
