//! Output reformatting
//!
//! Reflows the merged document so each paragraph sits on one line, then
//! re-applies structural indentation. Protected environments keep their
//! content as-is, except captions, whose text is collapsed onto one line.
//! This stage runs after the pipeline proper and only touches presentation.

use std::sync::LazyLock;

use regex::Regex;

use super::scan::{self, Segment};

/// Environments whose content the formatter must not reflow.
pub const PROTECTED_ENVIRONMENTS: &[&str] = &[
    "figure",
    "figure*",
    "table",
    "table*",
    "tabular",
    "verbatim",
    "Verbatim",
    "lstlisting",
    "equation",
    "equation*",
    "align",
    "align*",
    "itemize",
    "enumerate",
    "description",
];

static PROTECTED_SPLITTER: LazyLock<Regex> =
    LazyLock::new(|| scan::environment_pattern(PROTECTED_ENVIRONMENTS));

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(\s*\n)+").expect("blank run pattern"));

static CAPTION_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\caption\s*(?:\[[^\]]*\])?\s*\{").expect("caption pattern"));

static INDENT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\s*\{|\\left\b").expect("indent token pattern"));

static DEDENT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\end\s*\{|\\right\b").expect("dedent token pattern"));

static BEGIN_DOCUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\begin\s*\{\s*document\s*\}").expect("document pattern"));

static BEGIN_VERBATIM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\begin\s*\{\s*(?:verbatim|Verbatim|lstlisting)\s*\}")
        .expect("verbatim begin pattern")
});

static END_VERBATIM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\end\s*\{\s*(?:verbatim|Verbatim|lstlisting)\s*\}")
        .expect("verbatim end pattern")
});

/// Reflows and re-indents the document.
pub fn beautify(text: &str) -> String {
    reindent(&reflow(text))
}

/// Merges paragraphs onto single lines outside protected environments and
/// collapses caption text inside them.
pub fn reflow(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in scan::split_protected(&PROTECTED_SPLITTER, text) {
        match segment {
            Segment::Plain(part) => {
                let unindented: Vec<&str> =
                    part.split('\n').map(str::trim_start).collect();
                let joined = unindented.join("\n");
                let normalized = BLANK_RUN.replace_all(&joined, "\n\n");
                out.push_str(&merge_soft_newlines(&normalized));
            }
            Segment::Protected(part) => out.push_str(&collapse_captions(part)),
        }
    }
    out
}

/// Replaces a lone newline with a space unless the next line starts a
/// command, then squeezes repeated spaces. Blank lines (paragraph breaks)
/// survive.
fn merge_soft_newlines(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut previous: Option<char> = None;
    for (at, &ch) in chars.iter().enumerate() {
        let next = chars.get(at + 1);
        let merge = ch == '\n'
            && previous != Some('\n')
            && !matches!(next, Some('\\') | Some('\n'));
        if merge {
            if !out.ends_with(' ') {
                out.push(' ');
            }
        } else if ch == ' ' && out.ends_with(' ') {
            // squeeze runs of spaces
        } else {
            out.push(ch);
        }
        previous = Some(ch);
    }
    out
}

/// Collapses the text of every `\caption{...}` in `part` onto one line.
fn collapse_captions(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut last = 0;
    for head in CAPTION_HEAD.find_iter(part) {
        if head.start() < last {
            continue;
        }
        let open = head.end() - 1;
        let Some(close) = scan::matching_brace(part, open) else {
            continue;
        };
        out.push_str(&part[last..=open]);
        out.push_str(merge_soft_newlines(&part[open + 1..close]).trim());
        out.push('}');
        last = close + 1;
    }
    out.push_str(&part[last..]);
    out
}

/// Re-applies indentation from `\begin`/`\end` and `\left`/`\right`
/// nesting. The `document` environment itself stays flush left; verbatim
/// content is passed through untouched.
pub fn reindent(text: &str) -> String {
    const INDENT: &str = "    ";

    let mut out: Vec<String> = Vec::new();
    let mut level: i32 = 0;
    let mut in_verbatim = false;

    for raw_line in text.split('\n') {
        if in_verbatim && !END_VERBATIM.is_match(raw_line) {
            out.push(raw_line.to_string());
            continue;
        }
        in_verbatim = false;

        let line = raw_line.trim();
        if line.is_empty() {
            out.push(String::new());
            continue;
        }

        let mut delta = INDENT_TOKEN.find_iter(line).count() as i32
            - DEDENT_TOKEN.find_iter(line).count() as i32;
        if BEGIN_DOCUMENT.is_match(line) {
            delta -= 1;
        }

        let dedent_first = line.starts_with("\\end") || line.starts_with("\\right");
        if dedent_first {
            level = (level + delta).max(0);
            out.push(format!("{}{}", INDENT.repeat(level as usize), line));
        } else {
            out.push(format!("{}{}", INDENT.repeat(level as usize), line));
            level = (level + delta).max(0);
        }

        if BEGIN_VERBATIM.is_match(line) && !END_VERBATIM.is_match(line) {
            in_verbatim = true;
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_a_paragraph_onto_one_line() {
        let text = "First sentence.\nSecond sentence\nthird piece.\n\nNew paragraph.\n";
        let reflowed = reflow(text);
        assert!(reflowed.contains("First sentence. Second sentence third piece."));
        assert!(reflowed.contains("\n\nNew paragraph."));
    }

    #[test]
    fn line_starting_a_command_is_not_merged() {
        let text = "Some prose.\n\\section{Next}\n";
        let reflowed = reflow(text);
        assert!(reflowed.contains("Some prose.\n\\section{Next}"));
    }

    #[test]
    fn protected_environment_keeps_its_lines() {
        let text = "\\begin{tabular}{ll}\na & b \\\\\nc & d\n\\end{tabular}\n";
        let reflowed = reflow(text);
        assert!(reflowed.contains("a & b \\\\\nc & d"));
    }

    #[test]
    fn caption_text_collapses_to_one_line() {
        let text = "\\begin{figure}\n\\caption{A caption\nspread over\nlines}\n\\end{figure}\n";
        let reflowed = reflow(text);
        assert!(reflowed.contains("\\caption{A caption spread over lines}"));
    }

    #[test]
    fn caption_with_nested_braces_survives() {
        let text = "\\begin{figure}\n\\caption{Uses \\emph{nested\nbraces} inside}\n\\end{figure}\n";
        let reflowed = reflow(text);
        assert!(reflowed.contains("\\caption{Uses \\emph{nested braces} inside}"));
    }

    #[test]
    fn leading_indentation_is_dropped_outside_protection() {
        let text = "    indented prose\n        more\n";
        let reflowed = reflow(text);
        assert!(reflowed.starts_with("indented prose more"));
    }

    #[test]
    fn reindent_nests_environments() {
        let text = "\\begin{itemize}\n\\item one\n\\end{itemize}";
        let indented = reindent(text);
        assert_eq!(indented, "\\begin{itemize}\n    \\item one\n\\end{itemize}");
    }

    #[test]
    fn document_environment_stays_flush_left() {
        let text = "\\begin{document}\nprose\n\\end{document}";
        let indented = reindent(text);
        assert_eq!(indented, "\\begin{document}\nprose\n\\end{document}");
    }

    #[test]
    fn left_right_pairs_indent_math() {
        let text = "\\left(\nx\n\\right)";
        let indented = reindent(text);
        assert_eq!(indented, "\\left(\n    x\n\\right)");
    }

    #[test]
    fn verbatim_lines_keep_their_own_indentation() {
        let text = "\\begin{verbatim}\n    keep me\n\\end{verbatim}";
        let indented = reindent(text);
        assert!(indented.contains("\n    keep me\n"));
    }

    #[test]
    fn unbalanced_ends_never_go_negative() {
        let text = "\\end{itemize}\nafter";
        let indented = reindent(text);
        assert_eq!(indented, "\\end{itemize}\nafter");
    }

    #[test]
    fn beautify_reflows_then_indents() {
        let text = "Intro text\nspread over lines.\n\n\\begin{itemize}\n\\item one\n\\end{itemize}\n";
        let pretty = beautify(text);
        assert!(pretty.contains("Intro text spread over lines."));
        assert!(pretty.contains("    \\item one"));
    }
}
