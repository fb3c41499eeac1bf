//! Citation extraction and bibliography filtering
//!
//! The body is scanned for `\cite{...}` directives (comma-separated keys);
//! the bibliography database is then reduced to the entries those keys name.
//! `@string` macros are always carried over — journal abbreviations are cheap
//! and entries may depend on them. A key cited but absent from the database
//! is the downstream compiler's problem, not ours; it is dropped from the
//! output and surfaced as a warning.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::comments;
use super::diagnostics::{Diagnostics, Warning};
use super::scan;

/// Entry types this tool understands. Anything else is passed through only
/// when its key is cited.
pub const ENTRY_TYPES: &[&str] = &[
    "article",
    "book",
    "inproceedings",
    "phdthesis",
    "mastersthesis",
    "inbook",
    "incollection",
    "proceedings",
    "techreport",
    "unpublished",
    "misc",
];

static CITE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\cite(?:\[[^\]]*\])?\s*\{\s*([^}]*?)\s*\}").expect("cite directive pattern")
});

static ENTRY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\s*([a-zA-Z]+)\s*\{").expect("bib entry open pattern"));

/// Checks whether `tag` is in the recognized entry-type set.
pub fn is_recognized_type(tag: &str) -> bool {
    ENTRY_TYPES.iter().any(|t| tag.eq_ignore_ascii_case(t))
}

/// One bibliographic record.
#[derive(Debug, Clone, Serialize)]
pub struct BibEntry {
    pub key: String,
    pub entry_type: String,
    /// False for entry types outside [`ENTRY_TYPES`], which are passed
    /// through unexamined when cited.
    pub recognized: bool,
    #[serde(skip)]
    pub text: String,
}

/// The cited subset of a bibliography database, in database order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilteredBibliography {
    pub entries: Vec<BibEntry>,
    #[serde(skip)]
    pub string_macros: Vec<String>,
}

impl FilteredBibliography {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.string_macros.is_empty()
    }

    /// Renders the filtered database: `@string` macros first, then entries,
    /// comments stripped and blank lines normalized.
    pub fn render(&self) -> String {
        let blocks: Vec<&str> = self
            .string_macros
            .iter()
            .map(String::as_str)
            .chain(self.entries.iter().map(|entry| entry.text.as_str()))
            .collect();
        let joined = blocks.join("\n\n");
        let stripped = comments::strip_line_comments(&joined);
        scan::collapse_blank_lines(&stripped).trim().to_string()
    }
}

/// Extracts every cited key from the body.
pub fn cited_keys(body: &str) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for captures in CITE_DIRECTIVE.captures_iter(body) {
        if let Some(list) = captures.get(1) {
            keys.extend(
                list.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string),
            );
        }
    }
    keys
}

/// Filters `database` down to the cited entries, preserving their original
/// relative order. Cited keys with no matching entry are reported.
pub fn filter_bibliography(
    database: &str,
    cited: &BTreeSet<String>,
    diagnostics: &mut Diagnostics,
) -> FilteredBibliography {
    let mut filtered = FilteredBibliography::default();
    let mut seen_keys: BTreeSet<String> = BTreeSet::new();

    for captures in ENTRY_OPEN.captures_iter(database) {
        let (Some(whole), Some(tag)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let open = whole.end() - 1;
        let Some(close) = scan::matching_brace(database, open) else {
            continue;
        };
        let text = &database[whole.start()..=close];
        let tag_lower = tag.as_str().to_ascii_lowercase();

        if tag_lower == "string" {
            filtered.string_macros.push(text.to_string());
            continue;
        }
        if tag_lower == "comment" || tag_lower == "preamble" {
            continue;
        }

        // The key runs from the opening brace to the first comma.
        let Some(key) = database[open + 1..close]
            .split(',')
            .next()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            continue;
        };
        seen_keys.insert(key.to_string());

        if cited.contains(key) {
            filtered.entries.push(BibEntry {
                key: key.to_string(),
                recognized: is_recognized_type(&tag_lower),
                entry_type: tag_lower,
                text: text.to_string(),
            });
        }
    }

    for key in cited {
        if !seen_keys.contains(key) {
            diagnostics.push(Warning::UnknownCitation { key: key.clone() });
        }
    }

    filtered
}
