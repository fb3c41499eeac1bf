//! Declaration collection and pruning
//!
//! Scans the merged body for `\usepackage`, macro-definition and
//! `\definecolor` declarations, removes them from the body, deduplicates
//! them, and discards the ones nothing references. What survives becomes the
//! rebuilt preamble, in group order: packages, then colors, then macros.
//!
//! A declaration-like directive that cannot be parsed (unbalanced body,
//! unbraced macro name) is reported and left in the body untouched; nothing
//! that is not fully understood gets deleted.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::diagnostics::{Diagnostics, Warning};
use super::scan;

/// What a declaration declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Package,
    Color,
    Macro,
}

impl DeclKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Package => "package",
            DeclKind::Color => "color",
            DeclKind::Macro => "macro",
        }
    }
}

/// The three recognized macro-definition forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacroForm {
    /// `\newcommand`
    Define,
    /// `\renewcommand`
    Redefine,
    /// `\providecommand`
    Provide,
}

impl MacroForm {
    /// Redefinitions and conditional defines express the author's final
    /// intent and win ties under [`MacroPolicy::Final`].
    fn overrides(self) -> bool {
        matches!(self, MacroForm::Redefine | MacroForm::Provide)
    }
}

/// Tie-break policy for duplicate macro definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroPolicy {
    /// The last `\renewcommand`/`\providecommand` beats an earlier plain
    /// `\newcommand`; with no redefinition present, the first definition
    /// wins.
    #[default]
    Final,
    /// The first definition wins regardless of form.
    First,
}

impl MacroPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacroPolicy::Final => "final",
            MacroPolicy::First => "first",
        }
    }
}

/// One surviving preamble declaration.
#[derive(Debug, Clone, Serialize)]
pub struct Declaration {
    pub kind: DeclKind,
    pub key: String,
    pub text: String,
    #[serde(skip)]
    first_seen: usize,
}

/// Knobs for [`collect`].
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub macro_policy: MacroPolicy,
    /// Package usage is rarely textual; disabling this keeps every unique
    /// package import instead of pruning the unreferenced ones.
    pub prune_unused_packages: bool,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            macro_policy: MacroPolicy::default(),
            prune_unused_packages: true,
        }
    }
}

/// Result of declaration collection.
#[derive(Debug)]
pub struct CollectedPreamble {
    /// Surviving declarations: packages, then colors, then macros, each
    /// group in first-seen order.
    pub kept: Vec<Declaration>,
    /// Deduplicated declarations discarded because nothing references them.
    pub pruned: Vec<Declaration>,
    /// The body with every parsed declaration removed.
    pub body: String,
}

struct Occurrence {
    kind: DeclKind,
    key: String,
    /// Identifiers checked for usage: package names, or the single
    /// macro/color name.
    names: Vec<String>,
    form: Option<MacroForm>,
    span: Range<usize>,
}

static USEPACKAGE_SITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\usepackage").expect("usepackage site pattern"));

static USEPACKAGE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\\usepackage\s*(?:\[[^\]]*\])?\s*\{\s*([^}]+?)\s*\}")
        .expect("usepackage head pattern")
});

static MACRO_SITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:renew|new|provide)command").expect("macro site pattern"));

static MACRO_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\\(renew|new|provide)command\s*\*?\s*\{\s*\\([a-zA-Z@]+)\s*\}\s*((?:\[[^\]]*\]\s*){0,2})\{")
        .expect("macro head pattern")
});

static COLOR_SITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\definecolor").expect("color site pattern"));

static COLOR_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\\definecolor\s*\{\s*([a-zA-Z@][\w@.\-]*)\s*\}\s*\{\s*([a-zA-Z]+)\s*\}\s*\{")
        .expect("color head pattern")
});

/// Collects, deduplicates and prunes the declarations in `body`.
pub fn collect(
    body: &str,
    options: &CollectorOptions,
    diagnostics: &mut Diagnostics,
) -> CollectedPreamble {
    let occurrences = collect_occurrences(body, diagnostics);
    let survivors = select_survivors(&occurrences, body, options.macro_policy);
    let stripped = remove_spans(body, occurrences.iter().map(|occ| occ.span.clone()));

    // An entry is used when its identifier occurs in the stripped body or in
    // the text of another surviving declaration. The check is textual and a
    // single pass; it does not chase chains of declarations only used by
    // other pruned declarations.
    let mut kept = Vec::new();
    let mut pruned = Vec::new();
    for (index, declaration) in survivors.iter().enumerate() {
        let skip_check =
            declaration.kind == DeclKind::Package && !options.prune_unused_packages;
        let used = skip_check
            || is_referenced(declaration, &stripped, &survivors, index, &occurrences);
        if used {
            kept.push(declaration.clone());
        } else {
            pruned.push(declaration.clone());
        }
    }

    CollectedPreamble {
        kept,
        pruned,
        body: stripped,
    }
}

fn collect_occurrences(body: &str, diagnostics: &mut Diagnostics) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();
    scan_packages(body, &mut occurrences, diagnostics);
    scan_macros(body, &mut occurrences, diagnostics);
    scan_colors(body, &mut occurrences, diagnostics);
    occurrences.sort_by_key(|occ| occ.span.start);

    // A declaration nested inside another one's body (say a \definecolor in
    // a macro definition) stays part of the outer text.
    let mut flat: Vec<Occurrence> = Vec::with_capacity(occurrences.len());
    for occ in occurrences {
        match flat.last() {
            Some(previous) if occ.span.start < previous.span.end => {}
            _ => flat.push(occ),
        }
    }
    flat
}

fn scan_packages(body: &str, out: &mut Vec<Occurrence>, diagnostics: &mut Diagnostics) {
    for site in USEPACKAGE_SITE.find_iter(body) {
        if continues_control_word(body, site.end()) {
            continue;
        }
        let rest = &body[site.start()..];
        let Some(captures) = USEPACKAGE_HEAD.captures(rest) else {
            push_malformed(DeclKind::Package, rest, diagnostics);
            continue;
        };
        let (Some(whole), Some(arg)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let names: Vec<String> = arg
            .as_str()
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            push_malformed(DeclKind::Package, rest, diagnostics);
            continue;
        }
        out.push(Occurrence {
            kind: DeclKind::Package,
            key: names.join(","),
            names,
            form: None,
            span: site.start()..site.start() + whole.end(),
        });
    }
}

fn scan_macros(body: &str, out: &mut Vec<Occurrence>, diagnostics: &mut Diagnostics) {
    for site in MACRO_SITE.find_iter(body) {
        if continues_control_word(body, site.end()) {
            // \newcommandx and friends are different directives.
            continue;
        }
        let rest = &body[site.start()..];
        let parsed = MACRO_HEAD.captures(rest).and_then(|captures| {
            let head = captures.get(0)?;
            let form = match captures.get(1)?.as_str() {
                "renew" => MacroForm::Redefine,
                "provide" => MacroForm::Provide,
                _ => MacroForm::Define,
            };
            let name = captures.get(2)?.as_str().to_string();
            let body_open = head.end() - 1;
            let body_close = scan::matching_brace(rest, body_open)?;
            Some((form, name, body_close + 1))
        });
        match parsed {
            Some((form, name, len)) => out.push(Occurrence {
                kind: DeclKind::Macro,
                key: name.clone(),
                names: vec![name],
                form: Some(form),
                span: site.start()..site.start() + len,
            }),
            None => push_malformed(DeclKind::Macro, rest, diagnostics),
        }
    }
}

fn scan_colors(body: &str, out: &mut Vec<Occurrence>, diagnostics: &mut Diagnostics) {
    for site in COLOR_SITE.find_iter(body) {
        if continues_control_word(body, site.end()) {
            continue;
        }
        let rest = &body[site.start()..];
        let parsed = COLOR_HEAD.captures(rest).and_then(|captures| {
            let head = captures.get(0)?;
            let name = captures.get(1)?.as_str().to_string();
            let spec_open = head.end() - 1;
            let spec_close = scan::matching_brace(rest, spec_open)?;
            Some((name, spec_close + 1))
        });
        match parsed {
            Some((name, len)) => out.push(Occurrence {
                kind: DeclKind::Color,
                key: name.clone(),
                names: vec![name],
                form: None,
                span: site.start()..site.start() + len,
            }),
            None => push_malformed(DeclKind::Color, rest, diagnostics),
        }
    }
}

/// True when the directive name continues with more letters, i.e. the site
/// is a longer, unrelated control word.
fn continues_control_word(body: &str, end: usize) -> bool {
    body[end..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
}

fn push_malformed(kind: DeclKind, rest: &str, diagnostics: &mut Diagnostics) {
    let snippet: String = rest.lines().next().unwrap_or_default().chars().take(60).collect();
    diagnostics.push(Warning::MalformedDeclaration {
        declaration: kind.as_str().to_string(),
        snippet,
    });
}

/// Applies deduplication and the macro tie-break policy, producing one
/// declaration per key in group order.
fn select_survivors(
    occurrences: &[Occurrence],
    body: &str,
    policy: MacroPolicy,
) -> Vec<Declaration> {
    // Group occurrences by kind+key, preserving first-seen order.
    let mut order: Vec<(DeclKind, String)> = Vec::new();
    let mut groups: HashMap<(DeclKind, String), Vec<&Occurrence>> = HashMap::new();
    for occ in occurrences {
        let group_key = (occ.kind, occ.key.clone());
        let group = groups.entry(group_key.clone()).or_default();
        if group.is_empty() {
            order.push(group_key);
        }
        group.push(occ);
    }

    let mut survivors: Vec<Declaration> = order
        .iter()
        .filter_map(|group_key| {
            let group = groups.get(group_key)?;
            let chosen = match (group_key.0, policy) {
                (DeclKind::Macro, MacroPolicy::Final) => group
                    .iter()
                    .rev()
                    .find(|occ| occ.form.is_some_and(MacroForm::overrides))
                    .or_else(|| group.first()),
                _ => group.first(),
            }?;
            let first_seen = group.first().map_or(chosen.span.start, |occ| occ.span.start);
            Some(Declaration {
                kind: chosen.kind,
                key: chosen.key.clone(),
                text: body[chosen.span.clone()].to_string(),
                first_seen,
            })
        })
        .collect();

    survivors.sort_by_key(|declaration| (declaration.kind, declaration.first_seen));
    survivors
}

/// Deletes the given spans from `body`, swallowing the whitespace run before
/// each one so no blank hole is left behind.
fn remove_spans(body: &str, spans: impl Iterator<Item = Range<usize>>) -> String {
    let mut sorted: Vec<Range<usize>> = spans.collect();
    sorted.sort_by_key(|span| std::cmp::Reverse(span.start));

    let mut out = body.to_string();
    for span in sorted {
        let mut start = span.start;
        while start > 0 && out.as_bytes()[start - 1].is_ascii_whitespace() {
            start -= 1;
        }
        out.replace_range(start..span.end, "");
    }
    out
}

fn is_referenced(
    declaration: &Declaration,
    stripped_body: &str,
    survivors: &[Declaration],
    index: usize,
    occurrences: &[Occurrence],
) -> bool {
    let names = occurrences
        .iter()
        .find(|occ| occ.kind == declaration.kind && occ.key == declaration.key)
        .map(|occ| occ.names.as_slice())
        .unwrap_or_default();

    names.iter().any(|name| {
        if reference_in(stripped_body, declaration.kind, name) {
            return true;
        }
        survivors
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .any(|(_, other)| reference_in(&other.text, declaration.kind, name))
    })
}

fn reference_in(corpus: &str, kind: DeclKind, name: &str) -> bool {
    match kind {
        DeclKind::Macro => {
            let needle = format!("\\{name}");
            corpus.match_indices(&needle).any(|(at, _)| {
                corpus[at + needle.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_ascii_alphabetic() && c != '@')
            })
        }
        DeclKind::Package | DeclKind::Color => match word_pattern(name) {
            Some(pattern) => pattern.is_match(corpus),
            None => true,
        },
    }
}

fn word_pattern(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(name))).ok()
}
