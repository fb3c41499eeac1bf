//! Final document assembly
//!
//! Puts the rebuilt preamble back into the cleaned body and packages
//! everything the output writer needs into one [`Flattened`] value.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::assets::AssetFile;
use super::bib::FilteredBibliography;
use super::diagnostics::{Diagnostics, Warning};
use super::preamble::{DeclKind, Declaration};

static DOCUMENTCLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\documentclass(?:\[[^\]]*\])?\s*\{\s*[^}]+?\s*\}")
        .expect("documentclass pattern")
});

/// Everything a flatten run produces. The caller owns all output I/O.
#[derive(Debug, Serialize)]
pub struct Flattened {
    /// The merged, comment-stripped, declaration-consolidated document.
    pub document: String,
    /// Preamble declarations, in emission order.
    pub preamble: Vec<Declaration>,
    /// Declarations discarded as unused.
    pub pruned: Vec<Declaration>,
    /// The cited subset of the bibliography, when one was processed.
    pub bibliography: Option<FilteredBibliography>,
    /// Images to copy, relative structure preserved.
    pub assets: Vec<AssetFile>,
    /// Class and bibliography-style files to copy.
    pub styles: Vec<AssetFile>,
    /// Everything that was skipped or dropped along the way.
    pub diagnostics: Diagnostics,
}

/// Renders the preamble block: packages, colors, macros, one group per
/// paragraph.
pub fn render_preamble(declarations: &[Declaration]) -> String {
    let mut blocks = Vec::new();
    for kind in [DeclKind::Package, DeclKind::Color, DeclKind::Macro] {
        let group: Vec<&str> = declarations
            .iter()
            .filter(|declaration| declaration.kind == kind)
            .map(|declaration| declaration.text.as_str())
            .collect();
        if !group.is_empty() {
            blocks.push(group.join("\n"));
        }
    }
    blocks.join("\n\n")
}

/// Inserts the preamble block right after `\documentclass`, or at the top of
/// the document (with a warning) when there is none.
pub fn insert_preamble(
    body: &str,
    declarations: &[Declaration],
    diagnostics: &mut Diagnostics,
) -> String {
    let block = render_preamble(declarations);
    if block.is_empty() {
        return body.to_string();
    }
    match DOCUMENTCLASS.find(body) {
        Some(found) => {
            let mut out = String::with_capacity(body.len() + block.len() + 4);
            out.push_str(&body[..found.end()]);
            out.push_str("\n\n");
            out.push_str(&block);
            out.push_str(&body[found.end()..]);
            out
        }
        None => {
            diagnostics.push(Warning::NoDocumentClass);
            format!("{block}\n\n{body}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::preamble::{collect, CollectorOptions};
    use super::*;

    fn declarations_from(body: &str) -> Vec<Declaration> {
        let mut diagnostics = Diagnostics::new();
        collect(body, &CollectorOptions::default(), &mut diagnostics).kept
    }

    #[test]
    fn preamble_goes_after_documentclass() {
        let declarations =
            declarations_from("\\usepackage{listings}\nthe listings package\n");
        let body = "\\documentclass[11pt]{article}\nrest of document\n";
        let mut diagnostics = Diagnostics::new();
        let assembled = insert_preamble(body, &declarations, &mut diagnostics);
        assert!(assembled.starts_with(
            "\\documentclass[11pt]{article}\n\n\\usepackage{listings}\n"
        ));
        assert!(assembled.ends_with("rest of document\n"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn missing_documentclass_puts_preamble_on_top() {
        let declarations =
            declarations_from("\\usepackage{listings}\nthe listings package\n");
        let mut diagnostics = Diagnostics::new();
        let assembled = insert_preamble("plain body\n", &declarations, &mut diagnostics);
        assert!(assembled.starts_with("\\usepackage{listings}\n\n"));
        assert_eq!(diagnostics.summary()["no_document_class"], Vec::<String>::new());
    }

    #[test]
    fn empty_preamble_changes_nothing() {
        let mut diagnostics = Diagnostics::new();
        let assembled = insert_preamble("body", &[], &mut diagnostics);
        assert_eq!(assembled, "body");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn groups_are_separated_by_blank_lines() {
        let source = "\\usepackage{listings}\n\\definecolor{accent}{rgb}{1,0,0}\n\\newcommand{\\hi}{x}\nuse listings accent \\hi{}\n";
        let block = render_preamble(&declarations_from(source));
        assert_eq!(
            block,
            "\\usepackage{listings}\n\n\\definecolor{accent}{rgb}{1,0,0}\n\n\\newcommand{\\hi}{x}"
        );
    }
}
