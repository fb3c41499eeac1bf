//! Asset reference resolution
//!
//! Finds `\includegraphics` references plus the class, bibliography-style
//! and bibliography-database references, and resolves each one to a file
//! inside the source tree. Image references without an extension are probed
//! against a fixed candidate list in preference order. Resolution never
//! follows a reference outside the project root.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::diagnostics::{Diagnostics, Warning};
use crate::project::SourceTree;

/// Extension probe order for extensionless image references, matching the
/// graphics rule pdfTeX itself applies.
pub const IMAGE_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "eps"];

static INCLUDEGRAPHICS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\includegraphics(?:\[[^\]]*\])?\s*\{\s*([^}]*?)\s*\}")
        .expect("includegraphics pattern")
});

static DOCUMENTCLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\documentclass(?:\[[^\]]*\])?\s*\{\s*([^}]+?)\s*\}")
        .expect("documentclass pattern")
});

static BIBLIOGRAPHYSTYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\bibliographystyle\s*\{\s*([^}]*?)\s*\}").expect("bibliographystyle pattern")
});

static BIBLIOGRAPHY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\bibliography\s*\{\s*([^}]*?)\s*\}").expect("bibliography pattern")
});

/// A resolved file to copy into the output tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AssetFile {
    /// Path relative to the source root; the copy keeps this structure.
    pub relative: PathBuf,
    /// Absolute path in the source tree.
    #[serde(skip)]
    pub absolute: PathBuf,
}

/// Collects `\includegraphics` reference strings, deduplicated in first-use
/// order.
pub fn image_references(text: &str) -> Vec<String> {
    let mut references = Vec::new();
    for captures in INCLUDEGRAPHICS.captures_iter(text) {
        if let Some(path) = captures.get(1) {
            let path = path.as_str();
            if !path.is_empty() && !references.iter().any(|seen| seen == path) {
                references.push(path.to_string());
            }
        }
    }
    references
}

/// Resolves image references against the source tree.
///
/// A reference with an extension is taken as-is; one without is probed with
/// `extensions` in order, first hit wins. Unresolvable references and
/// root-escaping references are recorded and skipped.
pub fn resolve_images(
    references: &[String],
    tree: &SourceTree,
    extensions: &[String],
    diagnostics: &mut Diagnostics,
) -> Vec<AssetFile> {
    let mut resolved = Vec::new();
    for reference in references {
        match resolve_image(reference, tree, extensions) {
            Resolution::Found(asset) => resolved.push(asset),
            Resolution::OutsideRoot => diagnostics.push(Warning::AssetOutsideRoot {
                path: reference.clone(),
            }),
            Resolution::NotFound => diagnostics.push(Warning::UnresolvedAsset {
                path: reference.clone(),
            }),
        }
    }
    resolved
}

enum Resolution {
    Found(AssetFile),
    OutsideRoot,
    NotFound,
}

fn resolve_image(reference: &str, tree: &SourceTree, extensions: &[String]) -> Resolution {
    if Path::new(reference).is_absolute() {
        return Resolution::OutsideRoot;
    }
    let candidates: Vec<PathBuf> = if Path::new(reference).extension().is_some() {
        vec![PathBuf::from(reference)]
    } else {
        extensions
            .iter()
            .map(|ext| PathBuf::from(format!("{reference}.{ext}")))
            .collect()
    };

    let mut escaped = false;
    for candidate in candidates {
        let Some(absolute) = tree.join_checked(&candidate.to_string_lossy()) else {
            escaped = true;
            continue;
        };
        if absolute.is_file() {
            let relative = tree
                .relative_path(&absolute)
                .unwrap_or_else(|| candidate.clone());
            return Resolution::Found(AssetFile { relative, absolute });
        }
    }
    if escaped {
        Resolution::OutsideRoot
    } else {
        Resolution::NotFound
    }
}

/// The class name of the document, when declared.
pub fn document_class(text: &str) -> Option<String> {
    DOCUMENTCLASS
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
}

/// The bibliography style name, when declared.
pub fn bibliography_style(text: &str) -> Option<String> {
    BIBLIOGRAPHYSTYLE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
}

/// The database names listed by `\bibliography{...}`, in order.
pub fn bibliography_names(text: &str) -> Vec<String> {
    BIBLIOGRAPHY
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|list| {
            list.as_str()
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Rewrites the `\bibliography{...}` directive to reference `stem`.
pub fn rewrite_bibliography(text: &str, stem: &str) -> String {
    BIBLIOGRAPHY
        .replace(text, format!("\\bibliography{{{stem}}}"))
        .into_owned()
}

/// Resolves a class or style file sitting next to the main document.
///
/// A missing `.cls` is no event — the class is simply a standard one — so
/// `warn_missing` is set only for files the document explicitly names, like
/// a `.bst`.
pub fn resolve_support_file(
    name: &str,
    extension: &str,
    tree: &SourceTree,
    warn_missing: bool,
    diagnostics: &mut Diagnostics,
) -> Option<AssetFile> {
    let file_name = format!("{name}.{extension}");
    let absolute = tree.join_checked(&file_name)?;
    if absolute.is_file() {
        let relative = tree.relative_path(&absolute)?;
        return Some(AssetFile { relative, absolute });
    }
    if warn_missing {
        diagnostics.push(Warning::MissingStyleFile { name: file_name });
    }
    None
}

/// Picks the first existing database from `\bibliography{...}`'s names.
pub fn resolve_bibliography(
    names: &[String],
    tree: &SourceTree,
    diagnostics: &mut Diagnostics,
) -> Option<PathBuf> {
    for name in names {
        if let Some(path) = tree.join_checked(&format!("{name}.bib")) {
            if path.is_file() {
                return Some(path);
            }
        }
    }
    if !names.is_empty() {
        diagnostics.push(Warning::MissingBibliography {
            name: names.join(","),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn tree_with(files: &[&str]) -> (TempDir, SourceTree) {
        let dir = TempDir::new().unwrap();
        for name in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, b"data").unwrap();
        }
        let tree = SourceTree::open(dir.path()).unwrap();
        (dir, tree)
    }

    fn default_extensions() -> Vec<String> {
        IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn collects_unique_references_in_order() {
        let text = "\\includegraphics{a}\\includegraphics[width=\\linewidth]{b}\\includegraphics{a}";
        assert_eq!(image_references(text), vec!["a", "b"]);
    }

    #[test]
    fn probes_extensions_in_preference_order() {
        let (_dir, tree) = tree_with(&["figure1.png", "figure1.eps"]);
        let mut diagnostics = Diagnostics::new();
        let resolved = resolve_images(
            &["figure1".to_string()],
            &tree,
            &default_extensions(),
            &mut diagnostics,
        );
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].relative, PathBuf::from("figure1.png"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn explicit_extension_is_used_as_is() {
        let (_dir, tree) = tree_with(&["figs/plot.eps", "figs/plot.pdf"]);
        let mut diagnostics = Diagnostics::new();
        let resolved = resolve_images(
            &["figs/plot.eps".to_string()],
            &tree,
            &default_extensions(),
            &mut diagnostics,
        );
        assert_eq!(resolved[0].relative, PathBuf::from("figs/plot.eps"));
    }

    #[test]
    fn unresolved_reference_warns_and_is_omitted() {
        let (_dir, tree) = tree_with(&[]);
        let mut diagnostics = Diagnostics::new();
        let resolved = resolve_images(
            &["ghost".to_string()],
            &tree,
            &default_extensions(),
            &mut diagnostics,
        );
        assert!(resolved.is_empty());
        assert_eq!(diagnostics.summary()["unresolved_asset"], vec!["ghost"]);
    }

    #[test]
    fn escaping_reference_warns_and_is_skipped() {
        let (_dir, tree) = tree_with(&[]);
        let mut diagnostics = Diagnostics::new();
        let resolved = resolve_images(
            &["../secrets/figure.pdf".to_string()],
            &tree,
            &default_extensions(),
            &mut diagnostics,
        );
        assert!(resolved.is_empty());
        assert_eq!(
            diagnostics.summary()["asset_outside_root"],
            vec!["../secrets/figure.pdf"]
        );
    }

    #[test]
    fn absolute_reference_is_outside_the_root() {
        let (_dir, tree) = tree_with(&[]);
        let mut diagnostics = Diagnostics::new();
        resolve_images(
            &["/etc/passwd".to_string()],
            &tree,
            &default_extensions(),
            &mut diagnostics,
        );
        assert_eq!(diagnostics.summary()["asset_outside_root"].len(), 1);
    }

    #[test]
    fn nested_image_keeps_relative_structure() {
        let (_dir, tree) = tree_with(&["figures/ch1/plot.pdf"]);
        let mut diagnostics = Diagnostics::new();
        let resolved = resolve_images(
            &["figures/ch1/plot".to_string()],
            &tree,
            &default_extensions(),
            &mut diagnostics,
        );
        assert_eq!(resolved[0].relative, PathBuf::from("figures/ch1/plot.pdf"));
    }

    #[test]
    fn finds_document_class_and_custom_cls() {
        let (_dir, tree) = tree_with(&["acmart.cls"]);
        let text = "\\documentclass[sigconf]{acmart}";
        let name = document_class(text).unwrap();
        assert_eq!(name, "acmart");

        let mut diagnostics = Diagnostics::new();
        let cls = resolve_support_file(&name, "cls", &tree, false, &mut diagnostics);
        assert_eq!(cls.unwrap().relative, PathBuf::from("acmart.cls"));
    }

    #[test]
    fn standard_class_resolves_to_nothing_without_warning() {
        let (_dir, tree) = tree_with(&[]);
        let mut diagnostics = Diagnostics::new();
        let cls = resolve_support_file("article", "cls", &tree, false, &mut diagnostics);
        assert!(cls.is_none());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn missing_bst_is_reported() {
        let (_dir, tree) = tree_with(&[]);
        let mut diagnostics = Diagnostics::new();
        let bst = resolve_support_file("plainnat", "bst", &tree, true, &mut diagnostics);
        assert!(bst.is_none());
        assert_eq!(
            diagnostics.summary()["missing_style_file"],
            vec!["plainnat.bst"]
        );
    }

    #[test]
    fn first_existing_bibliography_wins() {
        let (_dir, tree) = tree_with(&["refs.bib"]);
        let names = vec!["missing".to_string(), "refs".to_string()];
        let mut diagnostics = Diagnostics::new();
        let path = resolve_bibliography(&names, &tree, &mut diagnostics).unwrap();
        assert!(path.ends_with("refs.bib"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn no_existing_bibliography_warns() {
        let (_dir, tree) = tree_with(&[]);
        let names = vec!["refs".to_string()];
        let mut diagnostics = Diagnostics::new();
        assert!(resolve_bibliography(&names, &tree, &mut diagnostics).is_none());
        assert_eq!(diagnostics.summary()["missing_bibliography"], vec!["refs"]);
    }

    #[test]
    fn rewrites_bibliography_to_the_output_stem() {
        let text = "pre\n\\bibliography{refs,extra}\npost";
        assert_eq!(
            rewrite_bibliography(text, "main"),
            "pre\n\\bibliography{main}\npost"
        );
    }

    #[test]
    fn bibliography_names_split_on_commas() {
        assert_eq!(
            bibliography_names("\\bibliography{main, extra}"),
            vec!["main", "extra"]
        );
        assert!(bibliography_names("no directive").is_empty());
    }
}
