//! Inclusion resolution
//!
//! Expands `\input{...}` and `\include{...}` directives depth-first into one
//! merged body. Each file has its comments stripped before its directives are
//! scanned, so a commented-out inclusion is never followed. The active
//! ancestor chain travels down the recursion as an explicit argument; a
//! directive resolving to any ancestor is a cycle and aborts the run.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::comments;
use super::diagnostics::{Diagnostics, Warning};
use super::FlattenError;
use crate::project::SourceTree;

static INCLUDE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:input|include)\s*\{\s*([^}]*?)\s*\}").expect("include directive pattern")
});

/// Merges the document rooted at `main` into a single body.
///
/// `main` must be an absolute path inside `tree`. With `best_effort` set,
/// missing inclusion targets are skipped with a warning instead of failing
/// the run.
pub fn merge(
    tree: &SourceTree,
    main: &Path,
    best_effort: bool,
    diagnostics: &mut Diagnostics,
) -> Result<String, FlattenError> {
    let mut ancestors = Vec::new();
    merge_file(tree, main, None, best_effort, &mut ancestors, diagnostics)
}

fn merge_file(
    tree: &SourceTree,
    path: &Path,
    included_from: Option<&Path>,
    best_effort: bool,
    ancestors: &mut Vec<PathBuf>,
    diagnostics: &mut Diagnostics,
) -> Result<String, FlattenError> {
    if ancestors.iter().any(|ancestor| ancestor == path) {
        let mut chain: Vec<PathBuf> = ancestors.clone();
        chain.push(path.to_path_buf());
        return Err(FlattenError::CyclicInclusion { chain });
    }

    let raw = match tree.read(path) {
        Ok(text) => text,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return Err(FlattenError::MissingFile {
                path: path.to_path_buf(),
                included_from: included_from.map(Path::to_path_buf),
            });
        }
        Err(source) => {
            return Err(FlattenError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let text = comments::strip_comments(&raw);

    ancestors.push(path.to_path_buf());
    let merged = expand(tree, &text, path, best_effort, ancestors, diagnostics);
    ancestors.pop();
    merged
}

/// Replaces every inclusion directive in `text` with the merged content of
/// its target, left to right.
fn expand(
    tree: &SourceTree,
    text: &str,
    current: &Path,
    best_effort: bool,
    ancestors: &mut Vec<PathBuf>,
    diagnostics: &mut Diagnostics,
) -> Result<String, FlattenError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for captures in INCLUDE_DIRECTIVE.captures_iter(text) {
        let (Some(whole), Some(argument)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        let target = argument.as_str();
        match resolve_target(tree, current, target) {
            Some(child) => {
                let merged = merge_file(
                    tree,
                    &child,
                    Some(current),
                    best_effort,
                    ancestors,
                    diagnostics,
                )?;
                out.push_str(&merged);
            }
            None if best_effort => {
                diagnostics.push(Warning::MissingInclude {
                    path: target.to_string(),
                    included_from: display_relative(tree, current),
                });
            }
            None => {
                return Err(FlattenError::MissingFile {
                    path: PathBuf::from(target),
                    included_from: Some(current.to_path_buf()),
                });
            }
        }
    }

    out.push_str(&text[last..]);
    Ok(out)
}

/// Resolves an inclusion target to a file on disk.
///
/// The default `.tex` extension is appended only when the reference has no
/// extension at all. Candidates are tried relative to the including file's
/// directory first, then relative to the project root; both are bounded to
/// the tree, so a `../` escape resolves to nothing.
fn resolve_target(tree: &SourceTree, current: &Path, target: &str) -> Option<PathBuf> {
    if target.is_empty() || Path::new(target).is_absolute() {
        return None;
    }
    let mut reference = PathBuf::from(target);
    if reference.extension().is_none() {
        reference.set_extension("tex");
    }

    let sibling = current.parent().map(|dir| dir.join(&reference));
    let rooted = Some(tree.root().join(&reference));
    for candidate in [sibling, rooted].into_iter().flatten() {
        if let Some(resolved) = tree.normalize(&candidate) {
            if resolved.is_file() {
                return Some(resolved);
            }
        }
    }
    None
}

fn display_relative(tree: &SourceTree, path: &Path) -> String {
    tree.relative_path(path)
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;

    fn tree_with(files: &[(&str, &str)]) -> (TempDir, SourceTree) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let tree = SourceTree::open(dir.path()).unwrap();
        (dir, tree)
    }

    fn merge_main(tree: &SourceTree, best_effort: bool) -> Result<String, FlattenError> {
        let mut diagnostics = Diagnostics::new();
        merge_with(tree, best_effort, &mut diagnostics)
    }

    fn merge_with(
        tree: &SourceTree,
        best_effort: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<String, FlattenError> {
        let main = tree.main_document("main.tex").unwrap();
        merge(tree, &main, best_effort, diagnostics)
    }

    #[test]
    fn splices_input_in_place() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "before\n\\input{intro}\nafter\n"),
            ("intro.tex", "INTRO\n"),
        ]);
        let merged = merge_main(&tree, false).unwrap();
        assert_eq!(merged, "before\nINTRO\n\nafter\n");
    }

    #[test]
    fn include_form_is_spliced_too() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "\\include{chapter}"),
            ("chapter.tex", "CHAPTER"),
        ]);
        assert_eq!(merge_main(&tree, false).unwrap(), "CHAPTER");
    }

    #[test]
    fn expands_nested_inclusions_depth_first() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "\\input{a}\\input{c}"),
            ("a.tex", "A[\\input{b}]"),
            ("b.tex", "B"),
            ("c.tex", "C"),
        ]);
        assert_eq!(merge_main(&tree, false).unwrap(), "A[B]C");
    }

    #[test]
    fn no_directive_survives_in_merged_body() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "\\input{a}\n\\include{b}\n"),
            ("a.tex", "a \\input{b}"),
            ("b.tex", "b"),
        ]);
        let merged = merge_main(&tree, false).unwrap();
        assert!(!INCLUDE_DIRECTIVE.is_match(&merged));
    }

    #[test]
    fn resolves_relative_to_including_file_first() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "\\input{sections/a}"),
            ("sections/a.tex", "\\input{b}"),
            ("sections/b.tex", "SIBLING"),
            ("b.tex", "ROOTED"),
        ]);
        assert_eq!(merge_main(&tree, false).unwrap(), "SIBLING");
    }

    #[test]
    fn falls_back_to_project_root() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "\\input{sections/a}"),
            ("sections/a.tex", "\\input{shared}"),
            ("shared.tex", "SHARED"),
        ]);
        assert_eq!(merge_main(&tree, false).unwrap(), "SHARED");
    }

    #[test]
    fn appends_default_extension_only_without_one() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "\\input{notes.v2}"),
            ("notes.v2", "VERSIONED"),
        ]);
        assert_eq!(merge_main(&tree, false).unwrap(), "VERSIONED");
    }

    #[test]
    fn commented_out_inclusion_is_not_followed() {
        let (_dir, tree) = tree_with(&[("main.tex", "kept\n% \\input{missing}\n")]);
        let merged = merge_main(&tree, false).unwrap();
        assert_eq!(merged, "kept\n");
    }

    #[test]
    fn missing_file_is_fatal_by_default() {
        let (_dir, tree) = tree_with(&[("main.tex", "\\input{gone}")]);
        let err = merge_main(&tree, false).unwrap_err();
        match err {
            FlattenError::MissingFile { path, included_from } => {
                assert_eq!(path, Path::new("gone"));
                assert!(included_from.unwrap().ends_with("main.tex"));
            }
            other => panic!("expected MissingFile, got {other:?}"),
        }
    }

    #[test]
    fn best_effort_skips_missing_file_with_warning() {
        let (_dir, tree) = tree_with(&[("main.tex", "a\\input{gone}b")]);
        let mut diagnostics = Diagnostics::new();
        let merged = merge_with(&tree, true, &mut diagnostics).unwrap();
        assert_eq!(merged, "ab");
        assert_eq!(diagnostics.summary()["missing_include"], vec!["gone"]);
    }

    #[test]
    fn direct_self_inclusion_is_a_cycle() {
        let (_dir, tree) = tree_with(&[("main.tex", "\\input{main}")]);
        let err = merge_main(&tree, false).unwrap_err();
        assert!(matches!(err, FlattenError::CyclicInclusion { .. }));
    }

    #[test]
    fn mutual_inclusion_reports_the_chain() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "\\input{a}"),
            ("a.tex", "\\input{b}"),
            ("b.tex", "\\input{a}"),
        ]);
        let err = merge_main(&tree, false).unwrap_err();
        match err {
            FlattenError::CyclicInclusion { chain } => {
                let names: Vec<_> = chain
                    .iter()
                    .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                    .collect();
                assert_eq!(names, vec!["main.tex", "a.tex", "b.tex", "a.tex"]);
            }
            other => panic!("expected CyclicInclusion, got {other:?}"),
        }
    }

    #[test]
    fn cycle_error_does_not_loop_in_best_effort_mode() {
        let (_dir, tree) = tree_with(&[("main.tex", "\\input{main}")]);
        let err = merge_main(&tree, true).unwrap_err();
        assert!(matches!(err, FlattenError::CyclicInclusion { .. }));
    }

    #[test]
    fn escaping_reference_is_treated_as_missing() {
        let (_dir, tree) = tree_with(&[("main.tex", "\\input{../outside}")]);
        let err = merge_main(&tree, false).unwrap_err();
        assert!(matches!(err, FlattenError::MissingFile { .. }));
    }

    #[test]
    fn siblings_expand_left_to_right() {
        let (_dir, tree) = tree_with(&[
            ("main.tex", "\\input{one}\\input{two}"),
            ("one.tex", "1"),
            ("two.tex", "2"),
        ]);
        assert_eq!(merge_main(&tree, false).unwrap(), "12");
    }
}
