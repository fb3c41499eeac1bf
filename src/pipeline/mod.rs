//! The flatten pipeline
//!
//! Stages run strictly in sequence, each consuming the previous stage's
//! output: comment stripping and inclusion resolution produce the merged
//! body, declaration collection rebuilds the preamble, citation filtering
//! reduces the bibliography, asset resolution produces the copy list, and
//! assembly packages the result. Only inclusion resolution (and the
//! bibliography/class reads it implies) touches the source tree; nothing
//! here writes to disk.

pub mod assemble;
pub mod assets;
pub mod bib;
pub mod comments;
pub mod diagnostics;
pub mod format;
pub mod include;
pub mod preamble;
pub mod scan;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use assemble::Flattened;
pub use assets::AssetFile;
pub use bib::{BibEntry, FilteredBibliography};
pub use diagnostics::{Diagnostics, Warning};
pub use preamble::{DeclKind, Declaration, MacroPolicy};

/// File name of the merged document in the output tree.
pub const OUTPUT_DOCUMENT: &str = "main.tex";

/// Stem of the filtered bibliography database in the output tree.
pub const OUTPUT_BIBLIOGRAPHY_STEM: &str = "main";

/// Fatal pipeline errors. Anything recoverable goes through
/// [`Diagnostics`] instead.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// An inclusion or required file points at nothing.
    #[error("file not found: {}{}", .path.display(), origin(.included_from.as_deref()))]
    MissingFile {
        path: PathBuf,
        included_from: Option<PathBuf>,
    },

    /// An inclusion chain revisited an ancestor; the merged body would be
    /// unbounded.
    #[error("cyclic inclusion: {}", format_chain(.chain))]
    CyclicInclusion { chain: Vec<PathBuf> },

    /// A required file exists but could not be read.
    #[error("failed to read {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: io::Error,
    },
}

fn origin(included_from: Option<&Path>) -> String {
    match included_from {
        Some(path) => format!(" (included from {})", path.display()),
        None => String::new(),
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => path.display().to_string(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Policy knobs for a flatten run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Skip missing inclusion targets with a warning instead of failing.
    pub best_effort: bool,
    /// Tie-break for duplicate macro definitions.
    pub macro_policy: MacroPolicy,
    /// Prune package imports whose name never occurs in the body.
    pub prune_unused_packages: bool,
    /// Probe order for extensionless image references.
    pub image_extensions: Vec<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            best_effort: false,
            macro_policy: MacroPolicy::default(),
            prune_unused_packages: true,
            image_extensions: assets::IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl PipelineOptions {
    fn collector(&self) -> preamble::CollectorOptions {
        preamble::CollectorOptions {
            macro_policy: self.macro_policy,
            prune_unused_packages: self.prune_unused_packages,
        }
    }
}

/// Runs the whole pipeline on the document rooted at `main`.
///
/// `main` must be an absolute path inside `tree` (see
/// [`SourceTree::main_document`](crate::project::SourceTree::main_document)).
/// On success the returned [`Flattened`] carries the merged document, the
/// output manifest and all accumulated diagnostics; on a fatal error nothing
/// is produced.
pub fn flatten(
    tree: &crate::project::SourceTree,
    main: &Path,
    options: &PipelineOptions,
) -> Result<Flattened, FlattenError> {
    let mut diagnostics = Diagnostics::new();

    let merged = include::merge(tree, main, options.best_effort, &mut diagnostics)?;
    let collected = preamble::collect(&merged, &options.collector(), &mut diagnostics);
    let cited = bib::cited_keys(&collected.body);

    let bibliography_names = assets::bibliography_names(&collected.body);
    let mut bibliography = None;
    if !bibliography_names.is_empty() && !cited.is_empty() {
        if let Some(database_path) =
            assets::resolve_bibliography(&bibliography_names, tree, &mut diagnostics)
        {
            let database = tree.read(&database_path).map_err(|source| FlattenError::Read {
                path: database_path.clone(),
                source,
            })?;
            let filtered = bib::filter_bibliography(&database, &cited, &mut diagnostics);
            if !filtered.is_empty() {
                bibliography = Some(filtered);
            }
        }
    }

    let mut styles = Vec::new();
    let class_file = assets::document_class(&collected.body)
        .and_then(|name| assets::resolve_support_file(&name, "cls", tree, false, &mut diagnostics));
    if let Some(style_name) = assets::bibliography_style(&collected.body) {
        if let Some(bst) =
            assets::resolve_support_file(&style_name, "bst", tree, true, &mut diagnostics)
        {
            styles.push(bst);
        }
    }

    // Custom class files can pull in logos and the like; their image
    // references count too.
    let mut references = assets::image_references(&collected.body);
    if let Some(class_file) = &class_file {
        if let Ok(class_text) = tree.read(&class_file.absolute) {
            for reference in assets::image_references(&class_text) {
                if !references.contains(&reference) {
                    references.push(reference);
                }
            }
        }
    }
    let images =
        assets::resolve_images(&references, tree, &options.image_extensions, &mut diagnostics);
    if let Some(class_file) = class_file {
        styles.insert(0, class_file);
    }

    let mut document =
        assemble::insert_preamble(&collected.body, &collected.kept, &mut diagnostics);
    if bibliography.is_some() {
        document = assets::rewrite_bibliography(&document, OUTPUT_BIBLIOGRAPHY_STEM);
    }

    Ok(Flattened {
        document,
        preamble: collected.kept,
        pruned: collected.pruned,
        bibliography,
        assets: images,
        styles,
        diagnostics,
    })
}
