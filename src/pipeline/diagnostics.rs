//! Non-fatal diagnostics collected during a flatten run
//!
//! Fatal conditions abort the pipeline through
//! [`FlattenError`](super::FlattenError); everything the pipeline chooses to
//! drop or skip instead of failing on is recorded here and returned with the
//! manifest, so callers can display (or assert on) exactly what was omitted.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// A single recoverable condition encountered by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An inclusion target was missing and best-effort mode skipped it.
    #[error("included file not found: {path} (included from {included_from})")]
    MissingInclude { path: String, included_from: String },

    /// An asset reference matched no file, even after extension probing.
    #[error("asset not found: {path}")]
    UnresolvedAsset { path: String },

    /// An asset reference would resolve outside the project root.
    #[error("asset path escapes the project root: {path}")]
    AssetOutsideRoot { path: String },

    /// A declaration-like directive could not be parsed; it was left in the
    /// body untouched.
    #[error("unrecognized {declaration} declaration left in place: {snippet}")]
    MalformedDeclaration { declaration: String, snippet: String },

    /// A key was cited in the body but absent from the bibliography database.
    #[error("cited key not found in the bibliography: {key}")]
    UnknownCitation { key: String },

    /// No bibliography database file matched the `\bibliography` directive.
    #[error("bibliography database not found: {name}")]
    MissingBibliography { name: String },

    /// A referenced `.bst` (or similar) style file was not in the source tree.
    #[error("style file not found: {name}")]
    MissingStyleFile { name: String },

    /// The merged document has no `\documentclass`; the preamble block was
    /// placed at the top of the document instead.
    #[error("no \\documentclass found; preamble placed at the top of the document")]
    NoDocumentClass,
}

impl Warning {
    /// Stable machine-readable name of the warning kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Warning::MissingInclude { .. } => "missing_include",
            Warning::UnresolvedAsset { .. } => "unresolved_asset",
            Warning::AssetOutsideRoot { .. } => "asset_outside_root",
            Warning::MalformedDeclaration { .. } => "malformed_declaration",
            Warning::UnknownCitation { .. } => "unknown_citation",
            Warning::MissingBibliography { .. } => "missing_bibliography",
            Warning::MissingStyleFile { .. } => "missing_style_file",
            Warning::NoDocumentClass => "no_document_class",
        }
    }

    /// The identifier (path, key, name) this warning is about, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Warning::MissingInclude { path, .. } => Some(path),
            Warning::UnresolvedAsset { path } => Some(path),
            Warning::AssetOutsideRoot { path } => Some(path),
            Warning::MalformedDeclaration { snippet, .. } => Some(snippet),
            Warning::UnknownCitation { key } => Some(key),
            Warning::MissingBibliography { name } => Some(name),
            Warning::MissingStyleFile { name } => Some(name),
            Warning::NoDocumentClass => None,
        }
    }
}

/// Ordered collection of [`Warning`]s produced by one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }

    /// Groups the affected identifiers by warning kind.
    ///
    /// Tests and callers use this to assert on what was dropped rather than
    /// inferring it from absence in the output.
    pub fn summary(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for warning in &self.warnings {
            let entry = map.entry(warning.kind()).or_default();
            if let Some(id) = warning.identifier() {
                entry.push(id.to_string());
            }
        }
        map
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Warning;
    type IntoIter = std::slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.warnings.iter()
    }
}
