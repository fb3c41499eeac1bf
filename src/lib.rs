//! texbundle - flatten a LaTeX project into a single self-contained file
//!
//! Merges `\input`/`\include` trees, strips comments, deduplicates and
//! prunes preamble declarations, filters the bibliography down to cited
//! entries, and resolves the assets the document actually references. The
//! result is one clean `.tex` file plus the minimal set of files needed to
//! build it.

pub mod cli;
pub mod pipeline;
pub mod project;

pub use pipeline::{flatten, Diagnostics, FlattenError, Flattened, PipelineOptions, Warning};
pub use project::{Config, OutputWriter, SourceTree};
