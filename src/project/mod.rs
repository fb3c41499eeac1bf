//! Filesystem collaborators
//!
//! Everything that touches disk around the pipeline: the source tree being
//! read, the output tree being written, and configuration. The pipeline only
//! ever reads through [`SourceTree`]; all writing goes through
//! [`OutputWriter`] after a run has succeeded.

mod config;
mod source;
mod writer;

pub use config::{Config, PROJECT_CONFIG};
pub use source::{SourceError, SourceTree};
pub use writer::{OutputWriter, WriteSummary};
