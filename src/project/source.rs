//! Source tree access
//!
//! A [`SourceTree`] is the handle to the LaTeX project being flattened. All
//! path resolution funnels through it so that no reference — inclusion,
//! image, style file — can reach outside the project root.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("main document '{name}' not found in '{root}'")]
    MainDocumentNotFound { name: String, root: PathBuf },
}

/// The root directory of a LaTeX project.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    /// Opens the project rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root: PathBuf = root.into();
        if !root.is_dir() {
            return Err(SourceError::RootNotFound(root).into());
        }
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve input directory: {}", root.display()))?;
        Ok(Self { root })
    }

    /// Searches upward from `start` for a directory containing `main_doc`.
    ///
    /// Used when the main document is not found directly under the given
    /// input directory, so `texbundle flatten main.tex` works from anywhere
    /// inside the project.
    pub fn discover(start: &Path, main_doc: &str) -> Option<PathBuf> {
        let mut current = start.canonicalize().ok()?;
        loop {
            if current.join(main_doc).is_file() {
                return Some(current);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns the project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the main document by name, failing if it is not in the tree.
    pub fn main_document(&self, name: &str) -> Result<PathBuf, SourceError> {
        let path = self.root.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(SourceError::MainDocumentNotFound {
                name: name.to_string(),
                root: self.root.clone(),
            })
        }
    }

    /// Reads a file from the tree.
    pub fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    /// Lexically normalizes `path` (which may contain `.`/`..` components)
    /// and returns it only if it stays inside the project root.
    ///
    /// The check is lexical on purpose: the candidate file may not exist yet
    /// when this runs, and symlinked projects are the owner's business.
    pub fn normalize(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    // Popping past the root would escape it.
                    parts.pop()?;
                }
                Component::Normal(part) => parts.push(part),
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        let mut resolved = self.root.clone();
        resolved.extend(parts);
        Some(resolved)
    }

    /// Resolves a reference string relative to the root, bounded to the tree.
    pub fn join_checked(&self, reference: &str) -> Option<PathBuf> {
        let candidate = Path::new(reference);
        if candidate.is_absolute() {
            return None;
        }
        self.normalize(&self.root.join(candidate))
    }

    /// Returns `path` relative to the project root, when it is inside it.
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }

    /// Checks whether `path` is inside the tree.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}
