//! Output tree writing
//!
//! The pipeline itself never writes; this is the collaborator that takes a
//! successful [`Flattened`] result and lays out the clean project directory.
//! Nothing is touched on disk until the pipeline has returned, so a failed
//! run leaves no partial output behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::pipeline::{AssetFile, Flattened, OUTPUT_BIBLIOGRAPHY_STEM, OUTPUT_DOCUMENT};

/// Writes the flattened project into an output directory.
pub struct OutputWriter {
    dir: PathBuf,
}

/// What ended up on disk, for reporting.
#[derive(Debug, Default, Serialize)]
pub struct WriteSummary {
    pub document: PathBuf,
    pub bibliography: Option<PathBuf>,
    pub assets_copied: usize,
    pub styles_copied: usize,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the output directory, replacing a leftover one from an
    /// earlier run. Refuses to write into the source tree itself.
    pub fn prepare(&self, source_root: &Path) -> Result<()> {
        let source_root = source_root
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", source_root.display()))?;
        if self.dir == source_root || self.dir.canonicalize().ok() == Some(source_root.clone()) {
            bail!(
                "the output directory cannot be the input directory: {}",
                self.dir.display()
            );
        }
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).with_context(|| {
                format!("Failed to remove existing output: {}", self.dir.display())
            })?;
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;
        Ok(())
    }

    /// Writes the merged document, the filtered bibliography and every
    /// resolved asset and style file.
    ///
    /// `document` is passed separately from the manifest so the caller can
    /// hand in the reformatted text.
    pub fn write_bundle(&self, flattened: &Flattened, document: &str) -> Result<WriteSummary> {
        let mut summary = WriteSummary {
            document: self.write_text(OUTPUT_DOCUMENT, document)?,
            ..WriteSummary::default()
        };

        if let Some(bibliography) = &flattened.bibliography {
            let name = format!("{OUTPUT_BIBLIOGRAPHY_STEM}.bib");
            summary.bibliography = Some(self.write_text(&name, &bibliography.render())?);
        }

        for asset in &flattened.assets {
            self.copy_file(asset)?;
            summary.assets_copied += 1;
        }
        for style in &flattened.styles {
            self.copy_file(style)?;
            summary.styles_copied += 1;
        }

        Ok(summary)
    }

    fn write_text(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let mut text = content.to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        fs::write(&path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Copies one resolved file, preserving its relative structure.
    fn copy_file(&self, asset: &AssetFile) -> Result<()> {
        let destination = self.dir.join(&asset.relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::copy(&asset.absolute, &destination).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                asset.absolute.display(),
                destination.display()
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::pipeline::{flatten, PipelineOptions};
    use crate::project::SourceTree;

    fn flattened_project() -> (TempDir, Flattened) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("figs")).unwrap();
        fs::write(
            dir.path().join("main.tex"),
            "\\documentclass{article}\n\\cite{a}\n\\bibliography{refs}\n\\includegraphics{figs/plot}\n",
        )
        .unwrap();
        fs::write(dir.path().join("refs.bib"), "@article{a,\n title = {T},\n}\n").unwrap();
        fs::write(dir.path().join("figs/plot.pdf"), "pdf").unwrap();

        let tree = SourceTree::open(dir.path()).unwrap();
        let main = tree.main_document("main.tex").unwrap();
        let flattened = flatten(&tree, &main, &PipelineOptions::default()).unwrap();
        (dir, flattened)
    }

    #[test]
    fn refuses_output_equal_to_input() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path());
        assert!(writer.prepare(dir.path()).is_err());
    }

    #[test]
    fn replaces_an_existing_output_directory() {
        let source = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let stale = out.path().join("stale.txt");
        fs::write(&stale, "old").unwrap();

        let writer = OutputWriter::new(out.path());
        writer.prepare(source.path()).unwrap();
        assert!(!stale.exists());
        assert!(out.path().is_dir());
    }

    #[test]
    fn writes_document_bibliography_and_assets() {
        let (source, flattened) = flattened_project();
        let out = source.path().join("clean");
        let writer = OutputWriter::new(&out);
        writer.prepare(source.path()).unwrap();

        let summary = writer.write_bundle(&flattened, &flattened.document).unwrap();

        assert!(out.join("main.tex").is_file());
        assert!(out.join("main.bib").is_file());
        assert!(out.join("figs/plot.pdf").is_file());
        assert_eq!(summary.assets_copied, 1);

        let document = fs::read_to_string(out.join("main.tex")).unwrap();
        assert!(document.contains("\\bibliography{main}"));
        let bibliography = fs::read_to_string(out.join("main.bib")).unwrap();
        assert!(bibliography.contains("@article{a,"));
    }

    #[test]
    fn written_files_end_with_a_newline() {
        let (source, flattened) = flattened_project();
        let out = source.path().join("clean");
        let writer = OutputWriter::new(&out);
        writer.prepare(source.path()).unwrap();
        writer.write_bundle(&flattened, "no trailing newline").unwrap();

        let document = fs::read_to_string(out.join("main.tex")).unwrap();
        assert!(document.ends_with('\n'));
    }
}
