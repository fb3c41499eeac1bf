//! The `flatten` command: run the pipeline and write the output tree.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::json;

use super::output::Output;
use crate::pipeline::{self, format};
use crate::project::{Config, OutputWriter, SourceTree};

/// Resolved setup shared by `flatten` and `check`.
pub(crate) struct ProjectContext {
    pub tree: SourceTree,
    pub main: PathBuf,
    pub config: Config,
}

/// Locates the project root and loads its configuration.
///
/// When the main document is not under `input_dir`, the search walks upward
/// from the working directory, so the command works from anywhere inside the
/// project.
pub(crate) fn open_project(
    main_document: &str,
    input_dir: &str,
    best_effort: bool,
    output: &Output,
) -> Result<ProjectContext> {
    let input = PathBuf::from(input_dir);
    let root = if input.join(main_document).is_file() {
        input
    } else {
        output.verbose_ctx(
            "setup",
            &format!(
                "'{}' not found under {}, searching upward",
                main_document,
                input.display()
            ),
        );
        SourceTree::discover(Path::new("."), main_document).with_context(|| {
            format!("cannot find '{main_document}'; point --input-dir at the project root")
        })?
    };

    let tree = SourceTree::open(root)?;
    output.verbose_ctx("setup", &format!("project root: {}", tree.root().display()));

    let mut config = Config::load(tree.root())?;
    if best_effort {
        config.best_effort = true;
    }
    let main = tree.main_document(main_document)?;
    Ok(ProjectContext { tree, main, config })
}

pub fn run(
    output: &Output,
    main_document: &str,
    input_dir: &str,
    output_dir: Option<&str>,
    best_effort: bool,
    no_reformat: bool,
) -> Result<()> {
    let context = open_project(main_document, input_dir, best_effort, output)?;
    let reformat = context.config.reformat && !no_reformat;

    output.verbose_ctx("flatten", "running pipeline");
    let flattened =
        pipeline::flatten(&context.tree, &context.main, &context.config.pipeline_options())?;

    let document = if reformat {
        output.verbose_ctx("flatten", "reformatting merged document");
        format::beautify(&flattened.document)
    } else {
        flattened.document.clone()
    };

    let out_dir = match output_dir {
        Some(dir) => PathBuf::from(dir),
        None => default_output_dir(context.tree.root())?,
    };
    let writer = OutputWriter::new(&out_dir);
    writer.prepare(context.tree.root())?;
    let summary = writer.write_bundle(&flattened, &document)?;

    for warning in &flattened.diagnostics {
        output.warning(&warning.to_string());
    }

    output.success(&format!(
        "Flattened project written to {}",
        writer.dir().display()
    ));
    output.note(&format!(
        "  {} preamble entries kept, {} pruned",
        flattened.preamble.len(),
        flattened.pruned.len()
    ));
    if let Some(bibliography) = &flattened.bibliography {
        output.note(&format!(
            "  {} bibliography entries kept",
            bibliography.entries.len()
        ));
    }
    output.note(&format!(
        "  {} assets and {} class/style files copied",
        summary.assets_copied, summary.styles_copied
    ));

    output.data(&json!({
        "output_dir": writer.dir(),
        "document": summary.document,
        "bibliography": summary.bibliography,
        "assets_copied": summary.assets_copied,
        "styles_copied": summary.styles_copied,
        "preamble": flattened.preamble,
        "pruned": flattened.pruned,
        "warnings": flattened.diagnostics,
    }));

    Ok(())
}

/// Default output directory: a `_clean` sibling of the project root.
fn default_output_dir(root: &Path) -> Result<PathBuf> {
    let Some(name) = root.file_name() else {
        bail!("cannot derive an output directory next to {}; use --output-dir", root.display());
    };
    let mut dir_name = name.to_os_string();
    dir_name.push("_clean");
    Ok(root
        .parent()
        .unwrap_or(root)
        .join(dir_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_dir_is_a_clean_sibling() {
        let dir = default_output_dir(Path::new("/projects/paper")).unwrap();
        assert_eq!(dir, Path::new("/projects/paper_clean"));
    }
}
