//! The `check` command: dry-run the pipeline and report what it would do.

use anyhow::Result;
use serde_json::json;

use super::flatten::open_project;
use super::output::Output;
use crate::pipeline;

pub fn run(
    output: &Output,
    main_document: &str,
    input_dir: &str,
    best_effort: bool,
) -> Result<()> {
    let context = open_project(main_document, input_dir, best_effort, output)?;
    let flattened =
        pipeline::flatten(&context.tree, &context.main, &context.config.pipeline_options())?;

    if output.is_json() {
        output.data(&json!({
            "root": context.tree.root(),
            "preamble": flattened.preamble,
            "pruned": flattened.pruned,
            "bibliography": flattened.bibliography,
            "assets": flattened.assets,
            "styles": flattened.styles,
            "warnings": flattened.diagnostics,
        }));
        return Ok(());
    }

    output.note(&format!("Project root: {}", context.tree.root().display()));
    output.note("");

    output.note(&format!(
        "Preamble ({} kept, {} pruned):",
        flattened.preamble.len(),
        flattened.pruned.len()
    ));
    for declaration in &flattened.preamble {
        output.note(&format!("  keep  {:<8} {}", declaration.kind.as_str(), declaration.key));
    }
    for declaration in &flattened.pruned {
        output.note(&format!("  prune {:<8} {}", declaration.kind.as_str(), declaration.key));
    }

    match &flattened.bibliography {
        Some(bibliography) => {
            output.note("");
            output.note(&format!(
                "Bibliography ({} entries kept):",
                bibliography.entries.len()
            ));
            for entry in &bibliography.entries {
                let marker = if entry.recognized { "" } else { " (passthrough)" };
                output.note(&format!("  {} [{}]{}", entry.key, entry.entry_type, marker));
            }
        }
        None => {
            output.note("");
            output.note("Bibliography: none processed");
        }
    }

    output.note("");
    output.note(&format!("Assets ({}):", flattened.assets.len()));
    for asset in &flattened.assets {
        output.note(&format!("  {}", asset.relative.display()));
    }
    output.note(&format!("Class/style files ({}):", flattened.styles.len()));
    for style in &flattened.styles {
        output.note(&format!("  {}", style.relative.display()));
    }

    if !flattened.diagnostics.is_empty() {
        output.note("");
        for warning in &flattened.diagnostics {
            output.warning(&warning.to_string());
        }
    }

    Ok(())
}
