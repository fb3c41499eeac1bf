//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{check, flatten};

#[derive(Parser)]
#[command(name = "texbundle")]
#[command(author, version, about = "Flatten a LaTeX project into a single self-contained file")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge the project and write the clean output tree
    Flatten {
        /// The main .tex file of the project (e.g. 'main.tex')
        main_document: String,

        /// Root directory of the LaTeX project
        #[arg(long, short = 'i', default_value = ".")]
        input_dir: String,

        /// Directory for the clean project (default: '<input>_clean')
        #[arg(long, short = 'o')]
        output_dir: Option<String>,

        /// Skip missing included files with a warning instead of failing
        #[arg(long)]
        best_effort: bool,

        /// Keep the merged document as-is instead of reflowing it
        #[arg(long)]
        no_reformat: bool,
    },

    /// Dry-run: report what would be kept, pruned and copied
    Check {
        /// The main .tex file of the project (e.g. 'main.tex')
        main_document: String,

        /// Root directory of the LaTeX project
        #[arg(long, short = 'i', default_value = ".")]
        input_dir: String,

        /// Skip missing included files with a warning instead of failing
        #[arg(long)]
        best_effort: bool,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);

    match cli.command {
        Commands::Flatten {
            main_document,
            input_dir,
            output_dir,
            best_effort,
            no_reformat,
        } => flatten::run(
            &output,
            &main_document,
            &input_dir,
            output_dir.as_deref(),
            best_effort,
            no_reformat,
        )?,

        Commands::Check {
            main_document,
            input_dir,
            best_effort,
        } => check::run(&output, &main_document, &input_dir, best_effort)?,
    }

    Ok(())
}
