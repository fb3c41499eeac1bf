//! Output formatting for CLI commands

use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output helper shared by all commands.
///
/// Text mode prints human-readable lines; JSON mode expects each command to
/// emit exactly one machine-readable report via [`Output::data`]. Warnings
/// and verbose lines go to stderr so stdout stays parseable.
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Prints a plain informational line (text mode only).
    pub fn note(&self, message: &str) {
        if self.format == OutputFormat::Text {
            println!("{}", message);
        }
    }

    /// Prints a success message (text mode only; JSON reports carry their
    /// own status).
    pub fn success(&self, message: &str) {
        self.note(message);
    }

    /// Prints a pipeline warning on stderr (text mode only).
    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Text {
            eprintln!("warning: {}", message);
        }
    }

    /// Emits a command's machine-readable report (JSON mode only).
    pub fn data<T: Serialize>(&self, data: &T) {
        if self.format == OutputFormat::Json {
            match serde_json::to_string_pretty(data) {
                Ok(json) => println!("{}", json),
                Err(error) => eprintln!("error: failed to serialize report: {}", error),
            }
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Prints a verbose debug message (only when --verbose is set).
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Prints a verbose debug message with context (only when --verbose is set).
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}
