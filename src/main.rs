//! texbundle - flatten LaTeX projects for submission and archival

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = texbundle_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
