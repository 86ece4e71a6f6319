//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use clap::Parser;
use miette::{Diagnostic, GraphicalReportHandler};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;
use tsugite::{cli::Cli, error::GenError, manifest::ManifestError, runner};

fn main() -> ExitCode {
    let cli = Cli::parse().with_default_command();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::ERROR
    };
    fmt().with_max_level(max_level).with_writer(std::io::stderr).init();
    match runner::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %render(&err), "runner failed");
            ExitCode::FAILURE
        }
    }
}

/// Render known diagnostics with their source snippets and help; fall back to
/// the error chain otherwise.
fn render(err: &anyhow::Error) -> String {
    let diagnostic: Option<&dyn Diagnostic> = err
        .downcast_ref::<ManifestError>()
        .map(|d| d as &dyn Diagnostic)
        .or_else(|| err.downcast_ref::<runner::RunnerError>().map(|d| d as &dyn Diagnostic))
        .or_else(|| err.downcast_ref::<GenError>().map(|d| d as &dyn Diagnostic));
    let mut out = String::new();
    match diagnostic {
        Some(diag) if GraphicalReportHandler::new().render_report(&mut out, diag).is_ok() => out,
        _ => format!("{err:#}"),
    }
}
