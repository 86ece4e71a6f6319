//! Error types for the runner module.
//!
//! Kept apart from the dispatch logic so the lint suppression needed by the
//! derive macros stays narrow.

// The unused_assignments lint fires on miette/thiserror derive output in some
// compiler releases only, so `#[expect]` cannot be used.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The manifest file does not exist at the expected path.
    #[error("no manifest found at {path}")]
    #[diagnostic(
        code(tsugite::runner::manifest_not_found),
        help("create {manifest_name} in {directory} or pass its location with --file")
    )]
    ManifestNotFound {
        /// File name of the expected manifest.
        manifest_name: String,
        /// Directory that was searched.
        directory: String,
        /// Path that was attempted.
        path: Utf8PathBuf,
    },

    /// A path given on the command line is not valid UTF-8.
    #[error("path {path} is not valid UTF-8")]
    #[diagnostic(code(tsugite::runner::non_utf8_path))]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// A requested target is not defined by the manifest.
    #[error("manifest does not define target '{name}'")]
    #[diagnostic(
        code(tsugite::runner::unknown_target),
        help("available targets: {available}")
    )]
    UnknownTarget {
        /// Requested name.
        name: String,
        /// Comma separated names the manifest defines.
        available: String,
    },
}
