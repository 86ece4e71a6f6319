//! Error types raised while lowering a target.
//!
//! Every failure is a configuration-time failure: nothing is retried and
//! partial output is left for the orchestrator to discard. Variants carry the
//! offending target name so the caller can report it without extra context.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros. The unused_assignments lint fires in some
// Rust versions but not others, so `#[expect]` cannot be used here.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

/// Broad classification of a [`GenError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The project or toolchain description cannot be lowered as written.
    Configuration,
    /// An output location could not be created or written.
    Resource,
    /// A property combination the generator cannot represent.
    Policy,
}

/// Errors produced by target generation.
#[derive(Debug, Error, Diagnostic)]
pub enum GenError {
    /// A language was requested that the target does not declare.
    #[error("target '{target}' does not declare language '{language}'")]
    #[diagnostic(
        code(tsugite::config::invalid_language),
        help("add the language to the target's `languages` list")
    )]
    InvalidLanguage {
        /// Target being generated.
        target: String,
        /// Requested language.
        language: String,
    },

    /// No toolchain entry exists for a language.
    #[error("target '{target}': no toolchain registered for language '{language}'")]
    #[diagnostic(code(tsugite::config::unknown_language))]
    UnknownLanguage {
        /// Target being generated.
        target: String,
        /// Unregistered language.
        language: String,
    },

    /// A source carries a language that maps to no compile rule.
    #[error("target '{target}': cannot resolve a compile rule for source '{source_path}'")]
    #[diagnostic(code(tsugite::config::unresolved_source_language))]
    UnresolvedSourceLanguage {
        /// Target being generated.
        target: String,
        /// Offending source file.
        source_path: Utf8PathBuf,
    },

    /// Two sources still map to the same object after suffixing.
    #[error("target '{target}': object path '{object}' for '{source_path}' collides")]
    #[diagnostic(
        code(tsugite::config::object_path_collision),
        help("rename one of the sources or move it into a distinct directory")
    )]
    ObjectPathCollision {
        /// Target being generated.
        target: String,
        /// Source whose object could not be placed.
        source_path: Utf8PathBuf,
        /// Object path that was already taken.
        object: Utf8PathBuf,
    },

    /// Two bundle resources resolve to the same destination file.
    #[error("target '{target}': bundle content '{destination}' is provided more than once")]
    #[diagnostic(code(tsugite::config::duplicate_bundle_content))]
    DuplicateBundleContent {
        /// Target being generated.
        target: String,
        /// Destination inside the bundle.
        destination: Utf8PathBuf,
    },

    /// A dependency names a target the project model does not know.
    #[error("target '{target}' depends on unknown target '{dependency}'")]
    #[diagnostic(code(tsugite::config::unknown_target))]
    UnknownTarget {
        /// Target being generated.
        target: String,
        /// Missing dependency.
        dependency: String,
    },

    /// A path cannot be expressed in the build description syntax.
    #[error("target '{target}': path '{path}' cannot be written to a build file")]
    #[diagnostic(code(tsugite::config::invalid_path))]
    InvalidPath {
        /// Target being generated.
        target: String,
        /// Offending path.
        path: String,
    },

    /// An output directory could not be created.
    #[error("target '{target}': failed to create directory '{path}'")]
    #[diagnostic(code(tsugite::resource::directory))]
    DirectoryCreation {
        /// Target being generated.
        target: String,
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A generated file could not be written.
    #[error("target '{target}': failed to write '{path}'")]
    #[diagnostic(code(tsugite::resource::write))]
    FileWrite {
        /// Target being generated.
        target: String,
        /// File that could not be written.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The output sink rejected an append.
    #[error("target '{target}': failed to append to the {stream} stream")]
    #[diagnostic(code(tsugite::resource::sink))]
    Sink {
        /// Target being generated.
        target: String,
        /// Stream name (`rules` or `build`).
        stream: &'static str,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Module ordering is required but no scan or collate command exists.
    #[error("target '{target}': language '{language}' needs dependency scanning but has no {missing} command")]
    #[diagnostic(
        code(tsugite::policy::dyndep_without_scan_rule),
        help("configure `scan_command` and `collate_command` for the language")
    )]
    DyndepWithoutScanRule {
        /// Target being generated.
        target: String,
        /// Language requiring scanning.
        language: String,
        /// Which command is missing.
        missing: &'static str,
    },

    /// The requested language standard has no flag in the toolchain.
    #[error("target '{target}': {language} standard '{standard}' is not supported by the toolchain")]
    #[diagnostic(code(tsugite::policy::unsupported_standard))]
    UnsupportedStandard {
        /// Target being generated.
        target: String,
        /// Language the standard applies to.
        language: String,
        /// Requested standard.
        standard: String,
    },

    /// A rule name was emitted twice with different content.
    #[error("target '{target}': rule '{rule}' was emitted twice with different content")]
    #[diagnostic(code(tsugite::policy::conflicting_rule))]
    ConflictingRule {
        /// Target being generated.
        target: String,
        /// Rule name.
        rule: String,
    },

    /// The toolchain has no command for the target's link step.
    #[error("target '{target}': no {kind} link command for language '{language}'")]
    #[diagnostic(code(tsugite::policy::missing_link_command))]
    MissingLinkCommand {
        /// Target being generated.
        target: String,
        /// Link language.
        language: String,
        /// Artifact kind being linked.
        kind: &'static str,
    },
}

impl GenError {
    /// Classify the error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidLanguage { .. }
            | Self::UnknownLanguage { .. }
            | Self::UnresolvedSourceLanguage { .. }
            | Self::ObjectPathCollision { .. }
            | Self::DuplicateBundleContent { .. }
            | Self::UnknownTarget { .. }
            | Self::InvalidPath { .. } => ErrorCategory::Configuration,
            Self::DirectoryCreation { .. } | Self::FileWrite { .. } | Self::Sink { .. } => {
                ErrorCategory::Resource
            }
            Self::DyndepWithoutScanRule { .. }
            | Self::UnsupportedStandard { .. }
            | Self::ConflictingRule { .. }
            | Self::MissingLinkCommand { .. } => ErrorCategory::Policy,
        }
    }

    /// Name of the target that failed.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::InvalidLanguage { target, .. }
            | Self::UnknownLanguage { target, .. }
            | Self::UnresolvedSourceLanguage { target, .. }
            | Self::ObjectPathCollision { target, .. }
            | Self::DuplicateBundleContent { target, .. }
            | Self::UnknownTarget { target, .. }
            | Self::InvalidPath { target, .. }
            | Self::DirectoryCreation { target, .. }
            | Self::FileWrite { target, .. }
            | Self::Sink { target, .. }
            | Self::DyndepWithoutScanRule { target, .. }
            | Self::UnsupportedStandard { target, .. }
            | Self::ConflictingRule { target, .. }
            | Self::MissingLinkCommand { target, .. } => target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        GenError::UnknownLanguage { target: "app".into(), language: "COBOL".into() },
        ErrorCategory::Configuration
    )]
    #[case(
        GenError::DirectoryCreation {
            target: "app".into(),
            path: "out".into(),
            source: io::Error::other("denied"),
        },
        ErrorCategory::Resource
    )]
    #[case(
        GenError::DyndepWithoutScanRule {
            target: "app".into(),
            language: "Fortran".into(),
            missing: "scan",
        },
        ErrorCategory::Policy
    )]
    fn errors_are_classified(#[case] err: GenError, #[case] expected: ErrorCategory) {
        assert_eq!(err.category(), expected);
        assert_eq!(err.target(), "app");
    }

    #[test]
    fn messages_name_the_target() {
        let err = GenError::InvalidLanguage {
            target: "lib".into(),
            language: "CXX".into(),
        };
        assert_eq!(err.to_string(), "target 'lib' does not declare language 'CXX'");
    }
}
