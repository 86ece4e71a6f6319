//! Manifest parse failures as `miette` diagnostics.
//!
//! YAML syntax errors carry a span into the manifest text and an optional
//! hint; structural errors (unknown keys, wrong value types) carry the
//! manifest name and a hint where one applies.

// The unused_assignments lint fires on miette/thiserror derive output in some
// compiler releases only, so `#[expect]` cannot be used.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use thiserror::Error;

use super::hints::{DATA_HINTS, YAML_HINTS};

/// Boxed diagnostic produced by the mapping helpers.
pub type BoxedDiagnostic = Box<dyn Diagnostic + Send + Sync + 'static>;

/// Errors raised while loading a manifest.
#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    /// The manifest text could not be parsed into a project.
    #[error("failed to parse manifest '{name}'")]
    #[diagnostic(code(tsugite::manifest::parse))]
    Parse {
        /// Manifest label.
        name: String,
        /// Detailed diagnostic.
        #[source]
        #[diagnostic_source]
        source: BoxedDiagnostic,
    },

    /// Two targets share a name.
    #[error("manifest '{name}' defines target '{target}' more than once")]
    #[diagnostic(
        code(tsugite::manifest::duplicate_target),
        help("target names must be unique within a manifest")
    )]
    DuplicateTarget {
        /// Manifest label.
        name: String,
        /// Repeated target name.
        target: String,
    },
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(tsugite::manifest::yaml))]
struct YamlDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("parse error here")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    #[source]
    source: YamlError,
    message: String,
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(tsugite::manifest::structure))]
struct DataDiagnostic {
    #[help]
    help: Option<String>,
    #[source]
    source: serde_json::Error,
    message: String,
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Byte offset of a one-based line and column, clamped to the text.
fn byte_offset(src: &str, location: Location) -> usize {
    let line = to_usize(location.line().saturating_sub(1));
    let column = to_usize(location.column().saturating_sub(1));
    let mut start = 0;
    for (index, text) in src.split_inclusive('\n').enumerate() {
        if index == line {
            let body = text.trim_end_matches('\n');
            let within = body
                .char_indices()
                .nth(column)
                .map_or(body.len(), |(offset, _)| offset);
            return start + within;
        }
        start += text.len();
    }
    src.len()
}

/// A one-byte span at `location`, or the last byte of its line when the
/// location points past the end of the line.
fn span_at(src: &str, location: Location) -> SourceSpan {
    let at = byte_offset(src, location);
    let bytes = src.as_bytes();
    let points_at_text = bytes.get(at).is_some_and(|b| *b != b'\n');
    let start = if points_at_text {
        at
    } else {
        at.checked_sub(1)
            .filter(|prev| bytes.get(*prev).is_some_and(|b| *b != b'\n'))
            .unwrap_or(at)
    };
    let len = usize::from(points_at_text || start < at);
    SourceSpan::new(start.into(), len)
}

fn indented_with_tabs(src: &str, location: Option<Location>) -> bool {
    location
        .and_then(|loc| src.lines().nth(to_usize(loc.line().saturating_sub(1))))
        .is_some_and(|line| {
            line.chars()
                .take_while(|c| c.is_whitespace())
                .any(|c| c == '\t')
        })
}

fn find_hint(table: &[(&str, &str)], message: &str) -> Option<String> {
    let lower = message.to_lowercase();
    table
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, hint)| (*hint).to_owned())
}

/// Wrap a YAML syntax error with its location in `src`.
#[must_use]
pub fn map_yaml_error(err: YamlError, src: &str, name: &str) -> BoxedDiagnostic {
    let location = err.location();
    let (line, column) = location.map_or((1, 1), |loc| (loc.line(), loc.column()));
    let text = err.to_string();
    let help = if indented_with_tabs(src, location) {
        Some("Indent with spaces; YAML does not allow tabs.".to_owned())
    } else {
        find_hint(&YAML_HINTS, &text)
    };
    Box::new(YamlDiagnostic {
        src: NamedSource::new(name, src.to_owned()),
        span: location.map(|loc| span_at(src, loc)),
        help,
        source: err,
        message: format!("YAML parse error at line {line}, column {column}: {text}"),
    })
}

/// Wrap a structural error found while reading the parsed document.
#[must_use]
pub fn map_data_error(err: serde_json::Error, name: &str) -> BoxedDiagnostic {
    let message = format!("invalid project description in {name}: {err}");
    Box::new(DataDiagnostic {
        help: find_hint(&DATA_HINTS, &err.to_string()),
        source: err,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn tab_indentation_gets_a_hint() {
        let src = "\tkey: \"unterminated";
        let err = serde_saphyr::from_str::<serde_json::Value>(src).expect_err("tab indent");
        let diag = map_yaml_error(err, src, "project.yml");
        let help = diag.help().map(|h| h.to_string());
        assert_eq!(help.as_deref(), Some("Indent with spaces; YAML does not allow tabs."));
    }

    #[rstest]
    fn unknown_location_defaults_to_first_line() {
        let err = serde_saphyr::Error::Eof {
            location: serde_saphyr::Location::UNKNOWN,
        };
        let diag = map_yaml_error(err, "targets: [", "project.yml");
        assert!(diag.to_string().contains("line 1, column 1"), "{diag}");
    }

    #[rstest]
    fn unknown_fields_get_a_hint() {
        #[derive(Debug, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Strict {
            #[expect(dead_code, reason = "only the failure is inspected")]
            name: String,
        }
        let err = serde_json::from_value::<Strict>(serde_json::json!({"name": "a", "nmae": "b"}))
            .expect_err("unknown field");
        let diag = map_data_error(err, "project.yml");
        assert!(diag.to_string().contains("project.yml"));
        assert!(diag.help().is_some());
    }
}
