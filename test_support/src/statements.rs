//! Queries over recorded sink output.

use tsugite::ir::BuildStatement;
use tsugite::sink::BufferedSink;

/// Build statements whose rule name starts with `prefix`.
#[must_use]
pub fn with_rule_prefix<'a>(sink: &'a BufferedSink, prefix: &str) -> Vec<&'a BuildStatement> {
    sink.builds().filter(|b| b.rule.starts_with(prefix)).collect()
}

/// The build statement producing `output`.
///
/// # Panics
///
/// Panics when no statement lists `output` among its outputs.
#[must_use]
pub fn producing<'a>(sink: &'a BufferedSink, output: &str) -> &'a BuildStatement {
    sink.builds()
        .find(|b| b.outputs.iter().any(|o| o.as_str() == output))
        .unwrap_or_else(|| panic!("no statement produces {output}"))
}
