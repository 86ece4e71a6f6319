//! Help text keyed by fragments of parser error messages.

pub(crate) const YAML_HINTS: [(&str, &str); 4] = [
    (
        "did not find expected '-'",
        "Start list items with '-' at a consistent indentation.",
    ),
    (
        "mapping values are not allowed",
        "Quote values containing ':' or check for a stray colon.",
    ),
    (
        "found character that cannot start any token",
        "Remove the stray character; indentation must use spaces.",
    ),
    (
        "unknown escape character",
        "Use a valid YAML escape or single-quote the string.",
    ),
];

pub(crate) const DATA_HINTS: [(&str, &str); 4] = [
    (
        "unknown field",
        "Check the key's spelling; unknown keys are rejected.",
    ),
    (
        "unknown variant",
        "Artifact kinds are executable, static-library, shared-library, module, bundle and utility.",
    ),
    (
        "did not match any variant",
        "Sources and include directories are either a path or a mapping with a `path` key.",
    ),
    (
        "missing field",
        "Every target needs at least a `name` and a `kind`.",
    ),
];
