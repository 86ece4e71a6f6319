//! Intermediate representation of emitted rules and build statements.
//!
//! Generators build these values and hand them to a
//! [`NinjaSink`](crate::sink::NinjaSink); the textual form lives in
//! [`crate::ninja_gen`]. Keeping the values typed lets buffered sinks and
//! tests inspect what a target produced without parsing Ninja syntax.
//!
//! # Examples
//!
//! ```
//! use tsugite::ir::{BuildStatement, Rule};
//!
//! let rule = Rule::new("CXX_COMPILER__app", "c++ $FLAGS -o $out -c $in");
//! let stmt = BuildStatement::new(rule.name.clone())
//!     .with_output("app.dir/main.cpp.o")
//!     .with_input("/src/main.cpp")
//!     .with_variable("FLAGS", "-O2");
//! assert_eq!(stmt.variable("FLAGS"), Some("-O2"));
//! ```

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::Serialize;

/// Name of Ninja's built-in rule for aliases.
pub const PHONY: &str = "phony";

/// A reusable command template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Rule name referenced by build statements.
    pub name: String,
    /// Command template.
    pub command: String,
    /// Progress description.
    pub description: Option<String>,
    /// Depfile path pattern.
    pub depfile: Option<String>,
    /// Dependency format (`gcc` or `msvc`).
    pub deps: Option<String>,
    /// Prefix of include notes for `deps = msvc`.
    pub msvc_deps_prefix: Option<String>,
    /// Response file path pattern.
    pub rspfile: Option<String>,
    /// Response file content pattern.
    pub rspfile_content: Option<String>,
    /// Re-stat outputs after the command runs.
    pub restat: bool,
    /// Mark outputs as generator outputs.
    pub generator: bool,
}

impl Rule {
    /// A rule with only a command.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            ..Self::default()
        }
    }
}

/// One build edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStatement {
    /// Comment written above the edge.
    pub comment: Option<String>,
    /// Rule name, or [`PHONY`].
    pub rule: String,
    /// Outputs named by `$out`.
    pub outputs: Vec<Utf8PathBuf>,
    /// Outputs the rule also produces.
    pub implicit_outputs: Vec<Utf8PathBuf>,
    /// Inputs named by `$in`.
    pub inputs: Vec<Utf8PathBuf>,
    /// Inputs that trigger rebuilds without appearing in `$in`.
    pub implicit_inputs: Vec<Utf8PathBuf>,
    /// Inputs that must exist first but never trigger rebuilds.
    pub order_only: Vec<Utf8PathBuf>,
    /// Edge-scoped variable bindings, written in insertion order.
    pub variables: IndexMap<String, String>,
    /// Response file Ninja will write for this edge.
    pub response_file: Option<ResponseFile>,
}

impl BuildStatement {
    /// An edge using `rule`.
    #[must_use]
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            ..Self::default()
        }
    }

    /// A phony alias.
    #[must_use]
    pub fn phony(output: impl Into<Utf8PathBuf>) -> Self {
        Self::new(PHONY).with_output(output)
    }

    /// Append an explicit output.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    /// Append an explicit input.
    #[must_use]
    pub fn with_input(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    /// Bind an edge variable.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Value bound to `key`, if any.
    #[must_use]
    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Whether `path` appears among the order-only inputs.
    #[must_use]
    pub fn order_depends_on(&self, path: &str) -> bool {
        self.order_only.iter().any(|p| p.as_str() == path)
    }
}

/// Response file written by the executor from `rspfile_content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseFile {
    /// Build-root-relative path.
    pub path: Utf8PathBuf,
    /// Exact bytes the executor writes.
    pub content: String,
}
