//! Ninja text rendering.
//!
//! This module turns [`Rule`] and [`BuildStatement`] values into the textual
//! representation expected by the Ninja build system. Paths on build lines
//! are escaped with [`escape_path`]; variable values are written verbatim
//! because generators escape them when they are composed.

use crate::ir::{BuildStatement, Rule};
use camino::Utf8PathBuf;
use itertools::Itertools;
use std::fmt::{self, Display, Formatter};

macro_rules! write_kv {
    ($f:expr, $key:expr, $opt:expr) => {
        if let Some(val) = $opt {
            writeln!($f, "  {} = {}", $key, val)?;
        }
    };
}

macro_rules! write_flag {
    ($f:expr, $key:expr, $cond:expr) => {
        if $cond {
            writeln!($f, "  {} = 1", $key)?;
        }
    };
}

/// Escape a path for a build line.
///
/// Dollar signs, spaces and colons are significant in build statements and
/// are prefixed with `$`.
///
/// ```
/// use tsugite::ninja_gen::escape_path;
/// assert_eq!(escape_path("C:/My Files/$x"), "C$:/My$ Files/$$x");
/// ```
#[must_use]
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, '$' | ' ' | ':') {
            out.push('$');
        }
        out.push(ch);
    }
    out
}

/// Escape a variable value so it evaluates back to `value`.
///
/// ```
/// use tsugite::ninja_gen::escape_value;
/// assert_eq!(escape_value("-DPRICE=$5"), "-DPRICE=$$5");
/// ```
#[must_use]
pub fn escape_value(value: &str) -> String {
    value.replace('$', "$$")
}

/// Whether `path` can appear in a build file at all.
#[must_use]
pub fn is_representable(path: &str) -> bool {
    !path.contains(['\n', '\r'])
}

/// Evaluate `$name` and `${name}` references in `text` the way the
/// executor would, using `lookup` for variable values.
///
/// Unknown variables evaluate to the empty string and `$$` to `$`.
///
/// ```
/// use tsugite::ninja_gen::evaluate;
/// let text = evaluate("cc $FLAGS -o $out $$HOME", |name| match name {
///     "FLAGS" => Some("-O2".to_owned()),
///     "out" => Some("a.o".to_owned()),
///     _ => None,
/// });
/// assert_eq!(text, "cc -O2 -o a.o $HOME");
/// ```
#[must_use]
pub fn evaluate<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some(next @ ('$' | ' ' | ':')) => {
                out.push(next);
                chars.next();
            }
            Some('{') => {
                chars.next();
                let name: String = chars.by_ref().take_while(|c| *c != '}').collect();
                out.push_str(&lookup(&name).unwrap_or_default());
            }
            _ => {
                let mut name = String::new();
                while let Some(c) = chars.next_if(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-')) {
                    name.push(c);
                }
                out.push_str(&lookup(&name).unwrap_or_default());
            }
        }
    }
    out
}

/// Render a rule block.
#[must_use]
pub fn render_rule(rule: &Rule) -> String {
    DisplayRule(rule).to_string()
}

/// Render a build statement.
#[must_use]
pub fn render_build(stmt: &BuildStatement) -> String {
    DisplayEdge(stmt).to_string()
}

/// Render a comment block, one `#` line per input line.
#[must_use]
pub fn render_comment(text: &str) -> String {
    text.lines().map(|line| format!("# {line}\n")).collect()
}

/// Render a `default` line naming `targets`.
///
/// ```
/// use tsugite::ninja_gen::render_default;
/// assert_eq!(render_default(&["all".into()]), "default all\n");
/// ```
#[must_use]
pub fn render_default(targets: &[Utf8PathBuf]) -> String {
    format!("default {}\n", join(targets))
}

/// Convert a slice of paths into a space-separated, escaped string.
fn join(paths: &[Utf8PathBuf]) -> String {
    paths.iter().map(|p| escape_path(p.as_str())).join(" ")
}

/// Wrapper struct to display a rule.
struct DisplayRule<'a>(&'a Rule);

impl Display for DisplayRule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rule = self.0;
        writeln!(f, "rule {}", rule.name)?;
        writeln!(f, "  command = {}", rule.command)?;
        write_kv!(f, "description", &rule.description);
        write_kv!(f, "depfile", &rule.depfile);
        write_kv!(f, "deps", &rule.deps);
        write_kv!(f, "msvc_deps_prefix", &rule.msvc_deps_prefix);
        write_kv!(f, "rspfile", &rule.rspfile);
        write_kv!(f, "rspfile_content", &rule.rspfile_content);
        write_flag!(f, "restat", rule.restat);
        write_flag!(f, "generator", rule.generator);
        writeln!(f)
    }
}

/// Wrapper struct to display a build edge.
struct DisplayEdge<'a>(&'a BuildStatement);

impl Display for DisplayEdge<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let edge = self.0;
        if let Some(comment) = &edge.comment {
            f.write_str(&render_comment(comment))?;
        }
        write!(f, "build {}", join(&edge.outputs))?;
        if !edge.implicit_outputs.is_empty() {
            write!(f, " | {}", join(&edge.implicit_outputs))?;
        }
        write!(f, ": {}", edge.rule)?;
        if !edge.inputs.is_empty() {
            write!(f, " {}", join(&edge.inputs))?;
        }
        if !edge.implicit_inputs.is_empty() {
            write!(f, " | {}", join(&edge.implicit_inputs))?;
        }
        if !edge.order_only.is_empty() {
            write!(f, " || {}", join(&edge.order_only))?;
        }
        writeln!(f)?;
        for (key, value) in &edge.variables {
            writeln!(f, "  {key} = {value}")?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn renders_compile_rule() {
        let rule = Rule {
            description: Some("Building CXX object $out".into()),
            depfile: Some("$DEP_FILE".into()),
            deps: Some("gcc".into()),
            ..Rule::new("CXX_COMPILER__app", "c++ $FLAGS -o $out -c $in")
        };
        let expected = concat!(
            "rule CXX_COMPILER__app\n",
            "  command = c++ $FLAGS -o $out -c $in\n",
            "  description = Building CXX object $out\n",
            "  depfile = $DEP_FILE\n",
            "  deps = gcc\n\n",
        );
        assert_eq!(render_rule(&rule), expected);
    }

    #[rstest]
    fn renders_edge_with_every_input_kind() {
        let mut stmt = BuildStatement::new("cc")
            .with_output("out dir/a.o")
            .with_input("a.c")
            .with_variable("FLAGS", "-O2");
        stmt.implicit_outputs.push("a.o.ddi".into());
        stmt.implicit_inputs.push("gen.h".into());
        stmt.order_only.push("stamp".into());
        stmt.comment = Some("Object a.c".into());
        let expected = concat!(
            "# Object a.c\n",
            "build out$ dir/a.o | a.o.ddi: cc a.c | gen.h || stamp\n",
            "  FLAGS = -O2\n\n",
        );
        assert_eq!(render_build(&stmt), expected);
    }

    #[rstest]
    fn renders_phony_without_inputs() {
        let stmt = BuildStatement::phony("all");
        assert_eq!(render_build(&stmt), "build all: phony\n\n");
    }

    #[rstest]
    #[case("plain/path.c", "plain/path.c")]
    #[case("with space.c", "with$ space.c")]
    #[case("C:/x.c", "C$:/x.c")]
    #[case("$weird", "$$weird")]
    fn escapes_build_line_paths(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(escape_path(raw), expected);
    }

    #[rstest]
    fn evaluation_inverts_escaping() {
        let escaped = escape_path("/a b/$c:d");
        assert_eq!(evaluate(&escaped, |_| None), "/a b/$c:d");
        assert_eq!(evaluate("${x}y", |n| (n == "x").then(|| "1".to_owned())), "1y");
    }

    #[rstest]
    fn rejects_newlines() {
        assert!(!is_representable("a\nb"));
        assert!(is_representable("a b"));
    }
}
