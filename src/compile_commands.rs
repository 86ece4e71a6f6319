//! Compilation database entries.
//!
//! Every object statement can also be described as a `compile_commands.json`
//! entry so editors and analysis tools see the same command the executor
//! runs. Entries carry both the flat command string and its argument vector.

use camino::Utf8PathBuf;
use serde::Serialize;

/// One compilation database entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileCommand {
    /// Directory the command runs in.
    pub directory: Utf8PathBuf,
    /// Source file being compiled.
    pub file: Utf8PathBuf,
    /// Object file produced.
    pub output: Utf8PathBuf,
    /// Full command line.
    pub command: String,
    /// The command split into arguments.
    pub arguments: Vec<String>,
}

impl CompileCommand {
    /// Build an entry, splitting `command` with POSIX shell rules.
    ///
    /// ```
    /// use tsugite::compile_commands::CompileCommand;
    ///
    /// let entry = CompileCommand::new("/b", "/s/a.c", "a.o", "cc '-DMSG=a b' -c /s/a.c");
    /// assert_eq!(entry.arguments, ["cc", "-DMSG=a b", "-c", "/s/a.c"]);
    /// ```
    #[must_use]
    pub fn new(
        directory: impl Into<Utf8PathBuf>,
        file: impl Into<Utf8PathBuf>,
        output: impl Into<Utf8PathBuf>,
        command: impl Into<String>,
    ) -> Self {
        let command = command.into();
        let arguments = shlex::split(&command)
            .unwrap_or_else(|| command.split_whitespace().map(str::to_owned).collect());
        Self {
            directory: directory.into(),
            file: file.into(),
            output: output.into(),
            command,
            arguments,
        }
    }
}

/// Render entries as a JSON array ordered by output path.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn to_json(mut commands: Vec<CompileCommand>) -> serde_json::Result<String> {
    commands.sort_by(|a, b| a.output.cmp(&b.output));
    let mut text = serde_json::to_string_pretty(&commands)?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn entries_are_sorted_by_output() {
        let commands = vec![
            CompileCommand::new("/b", "/s/z.c", "z.o", "cc -c /s/z.c"),
            CompileCommand::new("/b", "/s/a.c", "a.o", "cc -c /s/a.c"),
        ];
        let json = to_json(commands).expect("serialise");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");
        let outputs: Vec<&str> = parsed
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|entry| entry.get("output").and_then(serde_json::Value::as_str))
            .collect();
        assert_eq!(outputs, ["a.o", "z.o"]);
    }

    #[rstest]
    fn keys_keep_declaration_order() {
        let json = to_json(vec![CompileCommand::new("/b", "a.c", "a.o", "cc")]).expect("json");
        let directory = json.find("\"directory\"").expect("directory key");
        let arguments = json.find("\"arguments\"").expect("arguments key");
        assert!(directory < arguments);
    }
}
