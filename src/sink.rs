//! Output capabilities injected into target generation.
//!
//! A [`NinjaSink`] receives rules, build statements and compilation database
//! entries. A [`Workspace`] creates directories and writes side files such as
//! dependency information. Both are passed explicitly to every generation
//! pass; nothing writes to process-wide streams.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::debug;

use crate::compile_commands::CompileCommand;
use crate::ir::{BuildStatement, Rule};
use crate::ninja_gen::{render_build, render_comment, render_rule};

/// Append-only destination for generated build descriptions.
pub trait NinjaSink {
    /// Append a rule definition to the rules stream.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying stream rejects the write.
    fn write_rule(&mut self, rule: &Rule) -> io::Result<()>;

    /// Append a build statement to the build stream.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying stream rejects the write.
    fn write_build(&mut self, stmt: &BuildStatement) -> io::Result<()>;

    /// Append a comment block to the build stream.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying stream rejects the write.
    fn write_comment(&mut self, text: &str) -> io::Result<()>;

    /// Record a compilation database entry. Ignored by default.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry cannot be recorded.
    fn export_compile_command(&mut self, _command: CompileCommand) -> io::Result<()> {
        Ok(())
    }
}

/// Formats output as Ninja text into two writers.
#[derive(Debug)]
pub struct TextSink<R, B> {
    rules: R,
    build: B,
    compile_commands: Vec<CompileCommand>,
}

impl<R: Write, B: Write> TextSink<R, B> {
    /// Create a sink writing rules to `rules` and statements to `build`.
    pub const fn new(rules: R, build: B) -> Self {
        Self {
            rules,
            build,
            compile_commands: Vec::new(),
        }
    }

    /// Flush both writers and return them with the collected entries.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn finish(mut self) -> io::Result<(R, B, Vec<CompileCommand>)> {
        self.rules.flush()?;
        self.build.flush()?;
        Ok((self.rules, self.build, self.compile_commands))
    }
}

impl<R: Write, B: Write> NinjaSink for TextSink<R, B> {
    fn write_rule(&mut self, rule: &Rule) -> io::Result<()> {
        self.rules.write_all(render_rule(rule).as_bytes())
    }

    fn write_build(&mut self, stmt: &BuildStatement) -> io::Result<()> {
        self.build.write_all(render_build(stmt).as_bytes())
    }

    fn write_comment(&mut self, text: &str) -> io::Result<()> {
        self.build.write_all(render_comment(text).as_bytes())
    }

    fn export_compile_command(&mut self, command: CompileCommand) -> io::Result<()> {
        self.compile_commands.push(command);
        Ok(())
    }
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// A rule definition.
    Rule(Rule),
    /// A build statement.
    Build(BuildStatement),
    /// A comment block.
    Comment(String),
    /// A compilation database entry.
    CompileCommand(CompileCommand),
}

/// Records sink calls in order so they can be inspected or replayed.
///
/// Parallel generation gives each target its own buffer and drains them into
/// the real sink in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedSink {
    events: Vec<SinkEvent>,
}

impl BufferedSink {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded event in order.
    #[must_use]
    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    /// Recorded rules in order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.events.iter().filter_map(|event| match event {
            SinkEvent::Rule(rule) => Some(rule),
            _ => None,
        })
    }

    /// Recorded build statements in order.
    pub fn builds(&self) -> impl Iterator<Item = &BuildStatement> {
        self.events.iter().filter_map(|event| match event {
            SinkEvent::Build(stmt) => Some(stmt),
            _ => None,
        })
    }

    /// Recorded compilation database entries in order.
    pub fn compile_commands(&self) -> impl Iterator<Item = &CompileCommand> {
        self.events.iter().filter_map(|event| match event {
            SinkEvent::CompileCommand(cmd) => Some(cmd),
            _ => None,
        })
    }

    /// Replay every event into `sink`, leaving this buffer empty.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by `sink`.
    pub fn drain_into(&mut self, sink: &mut dyn NinjaSink) -> io::Result<()> {
        for event in self.events.drain(..) {
            match event {
                SinkEvent::Rule(rule) => sink.write_rule(&rule)?,
                SinkEvent::Build(stmt) => sink.write_build(&stmt)?,
                SinkEvent::Comment(text) => sink.write_comment(&text)?,
                SinkEvent::CompileCommand(cmd) => sink.export_compile_command(cmd)?,
            }
        }
        Ok(())
    }
}

impl NinjaSink for BufferedSink {
    fn write_rule(&mut self, rule: &Rule) -> io::Result<()> {
        self.events.push(SinkEvent::Rule(rule.clone()));
        Ok(())
    }

    fn write_build(&mut self, stmt: &BuildStatement) -> io::Result<()> {
        self.events.push(SinkEvent::Build(stmt.clone()));
        Ok(())
    }

    fn write_comment(&mut self, text: &str) -> io::Result<()> {
        self.events.push(SinkEvent::Comment(text.to_owned()));
        Ok(())
    }

    fn export_compile_command(&mut self, command: CompileCommand) -> io::Result<()> {
        self.events.push(SinkEvent::CompileCommand(command));
        Ok(())
    }
}

/// File system access available to a generation pass.
///
/// Paths are relative to the build root. Implementations must tolerate
/// concurrent calls from several target generators.
pub trait Workspace: Send + Sync {
    /// Create `path` and its parents. Existing directories are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    fn ensure_directory(&self, path: &Utf8Path) -> io::Result<()>;

    /// Write `contents` to `path` unless it already holds exactly those bytes.
    /// Returns whether the file was written.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or written.
    fn write_if_changed(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<bool>;
}

/// Workspace backed by a capability handle on the build root.
#[derive(Debug)]
pub struct DiskWorkspace {
    root: Dir,
}

impl DiskWorkspace {
    /// Open `build_root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or opened.
    pub fn open(build_root: &Utf8Path) -> io::Result<Self> {
        Dir::create_ambient_dir_all(build_root, ambient_authority())?;
        let root = Dir::open_ambient_dir(build_root, ambient_authority())?;
        Ok(Self { root })
    }

    /// Wrap an already opened directory.
    #[must_use]
    pub const fn from_dir(root: Dir) -> Self {
        Self { root }
    }
}

impl Workspace for DiskWorkspace {
    fn ensure_directory(&self, path: &Utf8Path) -> io::Result<()> {
        if path.as_str().is_empty() {
            return Ok(());
        }
        self.root.create_dir_all(path)
    }

    fn write_if_changed(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<bool> {
        match self.root.read(path) {
            Ok(existing) if existing == contents => {
                debug!("{path} is up to date");
                return Ok(false);
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }
        self.root.write(path, contents)?;
        Ok(true)
    }
}

/// In-memory workspace for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    directories: Mutex<BTreeSet<Utf8PathBuf>>,
    files: Mutex<BTreeMap<Utf8PathBuf, Vec<u8>>>,
}

impl MemoryWorkspace {
    /// An empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories created so far.
    #[must_use]
    pub fn directories(&self) -> Vec<Utf8PathBuf> {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Contents of `path`, if written.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(Utf8Path::new(path))
            .cloned()
    }

    /// Contents of `path` as text, if written and valid UTF-8.
    #[must_use]
    pub fn text(&self, path: &str) -> Option<String> {
        self.file(path).and_then(|bytes| String::from_utf8(bytes).ok())
    }
}

impl Workspace for MemoryWorkspace {
    fn ensure_directory(&self, path: &Utf8Path) -> io::Result<()> {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf());
        Ok(())
    }

    fn write_if_changed(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<bool> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if files.get(path).is_some_and(|existing| existing == contents) {
            return Ok(false);
        }
        files.insert(path.to_path_buf(), contents.to_vec());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn text_sink_splits_streams() {
        let mut sink = TextSink::new(Vec::new(), Vec::new());
        sink.write_rule(&Rule::new("r", "true")).expect("rule");
        sink.write_comment("Target app").expect("comment");
        sink.write_build(&BuildStatement::phony("all")).expect("build");
        let (rules, build, _) = sink.finish().expect("finish");
        assert_eq!(String::from_utf8(rules).expect("utf8"), "rule r\n  command = true\n\n");
        assert_eq!(
            String::from_utf8(build).expect("utf8"),
            "# Target app\nbuild all: phony\n\n"
        );
    }

    #[rstest]
    fn buffered_sink_replays_in_order() {
        let mut buffer = BufferedSink::new();
        buffer.write_build(&BuildStatement::phony("b")).expect("build");
        buffer.write_rule(&Rule::new("r", "true")).expect("rule");
        buffer.write_build(&BuildStatement::phony("a")).expect("build");
        let mut target = BufferedSink::new();
        buffer.drain_into(&mut target).expect("drain");
        assert!(buffer.events().is_empty());
        let outputs: Vec<_> = target
            .builds()
            .flat_map(|stmt| stmt.outputs.iter().map(|p| p.as_str().to_owned()))
            .collect();
        assert_eq!(outputs, ["b", "a"]);
        assert_eq!(target.rules().count(), 1);
    }

    #[rstest]
    fn memory_workspace_skips_identical_writes() {
        let workspace = MemoryWorkspace::new();
        let path = Utf8Path::new("app.dir/info.json");
        assert!(workspace.write_if_changed(path, b"{}").expect("write"));
        assert!(!workspace.write_if_changed(path, b"{}").expect("write"));
        assert!(workspace.write_if_changed(path, b"[]").expect("write"));
        assert_eq!(workspace.text("app.dir/info.json").as_deref(), Some("[]"));
    }

    #[rstest]
    fn disk_workspace_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 temp path");
        let workspace = DiskWorkspace::open(&root).expect("open");
        let dir = Utf8Path::new("app.dir/sub");
        workspace.ensure_directory(dir).expect("first");
        workspace.ensure_directory(dir).expect("second");
        let file = Utf8Path::new("app.dir/sub/x.json");
        assert!(workspace.write_if_changed(file, b"1").expect("write"));
        assert!(!workspace.write_if_changed(file, b"1").expect("rewrite"));
        assert_eq!(
            std::fs::read_to_string(root.join(file)).expect("read back"),
            "1"
        );
    }
}
