//! Resolved project model consumed by the target generators.
//!
//! The structures here describe one build target after the project layer has
//! expanded variables and evaluated conditions. They deserialise from the
//! `targets` section of a manifest, but generators only ever borrow them: a
//! target outlives the generation pass that lowers it.
//!
//! ```rust
//! use tsugite::model::{ArtifactKind, Language, SourceFile, Target};
//!
//! let target = Target::new("app", ArtifactKind::Executable)
//!     .with_language("CXX")
//!     .with_source(SourceFile::new("src/main.cpp"));
//! assert!(target.uses_language(&Language::from("CXX")));
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a compiler family's input language (`C`, `CXX`, `Fortran`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    /// Create a language identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Language {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of artifact a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// A runnable program.
    Executable,
    /// An archive of objects.
    StaticLibrary,
    /// A dynamically linked library.
    SharedLibrary,
    /// A loadable plugin that is never linked against.
    Module,
    /// A program packaged with its resources.
    Bundle,
    /// A target with no compiled outputs.
    Utility,
}

impl ArtifactKind {
    /// Whether sources of this kind are compiled into objects.
    #[must_use]
    pub const fn compiles_objects(self) -> bool {
        !matches!(self, Self::Utility)
    }

    /// Whether compiled objects should be position independent by default.
    #[must_use]
    pub const fn wants_position_independent_code(self) -> bool {
        matches!(self, Self::SharedLibrary | Self::Module)
    }

    /// Upper-case fragment used in rule names.
    #[must_use]
    pub const fn rule_fragment(self) -> &'static str {
        match self {
            Self::Executable => "EXECUTABLE",
            Self::StaticLibrary => "STATIC_LIBRARY",
            Self::SharedLibrary => "SHARED_LIBRARY",
            Self::Module => "MODULE",
            Self::Bundle => "BUNDLE",
            Self::Utility => "UTILITY",
        }
    }

    /// Human readable name used in diagnostics.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::StaticLibrary => "static library",
            Self::SharedLibrary => "shared library",
            Self::Module => "module",
            Self::Bundle => "bundle",
            Self::Utility => "utility",
        }
    }
}

/// When compile commands are deflected through a response file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFilePolicy {
    /// Use a response file only when the command exceeds the length limit.
    #[default]
    Auto,
    /// Always use a response file.
    Always,
    /// Never use a response file, even for over-long commands.
    Never,
}

/// An include search directory.
///
/// Accepts either a bare path or a mapping with a `system` flag:
///
/// ```yaml
/// include_directories:
///   - include
///   - { path: /opt/sdk/include, system: true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IncludeDirRepr")]
pub struct IncludeDir {
    /// Directory to search.
    pub path: Utf8PathBuf,
    /// Whether warnings from headers in this directory are suppressed.
    pub system: bool,
}

impl IncludeDir {
    /// A regular include directory.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            system: false,
        }
    }

    /// A system include directory.
    #[must_use]
    pub fn system(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            system: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IncludeDirRepr {
    Path(Utf8PathBuf),
    Full {
        path: Utf8PathBuf,
        #[serde(default)]
        system: bool,
    },
}

impl From<IncludeDirRepr> for IncludeDir {
    fn from(value: IncludeDirRepr) -> Self {
        match value {
            IncludeDirRepr::Path(path) => Self::new(path),
            IncludeDirRepr::Full { path, system } => Self { path, system },
        }
    }
}

/// One compilation unit or resource attached to a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SourceFileRepr")]
pub struct SourceFile {
    /// Path to the file, absolute or relative to the source root.
    pub path: Utf8PathBuf,
    /// Explicit language; inferred from the extension when absent.
    pub language: Option<Language>,
    /// Produced by a custom command rather than checked in.
    pub generated: bool,
    /// Never compiled even when the extension matches a language.
    pub header_only: bool,
    /// Folder inside the bundle content tree the file is placed in.
    pub bundle_location: Option<Utf8PathBuf>,
    /// Extra compile options for this file only.
    pub compile_options: Vec<String>,
    /// Extra preprocessor definitions for this file only.
    pub compile_definitions: Vec<String>,
    /// Extra include directories for this file only.
    pub include_directories: Vec<IncludeDir>,
    /// Files the object depends on beyond discovered headers.
    pub object_depends: Vec<Utf8PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceFileRepr {
    Path(Utf8PathBuf),
    Full(SourceFileFields),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceFileFields {
    path: Utf8PathBuf,
    #[serde(default)]
    language: Option<Language>,
    #[serde(default)]
    generated: bool,
    #[serde(default)]
    header_only: bool,
    #[serde(default)]
    bundle_location: Option<Utf8PathBuf>,
    #[serde(default)]
    compile_options: Vec<String>,
    #[serde(default)]
    compile_definitions: Vec<String>,
    #[serde(default)]
    include_directories: Vec<IncludeDir>,
    #[serde(default)]
    object_depends: Vec<Utf8PathBuf>,
}

impl From<SourceFileRepr> for SourceFile {
    fn from(value: SourceFileRepr) -> Self {
        match value {
            SourceFileRepr::Path(path) => Self::new(path),
            SourceFileRepr::Full(f) => Self {
                path: f.path,
                language: f.language,
                generated: f.generated,
                header_only: f.header_only,
                bundle_location: f.bundle_location,
                compile_options: f.compile_options,
                compile_definitions: f.compile_definitions,
                include_directories: f.include_directories,
                object_depends: f.object_depends,
            },
        }
    }
}

impl SourceFile {
    /// A source with no per-file overrides.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the language explicitly.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<Language>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Append a per-file definition.
    #[must_use]
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.compile_definitions.push(definition.into());
        self
    }

    /// Append a per-file compile option.
    #[must_use]
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.compile_options.push(option.into());
        self
    }

    /// Append a per-file include directory.
    #[must_use]
    pub fn with_include(mut self, include: IncludeDir) -> Self {
        self.include_directories.push(include);
        self
    }

    /// Mark the source as produced by a custom command.
    #[must_use]
    pub const fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    /// Mark the source as a header that is never compiled.
    #[must_use]
    pub const fn header_only(mut self) -> Self {
        self.header_only = true;
        self
    }

    /// Place the file in the bundle content tree.
    #[must_use]
    pub fn in_bundle(mut self, location: impl Into<Utf8PathBuf>) -> Self {
        self.bundle_location = Some(location.into());
        self
    }

    /// Borrow the path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// An input to a target's link step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkItem {
    /// The artifact of another target.
    Target(String),
    /// A library file on disk.
    File(Utf8PathBuf),
    /// A raw linker flag such as `-lm`.
    Flag(String),
}

/// Per-target property overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetProperties {
    /// Compile options applied to every language.
    pub compile_options: Vec<String>,
    /// Compile options keyed by language.
    pub language_flags: IndexMap<Language, Vec<String>>,
    /// Language standard keyed by language, for example `CXX: "17"`.
    pub standards: IndexMap<Language, String>,
    /// Feature flags keyed by language.
    pub features: IndexMap<Language, Vec<String>>,
    /// Preprocessor definitions.
    pub compile_definitions: Vec<String>,
    /// Include search directories.
    pub include_directories: Vec<IncludeDir>,
    /// Where the artifact is written, relative to the build root.
    pub output_directory: Option<Utf8PathBuf>,
    /// Ninja pool for compile statements.
    pub job_pool_compile: Option<String>,
    /// Ninja pool for the link statement.
    pub job_pool_link: Option<String>,
    /// Response file policy.
    pub response_file: ResponseFilePolicy,
    /// Force position independent code regardless of the artifact kind.
    pub position_independent: bool,
    /// Options passed to the link step.
    pub link_options: Vec<String>,
    /// Extra files the link step depends on.
    pub link_depends: Vec<Utf8PathBuf>,
    /// Language whose driver performs the link.
    pub link_language: Option<Language>,
}

/// A named build artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Unique target name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Languages the target compiles, in declaration order.
    #[serde(default)]
    pub languages: IndexSet<Language>,
    /// Source files in declaration order.
    #[serde(default)]
    pub sources: Vec<SourceFile>,
    /// Link inputs in the order the linker must see them.
    #[serde(default)]
    pub link_items: Vec<LinkItem>,
    /// Targets that must be built first without being linked.
    #[serde(default)]
    pub order_dependencies: Vec<String>,
    /// Property overrides.
    #[serde(default)]
    pub properties: TargetProperties,
}

impl Target {
    /// An empty target.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            name: name.into(),
            kind,
            languages: IndexSet::new(),
            sources: Vec::new(),
            link_items: Vec::new(),
            order_dependencies: Vec::new(),
            properties: TargetProperties::default(),
        }
    }

    /// Declare use of a language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<Language>) -> Self {
        self.languages.insert(language.into());
        self
    }

    /// Append a source file.
    #[must_use]
    pub fn with_source(mut self, source: SourceFile) -> Self {
        self.sources.push(source);
        self
    }

    /// Append a link item.
    #[must_use]
    pub fn with_link_item(mut self, item: LinkItem) -> Self {
        self.link_items.push(item);
        self
    }

    /// Whether the target declares `language`.
    #[must_use]
    pub fn uses_language(&self, language: &Language) -> bool {
        self.languages.contains(language)
    }

    /// Language used to drive the link step.
    #[must_use]
    pub fn link_language(&self) -> Option<&Language> {
        self.properties
            .link_language
            .as_ref()
            .or_else(|| self.languages.first())
    }
}

/// What the orchestrator knows about another target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    /// Target name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Build-root-relative artifact path, absent for utilities.
    pub artifact: Option<Utf8PathBuf>,
    /// Build-root-relative object directory.
    pub object_dir: Utf8PathBuf,
}

/// Resolves dependency target names to their generated outputs.
///
/// Lookups are shared between generators running on different threads.
pub trait TargetLookup: Sync {
    /// Look up a target by name.
    fn target_info(&self, name: &str) -> Option<TargetInfo>;
}

/// A lookup with no targets, for targets without dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTargets;

impl TargetLookup for NoTargets {
    fn target_info(&self, _name: &str) -> Option<TargetInfo> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn sources_accept_bare_paths_and_mappings() {
        let yaml = concat!(
            "- src/a.cpp\n",
            "- path: src/b.cpp\n",
            "  compile_definitions: [FOO=1]\n",
        );
        let sources: Vec<SourceFile> = serde_saphyr::from_str(yaml).expect("parse sources");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources.first().map(SourceFile::path), Some(Utf8Path::new("src/a.cpp")));
        assert_eq!(
            sources.get(1).map(|s| s.compile_definitions.clone()),
            Some(vec!["FOO=1".to_owned()])
        );
    }

    #[rstest]
    fn include_dirs_accept_system_flag() {
        let yaml = "- include\n- { path: /opt/sdk, system: true }\n";
        let dirs: Vec<IncludeDir> = serde_saphyr::from_str(yaml).expect("parse includes");
        assert_eq!(dirs, vec![IncludeDir::new("include"), IncludeDir::system("/opt/sdk")]);
    }

    #[rstest]
    fn link_language_defaults_to_first_language() {
        let target = Target::new("app", ArtifactKind::Executable)
            .with_language("C")
            .with_language("CXX");
        assert_eq!(target.link_language(), Some(&Language::from("C")));
    }

    #[rstest]
    #[case(ArtifactKind::SharedLibrary, true)]
    #[case(ArtifactKind::Module, true)]
    #[case(ArtifactKind::Executable, false)]
    #[case(ArtifactKind::StaticLibrary, false)]
    fn position_independent_defaults(#[case] kind: ArtifactKind, #[case] expected: bool) {
        assert_eq!(kind.wants_position_independent_code(), expected);
    }
}
