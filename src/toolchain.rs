//! Toolchain identity and per-language capabilities.
//!
//! The toolchain is configured once per generation run but queried per
//! target, so multi-toolchain builds can hand different targets different
//! [`Toolchain`] values. Command templates use Ninja variables (`$in`,
//! `$out`, `$FLAGS`, ...) plus two textual placeholders expanded when a rule
//! is built: `{compiler}` and `{dep_flags}`.

use camino::Utf8Path;
use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::config::Platform;
use crate::model::{ArtifactKind, Language};

/// Compiler family, which decides flag spelling and dependency tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerFamily {
    /// GNU compilers.
    #[default]
    Gnu,
    /// LLVM Clang.
    Clang,
    /// Apple's Clang distribution.
    AppleClang,
    /// Microsoft Visual C++.
    Msvc,
    /// Clang with the MSVC-compatible driver.
    ClangCl,
    /// Classic Intel compilers.
    Intel,
    /// LLVM-based Intel compilers.
    IntelLlvm,
    /// Anything else; gcc-style spelling without dependency files.
    Other,
}

impl CompilerFamily {
    /// Whether the family uses MSVC command line conventions.
    #[must_use]
    pub const fn is_msvc_like(self) -> bool {
        matches!(self, Self::Msvc | Self::ClangCl)
    }

    /// Dependency format the family produces natively.
    #[must_use]
    pub const fn native_depfile(self) -> DepfileFormat {
        match self {
            Self::Gnu | Self::Clang | Self::AppleClang | Self::Intel | Self::IntelLlvm => {
                DepfileFormat::Gcc
            }
            Self::Msvc | Self::ClangCl => DepfileFormat::Msvc,
            Self::Other => DepfileFormat::None,
        }
    }
}

/// How header dependencies are reported to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepfileFormat {
    /// A makefile-style dependency list written next to the object.
    Gcc,
    /// Include notes printed on the diagnostic stream.
    Msvc,
    /// No dependency information.
    None,
}

/// Link command templates by artifact kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkCommands {
    /// Executables and bundles.
    pub executable: Option<String>,
    /// Shared libraries.
    pub shared_library: Option<String>,
    /// Loadable modules.
    pub module: Option<String>,
    /// Static archives.
    pub static_library: Option<String>,
}

/// Capabilities and command spellings for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LanguageToolchain {
    /// Compiler executable.
    pub compiler: String,
    /// Compiler family.
    pub family: CompilerFamily,
    /// Compiler version, when known.
    pub version: Option<Version>,
    /// Source extensions (without dot) compiled as this language.
    pub extensions: Vec<String>,
    /// Object file extension override.
    pub object_extension: Option<String>,
    /// Base flags applied to every compile.
    pub flags: Vec<String>,
    /// Flag enabling position independent code.
    pub pic_flag: Option<String>,
    /// Flags selecting a language standard, keyed by standard name.
    pub standard_flags: IndexMap<String, String>,
    /// Prefix for preprocessor definitions.
    pub define_flag: Option<String>,
    /// Prefix for include directories.
    pub include_flag: Option<String>,
    /// Prefix for system include directories.
    pub system_include_flag: Option<String>,
    /// Option prefixes where only the highest-precedence occurrence is kept.
    pub exclusive_prefixes: Vec<String>,
    /// Dependency format override.
    pub depfile: Option<DepfileFormat>,
    /// Prefix of MSVC include notes in localized compilers.
    pub msvc_deps_prefix: Option<String>,
    /// Whether sources have inter-module ordering requirements.
    pub modules: Option<bool>,
    /// Whether preprocessing runs as a separate step.
    pub explicit_preprocessing: Option<bool>,
    /// Compile the original source even when preprocessing explicitly.
    pub compile_original_source: bool,
    /// Compile command template override.
    pub compile_command: Option<String>,
    /// Preprocess command template override.
    pub preprocess_command: Option<String>,
    /// Module dependency scan command template.
    pub scan_command: Option<String>,
    /// Command collating scan results into the dyndep file.
    pub collate_command: Option<String>,
    /// Flag prefix naming the module output directory.
    pub module_dir_flag: Option<String>,
    /// Link command templates.
    pub link: LinkCommands,
    /// Whether the compiler understands `@file` arguments.
    pub supports_response_files: Option<bool>,
}

/// MSVC release that introduced `/external:I`.
const MSVC_EXTERNAL_INCLUDE: Version = Version::new(19, 29, 0);

impl LanguageToolchain {
    /// A toolchain entry for `compiler` of the given family.
    #[must_use]
    pub fn new(compiler: impl Into<String>, family: CompilerFamily) -> Self {
        Self {
            compiler: compiler.into(),
            family,
            ..Self::default()
        }
    }

    /// Dependency format in effect.
    #[must_use]
    pub fn depfile_format(&self) -> DepfileFormat {
        self.depfile.unwrap_or_else(|| self.family.native_depfile())
    }

    /// Object extension in effect for `platform`.
    #[must_use]
    pub fn object_extension(&self, platform: Platform) -> &str {
        self.object_extension
            .as_deref()
            .unwrap_or_else(|| platform.object_extension())
    }

    /// Prefix for definitions.
    #[must_use]
    pub fn define_flag(&self) -> &str {
        self.define_flag.as_deref().unwrap_or(if self.family.is_msvc_like() {
            "/D"
        } else {
            "-D"
        })
    }

    /// Prefix for include directories.
    #[must_use]
    pub fn include_flag(&self) -> &str {
        self.include_flag.as_deref().unwrap_or(if self.family.is_msvc_like() {
            "/I"
        } else {
            "-I"
        })
    }

    /// Prefix for system include directories.
    ///
    /// Older MSVC releases have no external include switch and fall back to
    /// the regular include prefix.
    #[must_use]
    pub fn system_include_flag(&self) -> &str {
        if let Some(flag) = self.system_include_flag.as_deref() {
            return flag;
        }
        match self.family {
            CompilerFamily::Msvc => match &self.version {
                Some(v) if *v < MSVC_EXTERNAL_INCLUDE => self.include_flag(),
                _ => "/external:I",
            },
            CompilerFamily::ClangCl => "/imsvc",
            CompilerFamily::Other => self.include_flag(),
            _ => "-isystem ",
        }
    }

    /// Whether compiled sources need module dependency discovery.
    #[must_use]
    pub fn has_modules(&self, language: &Language) -> bool {
        self.modules
            .unwrap_or_else(|| language.as_str() == "Fortran")
    }

    /// Whether preprocessing must run as its own step.
    #[must_use]
    pub fn preprocesses_explicitly(&self, language: &Language) -> bool {
        self.explicit_preprocessing
            .unwrap_or_else(|| language.as_str() == "Fortran")
    }

    /// Whether command arguments may be deflected through `@file`.
    #[must_use]
    pub fn supports_response_files(&self) -> bool {
        self.supports_response_files.unwrap_or(true)
    }

    /// Compile command template, before placeholder expansion.
    #[must_use]
    pub fn compile_template(&self) -> &str {
        if let Some(cmd) = self.compile_command.as_deref() {
            return cmd;
        }
        if self.family.is_msvc_like() {
            "{compiler} /nologo $DEFINES $INCLUDES $FLAGS {dep_flags} /Fo$out /Fd$TARGET_COMPILE_PDB /FS /c $in"
        } else {
            "{compiler} $DEFINES $INCLUDES $FLAGS {dep_flags} -o $out -c $in"
        }
    }

    /// Preprocess command template, before placeholder expansion.
    #[must_use]
    pub fn preprocess_template(&self) -> &str {
        if let Some(cmd) = self.preprocess_command.as_deref() {
            return cmd;
        }
        if self.family.is_msvc_like() {
            "{compiler} /nologo $DEFINES $INCLUDES $FLAGS {dep_flags} /E $in > $PREPROCESSED_SOURCE"
        } else {
            "{compiler} $DEFINES $INCLUDES $FLAGS {dep_flags} -E $in -o $PREPROCESSED_SOURCE"
        }
    }

    /// Link command template for `kind`, before placeholder expansion.
    #[must_use]
    pub fn link_template(&self, kind: ArtifactKind, platform: Platform) -> Option<&str> {
        let configured = match kind {
            ArtifactKind::Executable | ArtifactKind::Bundle => self.link.executable.as_deref(),
            ArtifactKind::SharedLibrary => self.link.shared_library.as_deref(),
            ArtifactKind::Module => self.link.module.as_deref(),
            ArtifactKind::StaticLibrary => self.link.static_library.as_deref(),
            ArtifactKind::Utility => return None,
        };
        configured.or_else(|| default_link_template(self.family, kind, platform))
    }
}

fn default_link_template(
    family: CompilerFamily,
    kind: ArtifactKind,
    platform: Platform,
) -> Option<&'static str> {
    if matches!(family, CompilerFamily::Other) {
        return None;
    }
    let template = if family.is_msvc_like() {
        match kind {
            ArtifactKind::Executable | ArtifactKind::Bundle => {
                "link /nologo $in /out:$out $LINK_FLAGS $LINK_LIBRARIES"
            }
            ArtifactKind::SharedLibrary | ArtifactKind::Module => {
                "link /nologo /dll $in /out:$out $LINK_FLAGS $LINK_LIBRARIES"
            }
            ArtifactKind::StaticLibrary => "lib /nologo /out:$out $LINK_FLAGS $in",
            ArtifactKind::Utility => return None,
        }
    } else {
        match (kind, platform.is_apple()) {
            (ArtifactKind::Executable | ArtifactKind::Bundle, _) => {
                "{compiler} $FLAGS $LINK_FLAGS $in -o $out $LINK_LIBRARIES"
            }
            (ArtifactKind::SharedLibrary, true) => {
                "{compiler} $FLAGS -dynamiclib $LINK_FLAGS $in -o $out $LINK_LIBRARIES"
            }
            (ArtifactKind::Module, true) => {
                "{compiler} $FLAGS -bundle $LINK_FLAGS $in -o $out $LINK_LIBRARIES"
            }
            (ArtifactKind::SharedLibrary | ArtifactKind::Module, false) => {
                "{compiler} $FLAGS -shared $LINK_FLAGS $in -o $out $LINK_LIBRARIES"
            }
            (ArtifactKind::StaticLibrary, _) => {
                "rm -f $out && ar qc $out $LINK_FLAGS $in && ranlib $out"
            }
            (ArtifactKind::Utility, _) => return None,
        }
    };
    Some(template)
}

/// Toolchain identity for every language a run may compile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Toolchain {
    /// Per-language entries.
    pub languages: IndexMap<Language, LanguageToolchain>,
}

impl Toolchain {
    /// Register or replace a language entry.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<Language>, entry: LanguageToolchain) -> Self {
        self.languages.insert(language.into(), entry);
        self
    }

    /// Entry for `language`, if registered.
    #[must_use]
    pub fn get(&self, language: &Language) -> Option<&LanguageToolchain> {
        self.languages.get(language)
    }

    /// Infer a language from a file extension among `candidates`.
    ///
    /// Only languages the caller lists are considered so a `.c` file in a
    /// C++-only target is not silently compiled as C.
    #[must_use]
    pub fn infer_language<'a, I>(&self, path: &Utf8Path, candidates: I) -> Option<Language>
    where
        I: IntoIterator<Item = &'a Language>,
    {
        let ext = path.extension()?;
        candidates.into_iter().find_map(|lang| {
            let entry = self.languages.get(lang)?;
            entry
                .extensions
                .iter()
                .any(|e| e == ext)
                .then(|| lang.clone())
        })
    }
}
