//! Compile flag, definition and include composition.
//!
//! Flags are assembled from four layers, lowest precedence first:
//!
//! 1. toolchain base flags and the position independent code flag,
//! 2. target compile options and per-language flags,
//! 3. the language standard flag, language features and the module
//!    directory flag,
//! 4. per-source compile options.
//!
//! Layers are concatenated. Options matching one of the toolchain's
//! exclusive prefixes keep only their highest-precedence occurrence.
//! Definitions and include directories are additive: target entries come
//! first, then source entries, and duplicates are preserved.
//!
//! The `compose_*` functions return text ready for a build statement
//! variable. The `*_words` functions return the unescaped command words used
//! for response files and compilation databases.

use camino::Utf8Path;
use itertools::Itertools;

use crate::config::Platform;
use crate::error::GenError;
use crate::model::{IncludeDir, Language, SourceFile, Target};
use crate::ninja_gen::{escape_path, escape_value};
use crate::path::{PathResolver, shell_word};
use crate::toolchain::{LanguageToolchain, Toolchain};

/// Computes compiler invocation fragments for the sources of one target.
#[derive(Debug, Clone, Copy)]
pub struct FlagComposer<'a> {
    target: &'a Target,
    toolchain: &'a Toolchain,
    resolver: &'a PathResolver,
    platform: Platform,
}

impl<'a> FlagComposer<'a> {
    /// Create a composer for `target`.
    #[must_use]
    pub const fn new(
        target: &'a Target,
        toolchain: &'a Toolchain,
        resolver: &'a PathResolver,
        platform: Platform,
    ) -> Self {
        Self {
            target,
            toolchain,
            resolver,
            platform,
        }
    }

    fn entry(&self, language: &Language) -> Result<&'a LanguageToolchain, GenError> {
        if !self.target.uses_language(language) {
            return Err(GenError::InvalidLanguage {
                target: self.target.name.clone(),
                language: language.to_string(),
            });
        }
        self.toolchain
            .get(language)
            .ok_or_else(|| GenError::UnknownLanguage {
                target: self.target.name.clone(),
                language: language.to_string(),
            })
    }

    /// Ordered flag list for `source`.
    ///
    /// `module_dir` names the directory module outputs are written to when
    /// the language scans module dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidLanguage`] when the target does not declare
    /// `language`, [`GenError::UnknownLanguage`] when the toolchain lacks it,
    /// and [`GenError::UnsupportedStandard`] when a requested standard has no
    /// flag.
    pub fn flag_words(
        &self,
        source: &SourceFile,
        language: &Language,
        module_dir: Option<&Utf8Path>,
    ) -> Result<Vec<String>, GenError> {
        let entry = self.entry(language)?;
        let props = &self.target.properties;

        let mut base = entry.flags.clone();
        if self.target.kind.wants_position_independent_code() || props.position_independent {
            base.extend(entry.pic_flag.iter().cloned());
        }

        let mut target_level = props.compile_options.clone();
        if let Some(extra) = props.language_flags.get(language) {
            target_level.extend(extra.iter().cloned());
        }

        let mut standard_level = Vec::new();
        if let Some(standard) = props.standards.get(language) {
            let flag = entry.standard_flags.get(standard).ok_or_else(|| {
                GenError::UnsupportedStandard {
                    target: self.target.name.clone(),
                    language: language.to_string(),
                    standard: standard.clone(),
                }
            })?;
            standard_level.push(flag.clone());
        }
        if let Some(features) = props.features.get(language) {
            standard_level.extend(features.iter().cloned());
        }
        if let (Some(dir), Some(flag)) = (module_dir, entry.module_dir_flag.as_deref())
            && entry.has_modules(language)
        {
            standard_level.push(format!("{flag}{}", shell_word(dir.as_str(), self.platform)));
        }

        Ok(fold_layers(
            [base, target_level, standard_level, source.compile_options.clone()],
            &entry.exclusive_prefixes,
        ))
    }

    /// Flags for a build statement's `FLAGS` variable.
    ///
    /// # Errors
    ///
    /// See [`Self::flag_words`].
    pub fn compose_flags(
        &self,
        source: &SourceFile,
        language: &Language,
        module_dir: Option<&Utf8Path>,
    ) -> Result<String, GenError> {
        let words = self.flag_words(source, language, module_dir)?;
        Ok(escape_value(&words.join(" ")))
    }

    /// Shell-quoted definition words, target definitions first.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidLanguage`] or [`GenError::UnknownLanguage`].
    pub fn define_words(
        &self,
        source: &SourceFile,
        language: &Language,
    ) -> Result<Vec<String>, GenError> {
        let entry = self.entry(language)?;
        let prefix = entry.define_flag();
        Ok(self
            .target
            .properties
            .compile_definitions
            .iter()
            .chain(&source.compile_definitions)
            .map(|def| shell_word(&format!("{prefix}{def}"), self.platform))
            .collect())
    }

    /// Definitions for a build statement's `DEFINES` variable.
    ///
    /// # Errors
    ///
    /// See [`Self::define_words`].
    pub fn compose_defines(
        &self,
        source: &SourceFile,
        language: &Language,
    ) -> Result<String, GenError> {
        Ok(escape_value(&self.define_words(source, language)?.join(" ")))
    }

    /// Include arguments, target directories first, paths in executor form.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidLanguage`] or [`GenError::UnknownLanguage`].
    pub fn include_words(
        &self,
        source: &SourceFile,
        language: &Language,
    ) -> Result<Vec<String>, GenError> {
        let entry = self.entry(language)?;
        Ok(self
            .target
            .properties
            .include_directories
            .iter()
            .chain(&source.include_directories)
            .map(|dir| self.include_word(entry, dir))
            .collect())
    }

    fn include_word(&self, entry: &LanguageToolchain, dir: &IncludeDir) -> String {
        let flag = if dir.system {
            entry.system_include_flag()
        } else {
            entry.include_flag()
        };
        let path = self.resolver.to_ninja_path(&dir.path);
        format!("{flag}{}", shell_word(path.as_str(), self.platform))
    }

    /// Includes for a build statement's `INCLUDES` variable.
    ///
    /// Every character significant to build statement syntax is escaped.
    ///
    /// # Errors
    ///
    /// See [`Self::include_words`].
    pub fn compose_includes(
        &self,
        source: &SourceFile,
        language: &Language,
    ) -> Result<String, GenError> {
        Ok(self
            .include_words(source, language)?
            .iter()
            .map(|word| escape_path(word))
            .join(" "))
    }
}

/// Concatenate flag layers, keeping only the last option for each exclusive
/// prefix.
///
/// ```
/// use tsugite::flags::fold_layers;
///
/// let folded = fold_layers(
///     [vec!["-O2".to_owned(), "-std=c++11".to_owned()], vec!["-std=c++17".to_owned()]],
///     &["-std=".to_owned()],
/// );
/// assert_eq!(folded, vec!["-O2", "-std=c++17"]);
/// ```
#[must_use]
pub fn fold_layers<I>(layers: I, exclusive_prefixes: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut out: Vec<String> = Vec::new();
    for option in layers.into_iter().flatten() {
        if let Some(prefix) = exclusive_prefixes
            .iter()
            .find(|prefix| option.starts_with(prefix.as_str()))
        {
            out.retain(|existing| !existing.starts_with(prefix.as_str()));
        }
        out.push(option);
    }
    out
}
