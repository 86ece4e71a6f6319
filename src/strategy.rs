//! Dependency strategy selection.
//!
//! For each language a target compiles, the selector decides how header
//! dependencies reach the executor, whether preprocessing runs as its own
//! step, and whether module dependencies must be discovered before
//! compilation. Decisions depend only on the language and the toolchain
//! passed in, never on earlier queries, so callers re-query per target.

use crate::error::GenError;
use crate::model::Language;
use crate::toolchain::{DepfileFormat, LanguageToolchain, Toolchain};

/// Everything the rule emitter and statement writer need to know about one
/// language's compile pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyStrategy {
    /// Language the strategy applies to.
    pub language: Language,
    /// How header dependencies are reported.
    pub depfile: DepfileFormat,
    /// Preprocessing runs as a separate step.
    pub explicit_preprocessing: bool,
    /// The compile step reads the preprocessed file instead of the source.
    pub use_preprocessed_source: bool,
    /// Module dependencies are discovered before compilation.
    pub dyndep: bool,
}

impl DependencyStrategy {
    /// Whether a per-source step runs before compilation.
    #[must_use]
    pub const fn has_preprocess_step(&self) -> bool {
        self.explicit_preprocessing || self.dyndep
    }

    /// Whether the compile rule itself declares header dependencies.
    ///
    /// When the compile step reads preprocessed output, headers were already
    /// tracked by the preprocess step.
    #[must_use]
    pub const fn compile_tracks_headers(&self) -> bool {
        !self.use_preprocessed_source && !matches!(self.depfile, DepfileFormat::None)
    }

    /// Whether the preprocess step declares header dependencies.
    #[must_use]
    pub const fn preprocess_tracks_headers(&self) -> bool {
        self.use_preprocessed_source && !matches!(self.depfile, DepfileFormat::None)
    }
}

/// Answers strategy questions for one target against one toolchain.
#[derive(Debug, Clone, Copy)]
pub struct StrategySelector<'a> {
    toolchain: &'a Toolchain,
    target: &'a str,
}

impl<'a> StrategySelector<'a> {
    /// Create a selector reporting errors against `target`.
    #[must_use]
    pub const fn new(toolchain: &'a Toolchain, target: &'a str) -> Self {
        Self { toolchain, target }
    }

    /// Toolchain entry for `language`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownLanguage`] when the language is not
    /// registered.
    pub fn entry(&self, language: &Language) -> Result<&'a LanguageToolchain, GenError> {
        self.toolchain
            .get(language)
            .ok_or_else(|| GenError::UnknownLanguage {
                target: self.target.to_owned(),
                language: language.to_string(),
            })
    }

    /// Whether include information arrives on the diagnostic stream.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownLanguage`] for unregistered languages.
    pub fn need_dep_type_msvc(&self, language: &Language) -> Result<bool, GenError> {
        Ok(matches!(
            self.entry(language)?.depfile_format(),
            DepfileFormat::Msvc
        ))
    }

    /// Whether preprocessing must run as a separate step.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownLanguage`] for unregistered languages.
    pub fn need_explicit_preprocessing(&self, language: &Language) -> Result<bool, GenError> {
        Ok(self.entry(language)?.preprocesses_explicitly(language))
    }

    /// Whether module dependencies must be scanned before compilation.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownLanguage`] for unregistered languages.
    pub fn need_dyndep(&self, language: &Language) -> Result<bool, GenError> {
        Ok(self.entry(language)?.has_modules(language))
    }

    /// Whether the compile step reads a persisted preprocessed file.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownLanguage`] for unregistered languages.
    pub fn use_preprocessed_source(&self, language: &Language) -> Result<bool, GenError> {
        let entry = self.entry(language)?;
        Ok(entry.preprocesses_explicitly(language) && !entry.compile_original_source)
    }

    /// Full strategy for `language`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownLanguage`] for unregistered languages and
    /// [`GenError::DyndepWithoutScanRule`] when module scanning is required
    /// but the toolchain provides no scan or collate command.
    pub fn select(&self, language: &Language) -> Result<DependencyStrategy, GenError> {
        let entry = self.entry(language)?;
        let dyndep = self.need_dyndep(language)?;
        if dyndep {
            let missing = if entry.scan_command.is_none() {
                Some("scan")
            } else if entry.collate_command.is_none() {
                Some("collate")
            } else {
                None
            };
            if let Some(missing) = missing {
                return Err(GenError::DyndepWithoutScanRule {
                    target: self.target.to_owned(),
                    language: language.to_string(),
                    missing,
                });
            }
        }
        Ok(DependencyStrategy {
            language: language.clone(),
            depfile: entry.depfile_format(),
            explicit_preprocessing: self.need_explicit_preprocessing(language)?,
            use_preprocessed_source: self.use_preprocessed_source(language)?,
            dyndep,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::toolchain::CompilerFamily;
    use rstest::{fixture, rstest};

    fn fortran_entry() -> LanguageToolchain {
        LanguageToolchain {
            scan_command: Some("scan $in".into()),
            collate_command: Some("collate $out".into()),
            ..LanguageToolchain::new("gfortran", CompilerFamily::Gnu)
        }
    }

    #[fixture]
    fn toolchain() -> Toolchain {
        Toolchain::default()
            .with_language("CXX", LanguageToolchain::new("c++", CompilerFamily::Gnu))
            .with_language("C", LanguageToolchain::new("cl", CompilerFamily::Msvc))
            .with_language("Fortran", fortran_entry())
    }

    #[rstest]
    fn gnu_cxx_uses_integrated_depfiles(toolchain: Toolchain) {
        let selector = StrategySelector::new(&toolchain, "app");
        let strategy = selector.select(&Language::from("CXX")).expect("strategy");
        assert_eq!(strategy.depfile, DepfileFormat::Gcc);
        assert!(!strategy.dyndep);
        assert!(!strategy.has_preprocess_step());
        assert!(strategy.compile_tracks_headers());
    }

    #[rstest]
    fn msvc_needs_msvc_dep_type(toolchain: Toolchain) {
        let selector = StrategySelector::new(&toolchain, "app");
        assert!(selector.need_dep_type_msvc(&Language::from("C")).expect("query"));
        assert!(!selector.need_dep_type_msvc(&Language::from("CXX")).expect("query"));
    }

    #[rstest]
    fn fortran_preprocesses_and_scans(toolchain: Toolchain) {
        let selector = StrategySelector::new(&toolchain, "app");
        let strategy = selector.select(&Language::from("Fortran")).expect("strategy");
        assert!(strategy.dyndep);
        assert!(strategy.explicit_preprocessing);
        assert!(strategy.use_preprocessed_source);
        assert!(strategy.preprocess_tracks_headers());
        assert!(!strategy.compile_tracks_headers());
    }

    #[rstest]
    fn unknown_language_is_a_configuration_error(toolchain: Toolchain) {
        let selector = StrategySelector::new(&toolchain, "app");
        let err = selector
            .select(&Language::from("COBOL"))
            .expect_err("unknown language");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[rstest]
    fn modules_without_scan_command_violate_policy() {
        let toolchain = Toolchain::default().with_language(
            "Fortran",
            LanguageToolchain::new("gfortran", CompilerFamily::Gnu),
        );
        let selector = StrategySelector::new(&toolchain, "app");
        let err = selector
            .select(&Language::from("Fortran"))
            .expect_err("policy violation");
        assert!(matches!(
            err,
            GenError::DyndepWithoutScanRule { missing: "scan", .. }
        ));
        assert_eq!(err.category(), ErrorCategory::Policy);
    }

    #[rstest]
    fn selection_is_pure_across_toolchains() {
        let modular = Toolchain::default().with_language(
            "CXX",
            LanguageToolchain {
                modules: Some(true),
                scan_command: Some("scan".into()),
                collate_command: Some("collate".into()),
                ..LanguageToolchain::new("clang++", CompilerFamily::Clang)
            },
        );
        let plain = Toolchain::default()
            .with_language("CXX", LanguageToolchain::new("c++", CompilerFamily::Gnu));
        let cxx = Language::from("CXX");
        let first = StrategySelector::new(&modular, "a").need_dyndep(&cxx).expect("query");
        let second = StrategySelector::new(&plain, "b").need_dyndep(&cxx).expect("query");
        let again = StrategySelector::new(&modular, "a").need_dyndep(&cxx).expect("query");
        assert!(first);
        assert!(!second);
        assert_eq!(first, again);
    }
}
