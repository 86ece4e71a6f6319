//! Compile, preprocess and collation rules for one target.
//!
//! Rules are scoped to their target: the name embeds the sanitised target
//! name, so two targets never share or race on a rule. Flags are passed as
//! statement variables rather than baked into commands, which keeps exactly
//! one compile rule per language and target.

use crate::config::Platform;
use crate::error::GenError;
use crate::ir::Rule;
use crate::model::{ArtifactKind, Language, Target};
use crate::path::shell_word;
use crate::session::GenerationSession;
use crate::sink::NinjaSink;
use crate::strategy::{DependencyStrategy, StrategySelector};
use crate::toolchain::{DepfileFormat, LanguageToolchain, Toolchain};

/// Content deflected into a compile response file.
pub const COMPILE_RSP_CONTENT: &str = "$DEFINES $INCLUDES $FLAGS";
/// Content deflected into a link response file.
pub const LINK_RSP_CONTENT: &str = "$in $LINK_LIBRARIES";
/// Content deflected into an archiver response file.
pub const ARCHIVE_RSP_CONTENT: &str = "$in";

const RSP_REFERENCE: &str = "@$RSP_FILE";
const RSP_SUFFIX: &str = "_RSP";

/// Replace characters that are not valid in rule names with `_`.
///
/// ```
/// use tsugite::rules::sanitize;
/// assert_eq!(sanitize("my-lib.v2"), "my_lib_v2");
/// ```
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Name of the compile rule for `language` in `target`.
#[must_use]
pub fn compile_rule_name(language: &Language, target: &str) -> String {
    format!("{}_COMPILER__{}", sanitize(language.as_str()), sanitize(target))
}

/// Name of the per-source preprocess or scan rule.
#[must_use]
pub fn preprocess_rule_name(language: &Language, target: &str) -> String {
    format!("{}_PREPROCESS__{}", sanitize(language.as_str()), sanitize(target))
}

/// Name of the rule collating scan results into the dyndep file.
#[must_use]
pub fn dyndep_rule_name(language: &Language, target: &str) -> String {
    format!("{}_DYNDEP__{}", sanitize(language.as_str()), sanitize(target))
}

/// Name of the link rule.
#[must_use]
pub fn link_rule_name(language: &Language, kind: ArtifactKind, target: &str) -> String {
    format!(
        "{}_{}_LINKER__{}",
        sanitize(language.as_str()),
        kind.rule_fragment(),
        sanitize(target)
    )
}

/// Name of the bundle content placement rule.
#[must_use]
pub fn bundle_rule_name(target: &str) -> String {
    format!("BUNDLE_CONTENT__{}", sanitize(target))
}

/// Name of the response file variant of `rule`.
#[must_use]
pub fn response_file_rule_name(rule: &str) -> String {
    format!("{rule}{RSP_SUFFIX}")
}

/// Expand the `{compiler}` and `{dep_flags}` placeholders of a template.
#[must_use]
pub fn expand_template(template: &str, compiler: &str, dep_flags: &str) -> String {
    let with_deps = if dep_flags.is_empty() {
        template.replace(" {dep_flags}", "").replace("{dep_flags}", "")
    } else {
        template.replace("{dep_flags}", dep_flags)
    };
    with_deps.replace("{compiler}", compiler)
}

/// Derive the response file variant of `rule`, deflecting `content`.
///
/// The variables named in `content` are replaced in the command by a single
/// `@$RSP_FILE` argument.
///
/// ```
/// use tsugite::ir::Rule;
/// use tsugite::rules::{COMPILE_RSP_CONTENT, response_file_variant};
///
/// let base = Rule::new("C_COMPILER__app", "cc $DEFINES $INCLUDES $FLAGS -o $out -c $in");
/// let rsp = response_file_variant(&base, COMPILE_RSP_CONTENT);
/// assert_eq!(rsp.name, "C_COMPILER__app_RSP");
/// assert_eq!(rsp.command, "cc @$RSP_FILE -o $out -c $in");
/// ```
#[must_use]
pub fn response_file_variant(rule: &Rule, content: &str) -> Rule {
    Rule {
        name: response_file_rule_name(&rule.name),
        command: deflect(&rule.command, content),
        rspfile: Some("$RSP_FILE".to_owned()),
        rspfile_content: Some(content.to_owned()),
        ..rule.clone()
    }
}

fn deflect(command: &str, content: &str) -> String {
    if command.contains(content) {
        return command.replacen(content, RSP_REFERENCE, 1);
    }
    let mut out = command.to_owned();
    let mut placed = false;
    for token in content.split_whitespace() {
        if !out.contains(token) {
            continue;
        }
        if placed {
            let spaced = format!(" {token}");
            out = if out.contains(&spaced) {
                out.replacen(&spaced, "", 1)
            } else {
                out.replacen(token, "", 1)
            };
        } else {
            out = out.replacen(token, RSP_REFERENCE, 1);
            placed = true;
        }
    }
    if !placed {
        out.push(' ');
        out.push_str(RSP_REFERENCE);
    }
    out
}

/// The rules a language needs in one target, as emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRules {
    /// Strategy the rules implement.
    pub strategy: DependencyStrategy,
    /// Compile rule.
    pub compile: Rule,
    /// Per-source preprocess or scan rule.
    pub preprocess: Option<Rule>,
    /// Collation rule producing the dyndep file.
    pub collate: Option<Rule>,
}

/// Builds and emits the rules a target needs.
#[derive(Debug, Clone, Copy)]
pub struct RuleEmitter<'a> {
    target: &'a Target,
    toolchain: &'a Toolchain,
    platform: Platform,
}

impl<'a> RuleEmitter<'a> {
    /// Create an emitter for `target`.
    #[must_use]
    pub const fn new(target: &'a Target, toolchain: &'a Toolchain, platform: Platform) -> Self {
        Self {
            target,
            toolchain,
            platform,
        }
    }

    /// Work out the rules for `language` without emitting them.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidLanguage`] when the target does not declare
    /// the language and propagates strategy selection errors.
    pub fn language_rules(&self, language: &Language) -> Result<LanguageRules, GenError> {
        if !self.target.uses_language(language) {
            return Err(GenError::InvalidLanguage {
                target: self.target.name.clone(),
                language: language.to_string(),
            });
        }
        let selector = StrategySelector::new(self.toolchain, &self.target.name);
        let strategy = selector.select(language)?;
        let entry = selector.entry(language)?;
        let compile = self.compile_rule(&strategy, entry);
        let preprocess = strategy
            .has_preprocess_step()
            .then(|| self.preprocess_rule(&strategy, entry));
        let collate = strategy
            .dyndep
            .then(|| self.collate_rule(&strategy, entry))
            .flatten();
        Ok(LanguageRules {
            strategy,
            compile,
            preprocess,
            collate,
        })
    }

    /// Emit the rules for `language` into `sink`.
    ///
    /// Emitting the same language twice writes nothing the second time.
    ///
    /// # Errors
    ///
    /// See [`Self::language_rules`]; also returns sink and rule conflict
    /// errors from [`GenerationSession::emit_rule`].
    pub fn write_language_rules(
        &self,
        session: &mut GenerationSession,
        sink: &mut dyn NinjaSink,
        language: &Language,
    ) -> Result<LanguageRules, GenError> {
        let rules = self.language_rules(language)?;
        session.emit_rule(sink, &rules.compile)?;
        if let Some(rule) = &rules.preprocess {
            session.emit_rule(sink, rule)?;
        }
        if let Some(rule) = &rules.collate {
            session.emit_rule(sink, rule)?;
        }
        Ok(rules)
    }

    /// Emit the response file variant of `rule` if not yet emitted and
    /// return it.
    ///
    /// # Errors
    ///
    /// Returns sink and rule conflict errors.
    pub fn ensure_response_file_rule(
        session: &mut GenerationSession,
        sink: &mut dyn NinjaSink,
        rule: &Rule,
        content: &str,
    ) -> Result<Rule, GenError> {
        let variant = response_file_variant(rule, content);
        session.emit_rule(sink, &variant)?;
        Ok(variant)
    }

    fn compiler(&self, entry: &LanguageToolchain) -> String {
        shell_word(&entry.compiler, self.platform)
    }

    fn compile_rule(&self, strategy: &DependencyStrategy, entry: &LanguageToolchain) -> Rule {
        let tracks = strategy.compile_tracks_headers();
        let dep_flags = if tracks {
            dep_flags(strategy.depfile)
        } else {
            ""
        };
        let mut rule = Rule {
            description: Some(format!("Building {} object $out", strategy.language)),
            ..Rule::new(
                compile_rule_name(&strategy.language, &self.target.name),
                expand_template(entry.compile_template(), &self.compiler(entry), dep_flags),
            )
        };
        if tracks {
            declare_deps(&mut rule, strategy.depfile, entry);
        }
        rule
    }

    fn preprocess_rule(&self, strategy: &DependencyStrategy, entry: &LanguageToolchain) -> Rule {
        let tracks = strategy.preprocess_tracks_headers();
        let dep_flags = if tracks {
            dep_flags(strategy.depfile)
        } else {
            ""
        };
        let compiler = self.compiler(entry);
        let preprocess = strategy
            .explicit_preprocessing
            .then(|| expand_template(entry.preprocess_template(), &compiler, dep_flags));
        let scan = strategy
            .dyndep
            .then(|| entry.scan_command.as_deref())
            .flatten()
            .map(|cmd| expand_template(cmd, &compiler, if preprocess.is_some() { "" } else { dep_flags }));
        let command = match (preprocess, scan) {
            (Some(pp), Some(scan)) => format!("{pp} && {scan}"),
            (Some(cmd), None) | (None, Some(cmd)) => cmd,
            (None, None) => String::new(),
        };
        let verb = if strategy.explicit_preprocessing {
            "Preprocessing"
        } else {
            "Scanning"
        };
        let mut rule = Rule {
            description: Some(format!("{verb} {} source $in", strategy.language)),
            ..Rule::new(
                preprocess_rule_name(&strategy.language, &self.target.name),
                command,
            )
        };
        if tracks {
            declare_deps(&mut rule, strategy.depfile, entry);
        }
        rule
    }

    fn collate_rule(&self, strategy: &DependencyStrategy, entry: &LanguageToolchain) -> Option<Rule> {
        let command = entry.collate_command.as_deref()?;
        Some(Rule {
            description: Some(format!("Generating {} dyndep file $out", strategy.language)),
            restat: true,
            ..Rule::new(
                dyndep_rule_name(&strategy.language, &self.target.name),
                expand_template(command, &self.compiler(entry), ""),
            )
        })
    }
}

const fn dep_flags(format: DepfileFormat) -> &'static str {
    match format {
        DepfileFormat::Gcc => "-MD -MT $out -MF $DEP_FILE",
        DepfileFormat::Msvc => "/showIncludes",
        DepfileFormat::None => "",
    }
}

fn declare_deps(rule: &mut Rule, format: DepfileFormat, entry: &LanguageToolchain) {
    match format {
        DepfileFormat::Gcc => {
            rule.depfile = Some("$DEP_FILE".to_owned());
            rule.deps = Some("gcc".to_owned());
        }
        DepfileFormat::Msvc => {
            rule.deps = Some("msvc".to_owned());
            rule.msvc_deps_prefix.clone_from(&entry.msvc_deps_prefix);
        }
        DepfileFormat::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferedSink;
    use crate::toolchain::CompilerFamily;
    use rstest::{fixture, rstest};

    #[fixture]
    fn toolchain() -> Toolchain {
        Toolchain::default()
            .with_language("CXX", LanguageToolchain::new("c++", CompilerFamily::Gnu))
            .with_language(
                "C",
                LanguageToolchain {
                    msvc_deps_prefix: Some("Note: including file:".into()),
                    ..LanguageToolchain::new("cl", CompilerFamily::Msvc)
                },
            )
            .with_language(
                "Fortran",
                LanguageToolchain {
                    scan_command: Some("fscan --ddi=$DYNDEP_INTERMEDIATE_FILE $PREPROCESSED_SOURCE".into()),
                    collate_command: Some("fcollate --info=$DEPEND_INFO -o $out $in".into()),
                    ..LanguageToolchain::new("gfortran", CompilerFamily::Gnu)
                },
            )
    }

    fn target() -> Target {
        Target::new("my-app", ArtifactKind::Executable)
            .with_language("CXX")
            .with_language("C")
            .with_language("Fortran")
    }

    #[rstest]
    fn gcc_compile_rule_declares_depfile(toolchain: Toolchain) {
        let target = target();
        let emitter = RuleEmitter::new(&target, &toolchain, Platform::Linux);
        let rules = emitter.language_rules(&Language::from("CXX")).expect("rules");
        assert_eq!(rules.compile.name, "CXX_COMPILER__my_app");
        assert_eq!(
            rules.compile.command,
            "c++ $DEFINES $INCLUDES $FLAGS -MD -MT $out -MF $DEP_FILE -o $out -c $in"
        );
        assert_eq!(rules.compile.depfile.as_deref(), Some("$DEP_FILE"));
        assert_eq!(rules.compile.deps.as_deref(), Some("gcc"));
        assert!(rules.preprocess.is_none());
        assert!(rules.collate.is_none());
    }

    #[rstest]
    fn msvc_compile_rule_reads_show_includes(toolchain: Toolchain) {
        let target = target();
        let emitter = RuleEmitter::new(&target, &toolchain, Platform::Windows);
        let rules = emitter.language_rules(&Language::from("C")).expect("rules");
        assert!(rules.compile.command.contains("/showIncludes"));
        assert_eq!(rules.compile.deps.as_deref(), Some("msvc"));
        assert_eq!(
            rules.compile.msvc_deps_prefix.as_deref(),
            Some("Note: including file:")
        );
        assert!(rules.compile.depfile.is_none());
    }

    #[rstest]
    fn fortran_gets_preprocess_and_collate_rules(toolchain: Toolchain) {
        let target = target();
        let emitter = RuleEmitter::new(&target, &toolchain, Platform::Linux);
        let rules = emitter.language_rules(&Language::from("Fortran")).expect("rules");
        let preprocess = rules.preprocess.expect("preprocess rule");
        assert_eq!(preprocess.name, "Fortran_PREPROCESS__my_app");
        assert!(preprocess.command.contains(" -E $in -o $PREPROCESSED_SOURCE && fscan"));
        assert_eq!(preprocess.deps.as_deref(), Some("gcc"));
        assert!(rules.compile.deps.is_none());
        assert!(!rules.compile.command.contains("-MD"));
        let collate = rules.collate.expect("collate rule");
        assert_eq!(collate.name, "Fortran_DYNDEP__my_app");
        assert!(collate.restat);
    }

    #[rstest]
    fn writing_rules_twice_emits_once(toolchain: Toolchain) {
        let target = target();
        let emitter = RuleEmitter::new(&target, &toolchain, Platform::Linux);
        let mut session = GenerationSession::new("my-app");
        let mut sink = BufferedSink::new();
        let cxx = Language::from("CXX");
        emitter
            .write_language_rules(&mut session, &mut sink, &cxx)
            .expect("first");
        emitter
            .write_language_rules(&mut session, &mut sink, &cxx)
            .expect("second");
        assert_eq!(sink.rules().count(), 1);
    }

    #[rstest]
    fn undeclared_language_is_invalid(toolchain: Toolchain) {
        let target = Target::new("lib", ArtifactKind::StaticLibrary).with_language("C");
        let emitter = RuleEmitter::new(&target, &toolchain, Platform::Linux);
        let err = emitter
            .language_rules(&Language::from("CXX"))
            .expect_err("CXX not declared");
        assert!(matches!(err, GenError::InvalidLanguage { .. }));
    }

    #[rstest]
    #[case("ar qc $out $in $LINK_LIBRARIES", LINK_RSP_CONTENT, "ar qc $out @$RSP_FILE")]
    #[case("tool $FLAGS -c $in", COMPILE_RSP_CONTENT, "tool @$RSP_FILE -c $in")]
    #[case("tool -c $in", COMPILE_RSP_CONTENT, "tool -c $in @$RSP_FILE")]
    fn response_file_variants_deflect_arguments(
        #[case] command: &str,
        #[case] content: &str,
        #[case] expected: &str,
    ) {
        let rsp = response_file_variant(&Rule::new("R", command), content);
        assert_eq!(rsp.command, expected);
        assert_eq!(rsp.rspfile.as_deref(), Some("$RSP_FILE"));
        assert_eq!(rsp.rspfile_content.as_deref(), Some(content));
    }

    #[rstest]
    fn templates_without_dep_flags_collapse_cleanly() {
        assert_eq!(
            expand_template("{compiler} $FLAGS {dep_flags} -c $in", "cc", ""),
            "cc $FLAGS -c $in"
        );
    }
}
