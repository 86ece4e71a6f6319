//! Link dependency resolution and the link statement.

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use tracing::{debug, warn};

use crate::context::TargetContext;
use crate::error::GenError;
use crate::ir::{BuildStatement, ResponseFile, Rule};
use crate::model::{ArtifactKind, Language, LinkItem, ResponseFilePolicy};
use crate::ninja_gen::{escape_path, escape_value};
use crate::path::shell_word;
use crate::rules::{
    ARCHIVE_RSP_CONTENT, LINK_RSP_CONTENT, RuleEmitter, expand_template, link_rule_name,
};
use crate::session::GenerationSession;
use crate::sink::NinjaSink;

/// Ordered link inputs of the target, in executor form.
///
/// Objects come first, then each link item in declared order, then the
/// target's extra link dependencies. Repeated entries are kept because
/// linkers resolving static archive cycles rely on them. Utility targets
/// have no link step and yield an empty list.
///
/// # Errors
///
/// Returns [`GenError::InvalidLanguage`] when `link_language` is not
/// declared by the target, [`GenError::UnknownTarget`] for unknown linked
/// targets and [`GenError::InvalidPath`] for unrepresentable paths.
pub fn compute_link_deps(
    ctx: &TargetContext<'_>,
    session: &GenerationSession,
    link_language: &Language,
) -> Result<Vec<Utf8PathBuf>, GenError> {
    if matches!(ctx.target.kind, ArtifactKind::Utility) {
        return Ok(Vec::new());
    }
    if !ctx.target.uses_language(link_language) {
        return Err(GenError::InvalidLanguage {
            target: ctx.name().to_owned(),
            language: link_language.to_string(),
        });
    }
    let mut deps = session
        .objects()
        .iter()
        .map(|object| ctx.build_path(object))
        .collect::<Result<Vec<_>, _>>()?;
    for item in &ctx.target.link_items {
        match item {
            LinkItem::Target(name) => {
                let info = ctx.dependency(name)?;
                match info.artifact {
                    Some(artifact) => deps.push(ctx.build_path(&artifact)?),
                    None => debug!(dependency = %name, "utility target has no link artifact"),
                }
            }
            LinkItem::File(path) => deps.push(ctx.project_path(path)?),
            LinkItem::Flag(_) => {}
        }
    }
    for extra in &ctx.target.properties.link_depends {
        deps.push(ctx.project_path(extra)?);
    }
    Ok(deps)
}

/// Words passed to the linker for the target's link items.
fn link_library_words(ctx: &TargetContext<'_>) -> Result<Vec<String>, GenError> {
    let platform = ctx.config.platform;
    let mut words = Vec::new();
    for item in &ctx.target.link_items {
        match item {
            LinkItem::Target(name) => {
                if let Some(artifact) = ctx.dependency(name)?.artifact {
                    words.push(shell_word(ctx.build_path(&artifact)?.as_str(), platform));
                }
            }
            LinkItem::File(path) => {
                words.push(shell_word(ctx.project_path(path)?.as_str(), platform));
            }
            LinkItem::Flag(flag) => words.push(flag.clone()),
        }
    }
    Ok(words)
}

/// Build the link rule for the target.
///
/// # Errors
///
/// Returns [`GenError::UnknownLanguage`] when the link language has no
/// toolchain entry and [`GenError::MissingLinkCommand`] when the entry
/// cannot link this artifact kind.
pub fn link_rule(ctx: &TargetContext<'_>, language: &Language) -> Result<Rule, GenError> {
    let entry = ctx
        .toolchain
        .get(language)
        .ok_or_else(|| GenError::UnknownLanguage {
            target: ctx.name().to_owned(),
            language: language.to_string(),
        })?;
    let kind = ctx.target.kind;
    let template = entry
        .link_template(kind, ctx.config.platform)
        .ok_or_else(|| GenError::MissingLinkCommand {
            target: ctx.name().to_owned(),
            language: language.to_string(),
            kind: kind.describe(),
        })?;
    let compiler = shell_word(&entry.compiler, ctx.config.platform);
    Ok(Rule {
        description: Some(format!("Linking {language} {} $TARGET_FILE", kind.describe())),
        ..Rule::new(
            link_rule_name(language, kind, ctx.name()),
            expand_template(template, &compiler, ""),
        )
    })
}

/// Emit the link rule and statement producing the target's artifact.
///
/// Returns `None` for targets without an artifact.
///
/// # Errors
///
/// Returns link dependency, rule and sink errors.
pub fn write_link_statement(
    ctx: &TargetContext<'_>,
    session: &mut GenerationSession,
    sink: &mut dyn NinjaSink,
    link_language: &Language,
) -> Result<Option<BuildStatement>, GenError> {
    let Some(artifact) = ctx.layout.artifact() else {
        return Ok(None);
    };
    let artifact = ctx.build_path(&artifact)?;
    let rule = link_rule(ctx, link_language)?;
    session.emit_rule(sink, &rule)?;

    let deps = compute_link_deps(ctx, session, link_language)?;
    let object_count = session.objects().len();
    let mut stmt = BuildStatement::new(rule.name.clone()).with_output(artifact.clone());
    stmt.comment = Some(format!(
        "Link the {} {}",
        ctx.target.kind.describe(),
        ctx.name()
    ));
    stmt.inputs.extend(deps.iter().take(object_count).cloned());
    stmt.implicit_inputs
        .extend(deps.iter().skip(object_count).cloned());
    for dep in &ctx.target.order_dependencies {
        let info = ctx.dependency(dep)?;
        stmt.order_only.push(match info.artifact {
            Some(path) => ctx.build_path(&path)?,
            None => Utf8PathBuf::from(info.name),
        });
    }

    let flags = ctx.target.properties.link_options.join(" ");
    // Archivers take members only; library words never reach `ar`.
    let archive = ctx.target.kind == ArtifactKind::StaticLibrary;
    let libraries = if archive {
        Vec::new()
    } else {
        link_library_words(ctx)?
    };
    let link_flags = escape_value(&flags);
    let link_libraries = escape_value(&libraries.join(" "));
    if !link_flags.is_empty() {
        stmt.variables.insert("LINK_FLAGS".to_owned(), link_flags.clone());
    }
    if !link_libraries.is_empty() {
        stmt.variables
            .insert("LINK_LIBRARIES".to_owned(), link_libraries.clone());
    }
    stmt.variables
        .insert("TARGET_FILE".to_owned(), escape_path(artifact.as_str()));
    if let Some(pool) = &ctx.target.properties.job_pool_link {
        stmt.variables.insert("pool".to_owned(), pool.clone());
    }

    let inputs = stmt
        .inputs
        .iter()
        .map(Utf8PathBuf::as_path)
        .map(Utf8Path::as_str)
        .join(" ");
    let estimated = rule.command.len()
        + inputs.len()
        + link_flags.len()
        + link_libraries.len()
        + artifact.as_str().len();
    let policy = ctx.target.properties.response_file;
    let limit = ctx.config.command_line_limit();
    let over_limit = estimated > limit;
    let forced = ctx.config.force_response_file || policy == ResponseFilePolicy::Always;
    let supported = ctx
        .toolchain
        .get(link_language)
        .is_some_and(crate::toolchain::LanguageToolchain::supports_response_files);
    if policy != ResponseFilePolicy::Never && supported && (forced || over_limit) {
        let content = if archive {
            ARCHIVE_RSP_CONTENT
        } else {
            LINK_RSP_CONTENT
        };
        let variant = RuleEmitter::ensure_response_file_rule(session, sink, &rule, content)?;
        let rsp = Utf8PathBuf::from(format!("{artifact}.rsp"));
        stmt.rule = variant.name;
        stmt.variables
            .insert("RSP_FILE".to_owned(), escape_path(rsp.as_str()));
        stmt.response_file = Some(ResponseFile {
            path: rsp,
            content: std::iter::once(inputs.as_str())
                .chain(libraries.iter().map(String::as_str))
                .filter(|part| !part.is_empty())
                .join(" "),
        });
    } else if over_limit {
        warn!(
            target_name = %ctx.name(),
            estimated,
            limit,
            "link command exceeds the limit but response files are disabled"
        );
    }

    sink.write_build(&stmt).map_err(ctx.sink_error("build"))?;
    Ok(Some(stmt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeneratorConfig, Platform};
    use crate::model::{Target, TargetInfo, TargetLookup};
    use crate::sink::BufferedSink;
    use crate::toolchain::{CompilerFamily, LanguageToolchain, Toolchain};
    use rstest::{fixture, rstest};

    struct Deps;

    impl TargetLookup for Deps {
        fn target_info(&self, name: &str) -> Option<TargetInfo> {
            let (kind, artifact) = match name {
                "core" => (ArtifactKind::StaticLibrary, Some("libcore.a")),
                "gen" => (ArtifactKind::Utility, None),
                _ => return None,
            };
            Some(TargetInfo {
                name: name.to_owned(),
                kind,
                artifact: artifact.map(Utf8PathBuf::from),
                object_dir: format!("{name}.dir").into(),
            })
        }
    }

    #[fixture]
    fn toolchain() -> Toolchain {
        Toolchain::default().with_language("C", LanguageToolchain::new("cc", CompilerFamily::Gnu))
    }

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            source_root: "/work/proj".into(),
            build_root: "build".into(),
            platform: Platform::Linux,
            ..GeneratorConfig::default()
        }
    }

    fn app() -> Target {
        let mut target = Target::new("app", ArtifactKind::Executable)
            .with_language("C")
            .with_link_item(LinkItem::Target("core".into()))
            .with_link_item(LinkItem::Flag("-lm".into()))
            .with_link_item(LinkItem::File("/usr/lib/libz.a".into()))
            .with_link_item(LinkItem::Target("core".into()));
        target.properties.link_depends.push("link.map".into());
        target
    }

    #[rstest]
    fn link_deps_keep_order_and_repetition(toolchain: Toolchain) {
        let target = app();
        let config = config();
        let ctx = TargetContext::new(&target, &toolchain, &config, &Deps);
        let mut session = GenerationSession::new("app");
        session.add_object("app.dir/src/b.c.o".into());
        session.add_object("app.dir/src/a.c.o".into());
        let deps = compute_link_deps(&ctx, &session, &Language::from("C")).expect("deps");
        let deps: Vec<&str> = deps
            .iter()
            .map(Utf8PathBuf::as_path)
            .map(Utf8Path::as_str)
            .collect();
        assert_eq!(
            deps,
            [
                "app.dir/src/b.c.o",
                "app.dir/src/a.c.o",
                "libcore.a",
                "/usr/lib/libz.a",
                "libcore.a",
                "/work/proj/link.map",
            ]
        );
    }

    #[rstest]
    fn utility_targets_have_no_link_deps(toolchain: Toolchain) {
        let target = Target::new("docs", ArtifactKind::Utility);
        let config = config();
        let ctx = TargetContext::new(&target, &toolchain, &config, &Deps);
        let session = GenerationSession::new("docs");
        let deps = compute_link_deps(&ctx, &session, &Language::from("C")).expect("deps");
        assert!(deps.is_empty());
    }

    #[rstest]
    fn unknown_link_target_is_reported(toolchain: Toolchain) {
        let target = Target::new("app", ArtifactKind::Executable)
            .with_language("C")
            .with_link_item(LinkItem::Target("missing".into()));
        let config = config();
        let ctx = TargetContext::new(&target, &toolchain, &config, &Deps);
        let session = GenerationSession::new("app");
        let err = compute_link_deps(&ctx, &session, &Language::from("C")).expect_err("unknown");
        assert!(matches!(err, GenError::UnknownTarget { .. }));
    }

    #[rstest]
    fn link_statement_binds_libraries(toolchain: Toolchain) {
        let target = app();
        let config = config();
        let ctx = TargetContext::new(&target, &toolchain, &config, &Deps);
        let mut session = GenerationSession::new("app");
        session.add_object("app.dir/a.c.o".into());
        let mut sink = BufferedSink::new();
        let stmt = write_link_statement(&ctx, &mut session, &mut sink, &Language::from("C"))
            .expect("link")
            .expect("artifact");
        assert_eq!(stmt.rule, "C_EXECUTABLE_LINKER__app");
        assert_eq!(stmt.outputs, vec![Utf8PathBuf::from("app")]);
        assert_eq!(stmt.inputs, vec![Utf8PathBuf::from("app.dir/a.c.o")]);
        assert_eq!(
            stmt.variable("LINK_LIBRARIES"),
            Some("libcore.a -lm /usr/lib/libz.a libcore.a")
        );
        assert_eq!(stmt.variable("TARGET_FILE"), Some("app"));
        assert!(stmt.response_file.is_none());
    }

    #[rstest]
    fn forced_response_files_deflect_link_inputs(toolchain: Toolchain) {
        let target = Target::new("app", ArtifactKind::Executable).with_language("C");
        let config = GeneratorConfig {
            force_response_file: true,
            ..config()
        };
        let ctx = TargetContext::new(&target, &toolchain, &config, &Deps);
        let mut session = GenerationSession::new("app");
        session.add_object("app.dir/a.c.o".into());
        let mut sink = BufferedSink::new();
        let stmt = write_link_statement(&ctx, &mut session, &mut sink, &Language::from("C"))
            .expect("link")
            .expect("artifact");
        assert_eq!(stmt.rule, "C_EXECUTABLE_LINKER__app_RSP");
        let rsp = stmt.response_file.expect("response file");
        assert_eq!(rsp.path, "app.rsp");
        assert_eq!(rsp.content, "app.dir/a.c.o");
        assert_eq!(sink.rules().count(), 2);
    }
}
