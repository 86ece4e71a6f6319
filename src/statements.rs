//! Per-source build statements.
//!
//! Sources are first planned: their language is resolved and an object path
//! reserved. Planning every source before writing anything lets the
//! dependency scan outputs of a language be known before its collation
//! statement and its objects are written.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::compile_commands::CompileCommand;
use crate::context::TargetContext;
use crate::dyndep::{ddi_path, depend_info_path, dyndep_path, preprocessed_path};
use crate::error::GenError;
use crate::ir::{BuildStatement, ResponseFile};
use crate::model::{ArtifactKind, Language, LinkItem, ResponseFilePolicy, SourceFile};
use crate::ninja_gen::{escape_path, evaluate};
use crate::rules::{COMPILE_RSP_CONTENT, LanguageRules, RuleEmitter};
use crate::session::GenerationSession;
use crate::sink::NinjaSink;
use crate::strategy::DependencyStrategy;
use crate::toolchain::{DepfileFormat, LanguageToolchain};

/// A compiled source with its reserved outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPlan<'t> {
    /// Source being compiled.
    pub source: &'t SourceFile,
    /// Resolved language.
    pub language: Language,
    /// Build-root-relative object path.
    pub object: Utf8PathBuf,
    /// Persisted preprocessor output, when preprocessing runs separately.
    pub preprocessed: Option<Utf8PathBuf>,
    /// Dependency scan output, when module scanning is needed.
    pub ddi: Option<Utf8PathBuf>,
}

/// Language `source` is compiled as, or `None` for sources that are not
/// compiled.
///
/// # Errors
///
/// Returns [`GenError::UnresolvedSourceLanguage`] when the source names a
/// language the target does not compile.
pub fn resolve_language(
    ctx: &TargetContext<'_>,
    source: &SourceFile,
) -> Result<Option<Language>, GenError> {
    if source.header_only || source.bundle_location.is_some() {
        return Ok(None);
    }
    match &source.language {
        Some(language) if ctx.target.uses_language(language) => Ok(Some(language.clone())),
        Some(_) => Err(GenError::UnresolvedSourceLanguage {
            target: ctx.name().to_owned(),
            source_path: source.path.clone(),
        }),
        None => Ok(ctx
            .toolchain
            .infer_language(&source.path, &ctx.target.languages)),
    }
}

fn toolchain_entry<'a>(
    ctx: &TargetContext<'a>,
    language: &Language,
) -> Result<&'a LanguageToolchain, GenError> {
    ctx.toolchain
        .get(language)
        .ok_or_else(|| GenError::UnknownLanguage {
            target: ctx.name().to_owned(),
            language: language.to_string(),
        })
}

/// Reserve the outputs of one source.
///
/// # Errors
///
/// Returns [`GenError::ObjectPathCollision`] when neither the natural nor
/// the suffixed object path is free.
pub fn plan_object<'t>(
    ctx: &TargetContext<'_>,
    session: &mut GenerationSession,
    source: &'t SourceFile,
    language: Language,
    strategy: &DependencyStrategy,
) -> Result<ObjectPlan<'t>, GenError> {
    let entry = toolchain_entry(ctx, &language)?;
    let ext = entry.object_extension(ctx.config.platform);
    let natural = ctx.layout.object_path(&ctx.resolver, &source.path, ext);
    let object = if session.claim_object(&natural) {
        natural
    } else {
        let suffixed = ctx
            .layout
            .disambiguated_object_path(&ctx.resolver, &source.path, ext);
        if !session.claim_object(&suffixed) {
            return Err(GenError::ObjectPathCollision {
                target: ctx.name().to_owned(),
                source_path: source.path.clone(),
                object: suffixed,
            });
        }
        debug!(source = %source.path, object = %suffixed, "object path disambiguated");
        suffixed
    };
    // The preprocess command always writes its output, even when the object
    // is compiled from the original source.
    let preprocessed = if strategy.explicit_preprocessing {
        Some(claim_preprocessed(ctx, session, source, &object, ext)?)
    } else {
        None
    };
    let ddi = strategy.dyndep.then(|| ddi_path(&object));
    if let Some(ddi) = &ddi {
        session.add_ddi_file(&language, ddi.clone());
    }
    Ok(ObjectPlan {
        source,
        language,
        object,
        preprocessed,
        ddi,
    })
}

/// `a.F90` and `a.f90` in one directory share a natural preprocessed name,
/// so the second one falls back to the digest-suffixed form.
fn claim_preprocessed(
    ctx: &TargetContext<'_>,
    session: &mut GenerationSession,
    source: &SourceFile,
    object: &Utf8Path,
    ext: &str,
) -> Result<Utf8PathBuf, GenError> {
    let natural = preprocessed_path(object, ext, &source.path);
    if session.claim_object(&natural) {
        return Ok(natural);
    }
    let suffixed_object = ctx
        .layout
        .disambiguated_object_path(&ctx.resolver, &source.path, ext);
    let suffixed = preprocessed_path(&suffixed_object, ext, &source.path);
    if !session.claim_object(&suffixed) {
        return Err(GenError::ObjectPathCollision {
            target: ctx.name().to_owned(),
            source_path: source.path.clone(),
            object: suffixed,
        });
    }
    debug!(source = %source.path, preprocessed = %suffixed, "preprocessed path disambiguated");
    Ok(suffixed)
}

/// Emit the phony edge every object of the target order-depends on.
///
/// # Errors
///
/// Returns [`GenError::UnknownTarget`] for unknown dependencies and
/// [`GenError::Sink`] when the write fails.
pub fn write_order_depends(
    ctx: &TargetContext<'_>,
    session: &GenerationSession,
    sink: &mut dyn NinjaSink,
) -> Result<Utf8PathBuf, GenError> {
    let name = TargetContext::order_depends_name(ctx.name());
    let mut stmt = BuildStatement::phony(name.clone());
    stmt.comment = Some(format!("Order-only dependencies for objects of {}", ctx.name()));
    stmt.order_only.extend(session.custom_outputs().iter().cloned());
    let linked = ctx.target.link_items.iter().filter_map(|item| match item {
        LinkItem::Target(dep) => Some(dep),
        LinkItem::File(_) | LinkItem::Flag(_) => None,
    });
    for dep in ctx.target.order_dependencies.iter().chain(linked) {
        let info = ctx.dependency(dep)?;
        stmt.order_only.push(match info.kind {
            ArtifactKind::Utility => Utf8PathBuf::from(info.name),
            _ => TargetContext::order_depends_name(&info.name),
        });
    }
    sink.write_build(&stmt).map_err(ctx.sink_error("build"))?;
    Ok(name)
}

/// Composed command fragments of one source.
#[derive(Debug, Clone)]
struct Fragments {
    define_words: Vec<String>,
    include_words: Vec<String>,
    flag_words: Vec<String>,
    defines: String,
    includes: String,
    flags: String,
}

impl Fragments {
    fn compose(
        ctx: &TargetContext<'_>,
        plan: &ObjectPlan<'_>,
        strategy: &DependencyStrategy,
    ) -> Result<Self, GenError> {
        let composer = ctx.composer();
        let module_dir = if strategy.dyndep {
            Some(ctx.build_path(ctx.layout.object_dir())?)
        } else {
            None
        };
        Ok(Self {
            define_words: composer.define_words(plan.source, &plan.language)?,
            include_words: composer.include_words(plan.source, &plan.language)?,
            flag_words: composer.flag_words(plan.source, &plan.language, module_dir.as_deref())?,
            defines: composer.compose_defines(plan.source, &plan.language)?,
            includes: composer.compose_includes(plan.source, &plan.language)?,
            flags: composer.compose_flags(plan.source, &plan.language, module_dir.as_deref())?,
        })
    }

    fn bind(&self, stmt: &mut BuildStatement) {
        for (key, value) in [
            ("DEFINES", &self.defines),
            ("INCLUDES", &self.includes),
            ("FLAGS", &self.flags),
        ] {
            if !value.is_empty() {
                stmt.variables.insert(key.to_owned(), value.clone());
            }
        }
    }

    /// Exactly what the executor writes for `$DEFINES $INCLUDES $FLAGS`.
    fn response_file_content(&self) -> String {
        format!(
            "{} {} {}",
            self.define_words.join(" "),
            self.include_words.join(" "),
            self.flag_words.join(" ")
        )
    }
}

fn depfile_for(object: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{object}.d"))
}

fn add_common_inputs(
    ctx: &TargetContext<'_>,
    stmt: &mut BuildStatement,
    source: &SourceFile,
    order_depends: &Utf8Path,
) -> Result<(), GenError> {
    for dep in &source.object_depends {
        stmt.implicit_inputs.push(ctx.project_path(dep)?);
    }
    stmt.order_only.push(order_depends.to_path_buf());
    if let Some(pool) = &ctx.target.properties.job_pool_compile {
        stmt.variables.insert("pool".to_owned(), pool.clone());
    }
    Ok(())
}

/// Emit the preprocess or scan statement of a planned source.
///
/// # Errors
///
/// Returns path and sink errors.
pub fn write_preprocess_statement(
    ctx: &TargetContext<'_>,
    sink: &mut dyn NinjaSink,
    plan: &ObjectPlan<'_>,
    rules: &LanguageRules,
    order_depends: &Utf8Path,
) -> Result<Option<BuildStatement>, GenError> {
    let Some(rule) = &rules.preprocess else {
        return Ok(None);
    };
    let strategy = &rules.strategy;
    let fragments = Fragments::compose(ctx, plan, strategy)?;
    let object = ctx.build_path(&plan.object)?;
    let mut stmt = BuildStatement::new(rule.name.clone())
        .with_input(ctx.project_path(&plan.source.path)?);
    stmt.comment = Some(format!("Preprocess {}", plan.source.path));

    let preprocessed = plan
        .preprocessed
        .as_deref()
        .map(|pp| ctx.build_path(pp))
        .transpose()?;
    let ddi = plan.ddi.as_deref().map(|d| ctx.build_path(d)).transpose()?;
    match (&preprocessed, &ddi) {
        (Some(pp), Some(ddi)) => {
            stmt.outputs.push(pp.clone());
            stmt.implicit_outputs.push(ddi.clone());
        }
        (Some(only), None) | (None, Some(only)) => stmt.outputs.push(only.clone()),
        (None, None) => return Ok(None),
    }
    add_common_inputs(ctx, &mut stmt, plan.source, order_depends)?;
    fragments.bind(&mut stmt);
    if strategy.preprocess_tracks_headers() && matches!(strategy.depfile, DepfileFormat::Gcc) {
        stmt.variables.insert(
            "DEP_FILE".to_owned(),
            escape_path(depfile_for(&object).as_str()),
        );
    }
    stmt.variables
        .insert("OBJ_FILE".to_owned(), escape_path(object.as_str()));
    if let Some(pp) = &preprocessed {
        stmt.variables
            .insert("PREPROCESSED_SOURCE".to_owned(), escape_path(pp.as_str()));
    }
    if let Some(ddi) = &ddi {
        stmt.variables.insert(
            "DYNDEP_INTERMEDIATE_FILE".to_owned(),
            escape_path(ddi.as_str()),
        );
        let info = ctx.build_path(&depend_info_path(ctx.layout.object_dir(), &plan.language))?;
        stmt.variables
            .insert("DEPEND_INFO".to_owned(), escape_path(info.as_str()));
    }
    sink.write_build(&stmt).map_err(ctx.sink_error("build"))?;
    Ok(Some(stmt))
}

/// Emit the object statement of a planned source and record the object.
///
/// Flags, definitions and includes are bound as statement variables, or
/// deflected through a response file when forced or when the estimated
/// command line exceeds the configured limit.
///
/// # Errors
///
/// Returns composition, path, rule and sink errors.
pub fn write_object_statement(
    ctx: &TargetContext<'_>,
    session: &mut GenerationSession,
    sink: &mut dyn NinjaSink,
    plan: &ObjectPlan<'_>,
    rules: &LanguageRules,
    order_depends: &Utf8Path,
) -> Result<BuildStatement, GenError> {
    let strategy = &rules.strategy;
    let entry = toolchain_entry(ctx, &plan.language)?;
    let fragments = Fragments::compose(ctx, plan, strategy)?;
    let object = ctx.build_path(&plan.object)?;
    let input = match (&plan.preprocessed, strategy.use_preprocessed_source) {
        (Some(pp), true) => ctx.build_path(pp)?,
        _ => ctx.project_path(&plan.source.path)?,
    };

    let mut stmt = BuildStatement::new(rules.compile.name.clone())
        .with_output(object.clone())
        .with_input(input);
    add_common_inputs(ctx, &mut stmt, plan.source, order_depends)?;
    fragments.bind(&mut stmt);

    let depfile = (strategy.compile_tracks_headers()
        && matches!(strategy.depfile, DepfileFormat::Gcc))
    .then(|| depfile_for(&object));
    if let Some(dep) = &depfile {
        stmt.variables
            .insert("DEP_FILE".to_owned(), escape_path(dep.as_str()));
    }
    let object_dir = ctx.build_path(ctx.layout.object_dir())?;
    stmt.variables
        .insert("OBJECT_DIR".to_owned(), escape_path(object_dir.as_str()));
    let file_dir = object.parent().map_or("", Utf8Path::as_str);
    stmt.variables
        .insert("OBJECT_FILE_DIR".to_owned(), escape_path(file_dir));
    if entry.family.is_msvc_like() {
        stmt.variables.insert(
            "TARGET_COMPILE_PDB".to_owned(),
            escape_path(&format!("{object_dir}/")),
        );
        let pdb = ctx.build_path(&ctx.layout.output_dir().join(format!("{}.pdb", ctx.name())))?;
        stmt.variables
            .insert("TARGET_PDB".to_owned(), escape_path(pdb.as_str()));
    }
    if strategy.dyndep {
        let dd = ctx.build_path(&dyndep_path(ctx.layout.object_dir(), &plan.language))?;
        stmt.order_only.push(dd.clone());
        stmt.variables
            .insert("dyndep".to_owned(), escape_path(dd.as_str()));
    }

    apply_response_file(ctx, session, sink, &mut stmt, rules, entry, &fragments, depfile.as_deref())?;

    if ctx.config.export_compile_commands {
        let command = compile_command_text(&rules.compile.command, &stmt, &fragments);
        sink.export_compile_command(CompileCommand::new(
            ctx.resolver.build_root(),
            ctx.resolver.absolute(&plan.source.path),
            object.clone(),
            command,
        ))
        .map_err(ctx.sink_error("compile commands"))?;
    }

    sink.write_build(&stmt).map_err(ctx.sink_error("build"))?;
    session.add_object(plan.object.clone());
    Ok(stmt)
}

#[expect(
    clippy::too_many_arguments,
    reason = "response file selection needs the full statement context"
)]
fn apply_response_file(
    ctx: &TargetContext<'_>,
    session: &mut GenerationSession,
    sink: &mut dyn NinjaSink,
    stmt: &mut BuildStatement,
    rules: &LanguageRules,
    entry: &LanguageToolchain,
    fragments: &Fragments,
    depfile: Option<&Utf8Path>,
) -> Result<(), GenError> {
    let policy = ctx.target.properties.response_file;
    let forced = ctx.config.force_response_file || policy == ResponseFilePolicy::Always;
    let object = stmt.outputs.first().map_or("", |p| p.as_str());
    let input = stmt.inputs.first().map_or("", |p| p.as_str());
    let estimated = rules.compile.command.len()
        + fragments.defines.len()
        + fragments.includes.len()
        + fragments.flags.len()
        + object.len()
        + input.len()
        + depfile.map_or(0, |d| d.as_str().len());
    let limit = ctx.config.command_line_limit();
    let over_limit = estimated > limit;
    let allowed = policy != ResponseFilePolicy::Never && entry.supports_response_files();
    if !(allowed && (forced || over_limit)) {
        if over_limit {
            warn!(
                target_name = %ctx.name(),
                object,
                estimated,
                limit,
                "command line exceeds the limit but response files are disabled"
            );
        }
        return Ok(());
    }
    let rule = RuleEmitter::ensure_response_file_rule(session, sink, &rules.compile, COMPILE_RSP_CONTENT)?;
    let rsp = Utf8PathBuf::from(format!("{object}.rsp"));
    debug!(object, estimated, limit, "compile arguments deflected to {rsp}");
    stmt.rule = rule.name;
    stmt.variables
        .insert("RSP_FILE".to_owned(), escape_path(rsp.as_str()));
    stmt.response_file = Some(ResponseFile {
        path: rsp,
        content: fragments.response_file_content(),
    });
    Ok(())
}

fn compile_command_text(command: &str, stmt: &BuildStatement, fragments: &Fragments) -> String {
    evaluate(command, |name| match name {
        "DEFINES" => Some(fragments.define_words.join(" ")),
        "INCLUDES" => Some(fragments.include_words.join(" ")),
        "FLAGS" => Some(fragments.flag_words.join(" ")),
        "in" => Some(join_paths(&stmt.inputs)),
        "out" => Some(join_paths(&stmt.outputs)),
        other => stmt.variable(other).map(|value| evaluate(value, |_| None)),
    })
}

fn join_paths(paths: &[Utf8PathBuf]) -> String {
    paths
        .iter()
        .map(Utf8PathBuf::as_path)
        .map(Utf8Path::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}
