//! Lowering of one target into rules and build statements.
//!
//! [`TargetGenerator::new`] picks the generation flow from the artifact
//! kind; [`TargetGenerator::generate`] then runs the whole pipeline for the
//! target, appending to the injected sink:
//!
//! 1. per-language rules,
//! 2. object planning (language resolution and object path reservation),
//! 3. the order-depends phony edge,
//! 4. depend info and collation for languages with module scanning,
//! 5. preprocess and object statements per source,
//! 6. bundle content placement,
//! 7. the link statement and the target alias.
//!
//! ```
//! use tsugite::config::{GeneratorConfig, Platform};
//! use tsugite::generator::TargetGenerator;
//! use tsugite::model::{ArtifactKind, NoTargets, SourceFile, Target};
//! use tsugite::sink::{BufferedSink, MemoryWorkspace};
//! use tsugite::toolchain::{CompilerFamily, LanguageToolchain, Toolchain};
//!
//! let toolchain = Toolchain::default().with_language(
//!     "C",
//!     LanguageToolchain {
//!         extensions: vec!["c".into()],
//!         ..LanguageToolchain::new("cc", CompilerFamily::Gnu)
//!     },
//! );
//! let target = Target::new("hello", ArtifactKind::Executable)
//!     .with_language("C")
//!     .with_source(SourceFile::new("hello.c"));
//! let config = GeneratorConfig {
//!     source_root: "/src".into(),
//!     platform: Platform::Linux,
//!     ..GeneratorConfig::default()
//! };
//! let mut generator = TargetGenerator::new(&target, &toolchain, &config, &NoTargets);
//! let mut sink = BufferedSink::new();
//! generator.generate(&mut sink, &MemoryWorkspace::new()).expect("generate");
//! assert_eq!(generator.objects().len(), 1);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::bundle::{BundleContentGenerator, visit_bundle_content};
use crate::config::GeneratorConfig;
use crate::context::TargetContext;
use crate::dyndep::{write_collation_statement, write_target_depend_info};
use crate::error::GenError;
use crate::ir::BuildStatement;
use crate::link::write_link_statement;
use crate::model::{ArtifactKind, Language, SourceFile, Target, TargetLookup};
use crate::rules::LanguageRules;
use crate::session::GenerationSession;
use crate::sink::{NinjaSink, Workspace};
use crate::statements::{
    ObjectPlan, plan_object, resolve_language, write_object_statement, write_order_depends,
    write_preprocess_statement,
};
use crate::toolchain::Toolchain;

/// Generation flow selected by artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorVariant {
    /// Compiles sources and links or archives them.
    Binary,
    /// Produces no compiled outputs; only orders its dependencies.
    Utility,
}

impl GeneratorVariant {
    /// Flow used for `kind`.
    #[must_use]
    pub const fn for_kind(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Executable
            | ArtifactKind::StaticLibrary
            | ArtifactKind::SharedLibrary
            | ArtifactKind::Module
            | ArtifactKind::Bundle => Self::Binary,
            ArtifactKind::Utility => Self::Utility,
        }
    }
}

/// Generates the build description of one target.
pub struct TargetGenerator<'a> {
    ctx: TargetContext<'a>,
    session: GenerationSession,
    variant: GeneratorVariant,
}

impl<'a> TargetGenerator<'a> {
    /// Create the generator for `target`.
    #[must_use]
    pub fn new(
        target: &'a Target,
        toolchain: &'a Toolchain,
        config: &'a GeneratorConfig,
        lookup: &'a dyn TargetLookup,
    ) -> Self {
        Self {
            ctx: TargetContext::new(target, toolchain, config, lookup),
            session: GenerationSession::new(target.name.clone()),
            variant: GeneratorVariant::for_kind(target.kind),
        }
    }

    /// Name of the target.
    #[must_use]
    pub fn target_name(&self) -> &str {
        self.ctx.name()
    }

    /// Flow in use.
    #[must_use]
    pub const fn variant(&self) -> GeneratorVariant {
        self.variant
    }

    /// Objects written so far, build-root-relative.
    #[must_use]
    pub fn objects(&self) -> &[Utf8PathBuf] {
        self.session.objects()
    }

    /// Emit everything the target needs.
    ///
    /// Output already appended to `sink` is not withdrawn when generation
    /// fails part way.
    ///
    /// # Errors
    ///
    /// Returns the first configuration, resource or policy error met.
    pub fn generate(
        &mut self,
        sink: &mut dyn NinjaSink,
        workspace: &dyn Workspace,
    ) -> Result<(), GenError> {
        debug!(target_name = %self.ctx.name(), variant = ?self.variant, "generating target");
        sink.write_comment(&format!(
            "{} target {}",
            capitalise(self.ctx.target.kind.describe()),
            self.ctx.name()
        ))
        .map_err(self.ctx.sink_error("build"))?;
        match self.variant {
            GeneratorVariant::Binary => self.generate_binary(sink, workspace),
            GeneratorVariant::Utility => self.generate_utility(sink),
        }
    }

    fn generate_binary(
        &mut self,
        sink: &mut dyn NinjaSink,
        workspace: &dyn Workspace,
    ) -> Result<(), GenError> {
        let ctx = &self.ctx;
        let target: &'a Target = ctx.target;
        for dir in [ctx.layout.object_dir(), ctx.layout.output_dir()] {
            ensure_directory(ctx, workspace, dir)?;
        }
        for source in target.sources.iter().filter(|s| s.generated) {
            self.session.add_custom_output(ctx.project_path(&source.path)?);
        }

        let compiled = compiled_sources(ctx, target)?;
        let mut rules: IndexMap<Language, LanguageRules> = IndexMap::new();
        let used: IndexSet<&Language> = compiled.iter().map(|(_, lang)| lang).collect();
        for language in used {
            let emitted = ctx
                .emitter()
                .write_language_rules(&mut self.session, sink, language)?;
            rules.insert(language.clone(), emitted);
        }

        let mut plans: Vec<ObjectPlan<'a>> = Vec::with_capacity(compiled.len());
        for (source, language) in compiled {
            let Some(language_rules) = rules.get(&language) else {
                continue;
            };
            plans.push(plan_object(
                ctx,
                &mut self.session,
                source,
                language,
                &language_rules.strategy,
            )?);
        }

        let order_depends = write_order_depends(ctx, &self.session, sink)?;

        for (language, language_rules) in &rules {
            if let Some(collate) = &language_rules.collate {
                let info = write_target_depend_info(ctx, &self.session, workspace, language)?;
                write_collation_statement(ctx, &self.session, sink, collate, language, &info)?;
            }
        }

        for plan in &plans {
            let Some(language_rules) = rules.get(&plan.language) else {
                continue;
            };
            write_preprocess_statement(ctx, sink, plan, language_rules, &order_depends)?;
            write_object_statement(
                ctx,
                &mut self.session,
                sink,
                plan,
                language_rules,
                &order_depends,
            )?;
        }

        let placed = self.write_bundle_content(sink, workspace)?;

        let ctx = &self.ctx;
        let artifact = match target.link_language() {
            Some(language) => {
                write_link_statement(ctx, &mut self.session, sink, language)?
                    .and_then(|stmt| stmt.outputs.first().cloned())
            }
            None => {
                debug!(target_name = %ctx.name(), "no link language, skipping link step");
                None
            }
        };
        write_alias(ctx, sink, artifact, placed, self.session.objects())
    }

    fn write_bundle_content(
        &mut self,
        sink: &mut dyn NinjaSink,
        workspace: &dyn Workspace,
    ) -> Result<Vec<Utf8PathBuf>, GenError> {
        let ctx = &self.ctx;
        let session = &mut self.session;
        if !ctx.layout.is_app_bundle() {
            for source in ctx.target.sources.iter().filter(|s| s.bundle_location.is_some()) {
                debug!(resource = %source.path, "not an application bundle, resource ignored");
            }
            return Ok(Vec::new());
        }
        let mut bundle = BundleContentGenerator::new();
        visit_bundle_content(ctx.target, |source, location| {
            bundle.add(ctx, session, workspace, source, location)
        })?;
        bundle.finish(ctx, session, sink)
    }

    fn generate_utility(&self, sink: &mut dyn NinjaSink) -> Result<(), GenError> {
        let ctx = &self.ctx;
        let mut stmt = BuildStatement::phony(ctx.name());
        for source in ctx.target.sources.iter().filter(|s| s.generated) {
            stmt.inputs.push(ctx.project_path(&source.path)?);
        }
        for dep in &ctx.target.order_dependencies {
            let info = ctx.dependency(dep)?;
            stmt.order_only.push(match info.artifact {
                Some(artifact) => ctx.build_path(&artifact)?,
                None => Utf8PathBuf::from(info.name),
            });
        }
        sink.write_build(&stmt).map_err(ctx.sink_error("build"))
    }
}

/// Sources that are compiled, paired with their language.
fn compiled_sources<'t>(
    ctx: &TargetContext<'_>,
    target: &'t Target,
) -> Result<Vec<(&'t SourceFile, Language)>, GenError> {
    let mut compiled = Vec::new();
    for source in &target.sources {
        match resolve_language(ctx, source)? {
            Some(language) => compiled.push((source, language)),
            None => debug!(source = %source.path, "not compiled"),
        }
    }
    Ok(compiled)
}

fn ensure_directory(
    ctx: &TargetContext<'_>,
    workspace: &dyn Workspace,
    dir: &Utf8Path,
) -> Result<(), GenError> {
    workspace
        .ensure_directory(dir)
        .map_err(|source| GenError::DirectoryCreation {
            target: ctx.name().to_owned(),
            path: dir.to_path_buf(),
            source,
        })
}

/// `build <name>: phony <outputs>`, unless the artifact already carries
/// the target's name. Targets without an artifact alias their objects.
fn write_alias(
    ctx: &TargetContext<'_>,
    sink: &mut dyn NinjaSink,
    artifact: Option<Utf8PathBuf>,
    placed: Vec<Utf8PathBuf>,
    objects: &[Utf8PathBuf],
) -> Result<(), GenError> {
    if artifact.as_deref().is_some_and(|a| a.as_str() == ctx.name()) {
        return Ok(());
    }
    let mut alias = BuildStatement::phony(ctx.name());
    match artifact {
        Some(path) => alias.inputs.push(path),
        None => {
            for object in objects {
                alias.inputs.push(ctx.build_path(object)?);
            }
        }
    }
    alias.inputs.extend(placed);
    sink.write_build(&alias).map_err(ctx.sink_error("build"))
}

fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
