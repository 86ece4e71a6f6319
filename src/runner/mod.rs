//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point,
//! [`run`]. Targets are lowered in parallel, each into its own
//! [`BufferedSink`], and the buffers are replayed into the output files in
//! manifest order so the result does not depend on scheduling.

mod error;
mod path_helpers;

pub use error::RunnerError;

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use tracing::{debug, info};

use crate::cli::{Cli, Commands, GenerateArgs};
use crate::compile_commands::{self, CompileCommand};
use crate::error::GenError;
use crate::generator::TargetGenerator;
use crate::ir::BuildStatement;
use crate::manifest::{ManifestLookup, ProjectManifest};
use crate::model::{LinkItem, Target};
use crate::ninja_gen::{render_build, render_default};
use crate::path::PathResolver;
use crate::sink::{BufferedSink, DiskWorkspace, MemoryWorkspace, TextSink, Workspace};

use path_helpers::{canonical_or_given, ensure_manifest_exists, resolve_manifest_path, to_utf8};

/// Minimum executor version the generated files rely on.
pub const NINJA_REQUIRED_VERSION: &str = "1.10";
/// Name of the aggregate target built by default.
pub const ALL_TARGET: &str = "all";
/// File name of the compilation database.
pub const COMPILE_COMMANDS_FILE: &str = "compile_commands.json";

/// Execute the parsed [`Cli`] command.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded, a target fails to
/// generate or an output file cannot be written.
pub fn run(cli: &Cli) -> Result<()> {
    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| Commands::Generate(GenerateArgs::default()));
    match command {
        Commands::Generate(args) => handle_generate(cli, &args),
        Commands::Check => handle_check(cli),
    }
}

/// Text produced for a set of targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedProject {
    /// Every rule definition.
    pub rules: String,
    /// Build statements of every target, without the file header.
    pub body: String,
    /// Compilation database entries, when enabled.
    pub compile_commands: Vec<CompileCommand>,
    /// Names of the generated targets in manifest order.
    pub targets: Vec<String>,
}

impl GeneratedProject {
    /// Complete build file that includes `rules_file`.
    ///
    /// ```
    /// use tsugite::runner::GeneratedProject;
    ///
    /// let project = GeneratedProject {
    ///     targets: vec!["app".into()],
    ///     ..GeneratedProject::default()
    /// };
    /// let text = project.build_file("rules.ninja".as_ref());
    /// assert!(text.starts_with("ninja_required_version = 1.10\n"));
    /// assert!(text.ends_with("build all: phony app\n\ndefault all\n"));
    /// ```
    #[must_use]
    pub fn build_file(&self, rules_file: &Utf8Path) -> String {
        let mut all = BuildStatement::phony(ALL_TARGET);
        all.inputs = self.targets.iter().map(Utf8PathBuf::from).collect();
        format!(
            "ninja_required_version = {NINJA_REQUIRED_VERSION}\n\ninclude {rules_file}\n\n{}{}{}",
            self.body,
            render_build(&all),
            render_default(&[Utf8PathBuf::from(ALL_TARGET)]),
        )
    }
}

/// Lower the selected targets of `manifest`.
///
/// An empty `selection` generates every target. Up to `jobs` targets are
/// generated at once; output order always follows the manifest.
///
/// # Errors
///
/// Returns [`RunnerError::UnknownTarget`] for a selection the manifest does not
/// define, or the first target failure in manifest order.
pub fn generate_project(
    manifest: &ProjectManifest,
    selection: &[String],
    jobs: usize,
    workspace: &dyn Workspace,
) -> Result<GeneratedProject> {
    let targets = select_targets(manifest, selection)?;
    let lookup = manifest.lookup();
    let shared = Shared {
        manifest,
        lookup: &lookup,
        targets: &targets,
        workspace,
    };
    let buffers = generate_buffers(shared, jobs)?;

    let mut text = TextSink::new(Vec::new(), Vec::new());
    for (target, mut buffer) in targets.iter().zip(buffers) {
        buffer
            .drain_into(&mut text)
            .with_context(|| format!("collecting output of target {}", target.name))?;
    }
    let (rules, body, commands) = text.finish().context("flushing generated output")?;
    Ok(GeneratedProject {
        rules: String::from_utf8(rules).context("rules output is not UTF-8")?,
        body: String::from_utf8(body).context("build output is not UTF-8")?,
        compile_commands: commands,
        targets: targets.iter().map(|t| t.name.clone()).collect(),
    })
}

fn select_targets<'m>(
    manifest: &'m ProjectManifest,
    selection: &[String],
) -> Result<Vec<&'m Target>, RunnerError> {
    if selection.is_empty() {
        return Ok(manifest.targets.iter().collect());
    }
    for name in selection {
        if manifest.target(name).is_none() {
            return Err(RunnerError::UnknownTarget {
                name: name.clone(),
                available: manifest.targets.iter().map(|t| t.name.as_str()).join(", "),
            });
        }
    }
    let closed = dependency_closure(manifest, selection);
    Ok(manifest
        .targets
        .iter()
        .filter(|t| closed.contains(t.name.as_str()))
        .collect())
}

/// Names of the selected targets and everything they link or order-depend
/// on, transitively. Unknown dependency names are left for the generator to
/// report.
fn dependency_closure<'m>(
    manifest: &'m ProjectManifest,
    selection: &'m [String],
) -> HashSet<&'m str> {
    let mut closed = HashSet::new();
    let mut pending: Vec<&str> = selection.iter().map(String::as_str).collect();
    while let Some(name) = pending.pop() {
        if !closed.insert(name) {
            continue;
        }
        let Some(target) = manifest.target(name) else {
            continue;
        };
        let linked = target.link_items.iter().filter_map(|item| match item {
            LinkItem::Target(dep) => Some(dep.as_str()),
            LinkItem::File(_) | LinkItem::Flag(_) => None,
        });
        pending.extend(linked.chain(target.order_dependencies.iter().map(String::as_str)));
    }
    debug!(
        selected = selection.len(),
        closed = closed.len(),
        "selection closed over dependencies"
    );
    closed
}

/// Inputs every generation worker reads.
#[derive(Clone, Copy)]
struct Shared<'a> {
    manifest: &'a ProjectManifest,
    lookup: &'a ManifestLookup,
    targets: &'a [&'a Target],
    workspace: &'a dyn Workspace,
}

type Outcome = (usize, Result<BufferedSink, GenError>);

fn generate_buffers(shared: Shared<'_>, jobs: usize) -> Result<Vec<BufferedSink>> {
    let workers = jobs.clamp(1, shared.targets.len().max(1));
    let next = AtomicUsize::new(0);
    let next = &next;
    debug!(workers, targets = shared.targets.len(), "starting generation");

    let joined = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(scope.spawn(move || worker(shared, next)));
        }
        handles
            .into_iter()
            .map(thread::ScopedJoinHandle::join)
            .collect::<Vec<_>>()
    });

    let mut outcomes: Vec<Outcome> = Vec::with_capacity(shared.targets.len());
    for result in joined {
        match result {
            Ok(done) => outcomes.extend(done),
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);

    let mut buffers = Vec::with_capacity(outcomes.len());
    for (index, outcome) in outcomes {
        let name = shared
            .targets
            .get(index)
            .map_or_else(String::new, |t| t.name.clone());
        buffers.push(outcome.with_context(|| format!("generating target {name}"))?);
    }
    Ok(buffers)
}

fn worker(shared: Shared<'_>, next: &AtomicUsize) -> Vec<Outcome> {
    let mut done = Vec::new();
    loop {
        let index = next.fetch_add(1, Ordering::Relaxed);
        let Some(target) = shared.targets.get(index) else {
            break;
        };
        done.push((index, generate_target(shared, target)));
    }
    done
}

fn generate_target(shared: Shared<'_>, target: &Target) -> Result<BufferedSink, GenError> {
    let manifest = shared.manifest;
    let mut generator =
        TargetGenerator::new(target, &manifest.toolchain, &manifest.config, shared.lookup);
    let mut buffer = BufferedSink::new();
    generator.generate(&mut buffer, shared.workspace)?;
    debug!(target_name = %target.name, objects = generator.objects().len(), "target generated");
    Ok(buffer)
}

/// Load the manifest named by `cli` with environment overrides applied.
fn load_manifest(cli: &Cli) -> Result<ProjectManifest> {
    let manifest_path = resolve_manifest_path(cli)?;
    ensure_manifest_exists(&manifest_path)?;
    let mut manifest = ProjectManifest::from_path(&manifest_path)
        .with_context(|| format!("loading manifest {manifest_path}"))?;
    manifest.config = manifest
        .config
        .with_environment()
        .context("merging TSUGITE_* environment settings")?;
    manifest.config.source_root = canonical_or_given(&manifest.config.source_root);
    debug!(
        manifest = %manifest_path,
        targets = manifest.targets.len(),
        source_root = %manifest.config.source_root,
        "manifest loaded"
    );
    Ok(manifest)
}

fn default_jobs() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn build_root(manifest: &ProjectManifest) -> Utf8PathBuf {
    PathResolver::new(
        manifest.config.source_root.clone(),
        &manifest.config.build_root,
    )
    .build_root()
    .to_path_buf()
}

fn write_output(
    workspace: &DiskWorkspace,
    root: &Utf8Path,
    name: &Utf8Path,
    text: &str,
) -> Result<()> {
    let written = workspace
        .write_if_changed(name, text.as_bytes())
        .with_context(|| format!("writing {}", root.join(name)))?;
    if written {
        info!("Wrote {}", root.join(name));
    } else {
        debug!("{} unchanged", root.join(name));
    }
    Ok(())
}

fn handle_generate(cli: &Cli, args: &GenerateArgs) -> Result<()> {
    let mut manifest = load_manifest(cli)?;
    if args.compile_commands {
        manifest.config.export_compile_commands = true;
    }
    let rules_file = to_utf8(&args.rules)?;
    let build_file = to_utf8(&args.build)?;
    let root = build_root(&manifest);
    let workspace = DiskWorkspace::open(&root)
        .with_context(|| format!("opening build root {root}"))?;

    let jobs = cli.jobs.unwrap_or_else(default_jobs);
    let project = generate_project(&manifest, &args.targets, jobs, &workspace)?;

    write_output(&workspace, &root, &rules_file, &project.rules)?;
    write_output(
        &workspace,
        &root,
        &build_file,
        &project.build_file(&rules_file),
    )?;
    if manifest.config.export_compile_commands {
        let json = compile_commands::to_json(project.compile_commands)
            .context("serialising compilation database")?;
        write_output(&workspace, &root, Utf8Path::new(COMPILE_COMMANDS_FILE), &json)?;
    }
    Ok(())
}

fn handle_check(cli: &Cli) -> Result<()> {
    let manifest = load_manifest(cli)?;
    let jobs = cli.jobs.unwrap_or_else(default_jobs);
    let project = generate_project(&manifest, &[], jobs, &MemoryWorkspace::new())?;
    info!(targets = project.targets.len(), "manifest lowers cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    const PROJECT: &str = concat!(
        "config:\n",
        "  source_root: /work/proj\n",
        "  platform: linux\n",
        "toolchain:\n",
        "  languages:\n",
        "    C: { compiler: cc, family: gnu, extensions: [c] }\n",
        "targets:\n",
        "  - name: core\n",
        "    kind: static-library\n",
        "    languages: [C]\n",
        "    sources: [src/core.c]\n",
        "  - name: app\n",
        "    kind: executable\n",
        "    languages: [C]\n",
        "    sources: [src/main.c]\n",
        "    link_items:\n",
        "      - target: core\n",
        "  - name: docs\n",
        "    kind: utility\n",
    );

    #[fixture]
    fn manifest() -> ProjectManifest {
        ProjectManifest::from_str_named(PROJECT, "tsugite.yml").expect("parse")
    }

    #[rstest]
    fn output_follows_manifest_order_for_any_job_count(manifest: ProjectManifest) {
        let serial = generate_project(&manifest, &[], 1, &MemoryWorkspace::new()).expect("serial");
        let parallel =
            generate_project(&manifest, &[], 8, &MemoryWorkspace::new()).expect("parallel");
        assert_eq!(serial, parallel);
        assert_eq!(serial.targets, ["core", "app", "docs"]);
        let core = serial.body.find("target core").expect("core comment");
        let app = serial.body.find("target app").expect("app comment");
        assert!(core < app);
    }

    #[rstest]
    fn selection_limits_generated_targets(manifest: ProjectManifest) {
        let project = generate_project(&manifest, &["docs".to_owned()], 2, &MemoryWorkspace::new())
            .expect("generate");
        assert_eq!(project.targets, ["docs"]);
        assert!(project.rules.is_empty());
        assert!(project.body.contains("build docs: phony"));
    }

    #[rstest]
    fn selection_pulls_in_linked_targets(manifest: ProjectManifest) {
        let project = generate_project(&manifest, &["app".to_owned()], 2, &MemoryWorkspace::new())
            .expect("generate");
        assert_eq!(project.targets, ["core", "app"]);
        assert!(project.body.contains("build object_order_depends_target_core: phony"));
        assert!(project.body.contains("build libcore.a: "));
        assert!(!project.body.contains("build docs: phony"));
    }

    #[rstest]
    fn unknown_selections_are_rejected(manifest: ProjectManifest) {
        let err = generate_project(&manifest, &["nope".to_owned()], 1, &MemoryWorkspace::new())
            .expect_err("unknown");
        let runner = err.downcast_ref::<RunnerError>().expect("runner error");
        assert!(matches!(runner, RunnerError::UnknownTarget { name, .. } if name == "nope"));
    }

    #[rstest]
    fn target_failures_name_the_target(mut manifest: ProjectManifest) {
        manifest.toolchain.languages.clear();
        let err = generate_project(&manifest, &[], 4, &MemoryWorkspace::new())
            .expect_err("no toolchain");
        assert!(format!("{err:#}").contains("generating target core"), "{err:#}");
    }
}
