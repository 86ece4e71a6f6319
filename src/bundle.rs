//! Placement of non-compiled resources inside an application bundle.
//!
//! Resources are reported one at a time through a placement callback. Files
//! sharing a destination folder are grouped so that each folder gets exactly
//! one placement statement no matter how many files land in it.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::debug;

use crate::context::TargetContext;
use crate::error::GenError;
use crate::ir::{BuildStatement, Rule};
use crate::model::{SourceFile, Target};
use crate::ninja_gen::escape_value;
use crate::path::shell_word;
use crate::rules::bundle_rule_name;
use crate::session::GenerationSession;
use crate::sink::{NinjaSink, Workspace};

/// One resource and where it is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacContentEntry {
    /// Resource in executor form.
    pub source: Utf8PathBuf,
    /// Build-root-relative destination folder.
    pub folder: Utf8PathBuf,
    /// Build-root-relative destination file.
    pub destination: Utf8PathBuf,
}

/// Call `place` for every resource of `target` with its bundle location.
///
/// # Errors
///
/// Stops at and returns the first error `place` reports.
pub fn visit_bundle_content<F>(target: &Target, mut place: F) -> Result<(), GenError>
where
    F: FnMut(&SourceFile, &Utf8Path) -> Result<(), GenError>,
{
    for source in &target.sources {
        if let Some(location) = &source.bundle_location {
            place(source, location)?;
        }
    }
    Ok(())
}

/// Collects bundle resources and writes their placement statements.
#[derive(Debug, Default)]
pub struct BundleContentGenerator {
    folders: IndexMap<Utf8PathBuf, Vec<MacContentEntry>>,
    destinations: HashSet<Utf8PathBuf>,
}

impl BundleContentGenerator {
    /// An empty generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `source` for placement under `location` inside the bundle
    /// content tree. The folder is created the first time it is seen.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::DuplicateBundleContent`] when another resource
    /// already maps to the same file, [`GenError::DirectoryCreation`] when
    /// the folder cannot be created and [`GenError::InvalidPath`] for
    /// unrepresentable paths.
    pub fn add(
        &mut self,
        ctx: &TargetContext<'_>,
        session: &mut GenerationSession,
        workspace: &dyn Workspace,
        source: &SourceFile,
        location: &Utf8Path,
    ) -> Result<(), GenError> {
        let folder = ctx.layout.bundle_content_dir().join(location);
        let file = source.path.file_name().unwrap_or(source.path.as_str());
        let destination = folder.join(file);
        if !self.destinations.insert(destination.clone()) {
            return Err(GenError::DuplicateBundleContent {
                target: ctx.name().to_owned(),
                destination,
            });
        }
        if session.add_mac_content_folder(&folder) {
            workspace
                .ensure_directory(&folder)
                .map_err(|source| GenError::DirectoryCreation {
                    target: ctx.name().to_owned(),
                    path: folder.clone(),
                    source,
                })?;
        }
        debug!(resource = %source.path, folder = %folder, "bundle content recorded");
        let entry = MacContentEntry {
            source: ctx.project_path(&source.path)?,
            folder: folder.clone(),
            destination,
        };
        self.folders.entry(folder).or_default().push(entry);
        Ok(())
    }

    /// Recorded entries grouped by folder, in first-seen order.
    pub fn entries(&self) -> impl Iterator<Item = &MacContentEntry> {
        self.folders.values().flatten()
    }

    /// Whether no resources were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Emit the placement rule and one statement per folder. Returns the
    /// placed files in executor form.
    ///
    /// # Errors
    ///
    /// Returns sink, rule conflict and path errors.
    pub fn finish(
        self,
        ctx: &TargetContext<'_>,
        session: &mut GenerationSession,
        sink: &mut dyn NinjaSink,
    ) -> Result<Vec<Utf8PathBuf>, GenError> {
        if self.folders.is_empty() {
            return Ok(Vec::new());
        }
        let rule = Rule {
            description: Some("Copying bundle content to $DEST_DIR".to_owned()),
            ..Rule::new(
                bundle_rule_name(ctx.name()),
                "mkdir -p $DEST_DIR && cp -R $in $DEST_DIR",
            )
        };
        session.emit_rule(sink, &rule)?;
        let mut placed = Vec::new();
        for (folder, entries) in self.folders {
            let dest_dir = ctx.build_path(&folder)?;
            let mut stmt = BuildStatement::new(rule.name.clone()).with_variable(
                "DEST_DIR",
                escape_value(&shell_word(dest_dir.as_str(), ctx.config.platform)),
            );
            stmt.comment = Some(format!("Bundle content in {dest_dir}"));
            for entry in entries {
                let output = ctx.build_path(&entry.destination)?;
                stmt.outputs.push(output.clone());
                stmt.inputs.push(entry.source);
                placed.push(output);
            }
            sink.write_build(&stmt).map_err(ctx.sink_error("build"))?;
        }
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeneratorConfig, Platform};
    use crate::model::{ArtifactKind, NoTargets};
    use crate::sink::{BufferedSink, MemoryWorkspace};
    use crate::toolchain::Toolchain;
    use rstest::rstest;

    fn bundle() -> Target {
        Target::new("Viewer", ArtifactKind::Bundle)
            .with_source(SourceFile::new("res/icon.icns").in_bundle("Resources"))
            .with_source(SourceFile::new("res/en.lproj").in_bundle("Resources"))
            .with_source(SourceFile::new("fw/Sparkle.framework").in_bundle("Frameworks"))
            .with_source(SourceFile::new("src/main.c"))
    }

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            source_root: "/work/proj".into(),
            build_root: "build".into(),
            platform: Platform::MacOs,
            ..GeneratorConfig::default()
        }
    }

    #[rstest]
    fn one_statement_per_folder() {
        let target = bundle();
        let toolchain = Toolchain::default();
        let config = config();
        let ctx = TargetContext::new(&target, &toolchain, &config, &NoTargets);
        let mut session = GenerationSession::new("Viewer");
        let workspace = MemoryWorkspace::new();
        let mut generator = BundleContentGenerator::new();
        visit_bundle_content(&target, |source, location| {
            generator.add(&ctx, &mut session, &workspace, source, location)
        })
        .expect("record content");
        assert_eq!(generator.entries().count(), 3);

        let mut sink = BufferedSink::new();
        let placed = generator
            .finish(&ctx, &mut session, &mut sink)
            .expect("finish");
        assert_eq!(placed.len(), 3);
        assert_eq!(sink.rules().count(), 1);
        let builds: Vec<_> = sink.builds().collect();
        assert_eq!(builds.len(), 2);
        let resources = builds.first().expect("resources statement");
        assert_eq!(
            resources.variable("DEST_DIR"),
            Some("Viewer.app/Contents/Resources")
        );
        assert_eq!(
            resources.outputs,
            vec![
                Utf8PathBuf::from("Viewer.app/Contents/Resources/icon.icns"),
                Utf8PathBuf::from("Viewer.app/Contents/Resources/en.lproj"),
            ]
        );
        assert_eq!(
            workspace.directories(),
            vec![
                Utf8PathBuf::from("Viewer.app/Contents/Frameworks"),
                Utf8PathBuf::from("Viewer.app/Contents/Resources"),
            ]
        );
    }

    #[rstest]
    fn duplicate_destinations_are_rejected() {
        let target = Target::new("Viewer", ArtifactKind::Bundle)
            .with_source(SourceFile::new("a/icon.png").in_bundle("Resources"))
            .with_source(SourceFile::new("b/icon.png").in_bundle("Resources"));
        let toolchain = Toolchain::default();
        let config = config();
        let ctx = TargetContext::new(&target, &toolchain, &config, &NoTargets);
        let mut session = GenerationSession::new("Viewer");
        let workspace = MemoryWorkspace::new();
        let mut generator = BundleContentGenerator::new();
        let err = visit_bundle_content(&target, |source, location| {
            generator.add(&ctx, &mut session, &workspace, source, location)
        })
        .expect_err("duplicate");
        assert!(matches!(err, GenError::DuplicateBundleContent { .. }));
    }

    #[rstest]
    fn empty_generators_emit_nothing() {
        let target = Target::new("Viewer", ArtifactKind::Bundle);
        let toolchain = Toolchain::default();
        let config = config();
        let ctx = TargetContext::new(&target, &toolchain, &config, &NoTargets);
        let mut session = GenerationSession::new("Viewer");
        let mut sink = BufferedSink::new();
        let placed = BundleContentGenerator::new()
            .finish(&ctx, &mut session, &mut sink)
            .expect("finish");
        assert!(placed.is_empty());
        assert!(sink.events().is_empty());
    }
}
