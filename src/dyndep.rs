//! Module dependency discovery.
//!
//! Languages with inter-module ordering scan every source before compiling
//! it. Each scan writes a `.ddi` file; one collation statement per language
//! combines them into the `<LANG>.dd` dyndep file that every object of that
//! language order-depends on. The collator learns about the target from the
//! depend-info JSON written next to the objects.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::TargetContext;
use crate::error::GenError;
use crate::ir::{BuildStatement, Rule};
use crate::model::{Language, LinkItem};
use crate::ninja_gen::escape_path;
use crate::rules::sanitize;
use crate::session::GenerationSession;
use crate::sink::{NinjaSink, Workspace};
use crate::toolchain::CompilerFamily;

/// Scan output of one object.
#[must_use]
pub fn ddi_path(object: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{object}.ddi"))
}

/// Collated dyndep file of `language`.
#[must_use]
pub fn dyndep_path(object_dir: &Utf8Path, language: &Language) -> Utf8PathBuf {
    object_dir.join(format!("{}.dd", sanitize(language.as_str())))
}

/// Depend-info file of `language`.
#[must_use]
pub fn depend_info_path(object_dir: &Utf8Path, language: &Language) -> Utf8PathBuf {
    object_dir.join(format!("{}DependInfo.json", sanitize(language.as_str())))
}

/// Persisted preprocessor output for `source`, placed beside its object.
///
/// The extension is lower-cased so the compile step does not preprocess the
/// file a second time.
///
/// ```
/// use camino::Utf8Path;
/// use tsugite::dyndep::preprocessed_path;
///
/// let pp = preprocessed_path(Utf8Path::new("app.dir/src/mod.F90.o"), ".o", Utf8Path::new("src/mod.F90"));
/// assert_eq!(pp.as_str(), "app.dir/src/mod-pp.f90");
/// ```
#[must_use]
pub fn preprocessed_path(object: &Utf8Path, object_extension: &str, source: &Utf8Path) -> Utf8PathBuf {
    let name = object.file_name().unwrap_or("source");
    let base = name.strip_suffix(object_extension).unwrap_or(name);
    let file = match source.extension() {
        Some(ext) => {
            let stem = base.strip_suffix(&format!(".{ext}")).unwrap_or(base);
            format!("{stem}-pp.{}", ext.to_ascii_lowercase())
        }
        None => format!("{base}-pp"),
    };
    object.with_file_name(file)
}

/// What the collation command needs to know about a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetDependInfo {
    /// Language the scan results belong to.
    pub language: Language,
    /// Compiler family that produced the scan results.
    pub compiler_id: CompilerFamily,
    /// Target include directories in executor form.
    pub include_dirs: Vec<Utf8PathBuf>,
    /// Directory module files are written to.
    pub module_dir: Utf8PathBuf,
    /// Object directories of linked targets, searched for modules.
    pub linked_target_dirs: Vec<Utf8PathBuf>,
    /// Scan outputs in source order.
    pub ddi_files: Vec<Utf8PathBuf>,
}

impl TargetDependInfo {
    /// Collect the depend info of `language` for the current target.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownLanguage`] when the toolchain lacks the
    /// language, [`GenError::UnknownTarget`] for unknown linked targets and
    /// [`GenError::InvalidPath`] for unrepresentable paths.
    pub fn collect(
        ctx: &TargetContext<'_>,
        session: &GenerationSession,
        language: &Language,
    ) -> Result<Self, GenError> {
        let entry = ctx
            .toolchain
            .get(language)
            .ok_or_else(|| GenError::UnknownLanguage {
                target: ctx.name().to_owned(),
                language: language.to_string(),
            })?;
        let include_dirs = ctx
            .target
            .properties
            .include_directories
            .iter()
            .map(|dir| ctx.project_path(&dir.path))
            .collect::<Result<_, _>>()?;
        let mut linked_target_dirs = Vec::new();
        for item in &ctx.target.link_items {
            if let LinkItem::Target(name) = item {
                let info = ctx.dependency(name)?;
                linked_target_dirs.push(ctx.build_path(&info.object_dir)?);
            }
        }
        let ddi_files = session
            .ddi_files(language)
            .iter()
            .map(|ddi| ctx.build_path(ddi))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            language: language.clone(),
            compiler_id: entry.family,
            include_dirs,
            module_dir: ctx.build_path(ctx.layout.object_dir())?,
            linked_target_dirs,
            ddi_files,
        })
    }
}

/// Persist the depend info of `language` and return its build-root-relative
/// path. The file is only rewritten when its content changes.
///
/// # Errors
///
/// Returns [`GenError::FileWrite`] when the file cannot be written and the
/// errors of [`TargetDependInfo::collect`].
pub fn write_target_depend_info(
    ctx: &TargetContext<'_>,
    session: &GenerationSession,
    workspace: &dyn Workspace,
    language: &Language,
) -> Result<Utf8PathBuf, GenError> {
    let info = TargetDependInfo::collect(ctx, session, language)?;
    let path = depend_info_path(ctx.layout.object_dir(), language);
    let write_error = |source| GenError::FileWrite {
        target: ctx.name().to_owned(),
        path: path.clone(),
        source,
    };
    let mut text = serde_json::to_string_pretty(&info)
        .map_err(|err| write_error(std::io::Error::other(err)))?;
    text.push('\n');
    if workspace
        .write_if_changed(&path, text.as_bytes())
        .map_err(write_error)?
    {
        info!("Wrote {path}");
    }
    Ok(path)
}

/// Emit the collation statement producing the dyndep file of `language`.
///
/// # Errors
///
/// Returns [`GenError::InvalidPath`] or [`GenError::Sink`].
pub fn write_collation_statement(
    ctx: &TargetContext<'_>,
    session: &GenerationSession,
    sink: &mut dyn NinjaSink,
    rule: &Rule,
    language: &Language,
    depend_info: &Utf8Path,
) -> Result<BuildStatement, GenError> {
    let dd = ctx.build_path(&dyndep_path(ctx.layout.object_dir(), language))?;
    let info = ctx.build_path(depend_info)?;
    let mut stmt = BuildStatement::new(rule.name.clone())
        .with_output(dd)
        .with_variable("DEPEND_INFO", escape_path(info.as_str()));
    for ddi in session.ddi_files(language) {
        stmt.inputs.push(ctx.build_path(ddi)?);
    }
    stmt.implicit_inputs.push(info);
    stmt.comment = Some(format!("Dyndep collation for {language} sources of {}", ctx.name()));
    sink.write_build(&stmt).map_err(ctx.sink_error("build"))?;
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("d/a.F90.o", ".o", "src/a.F90", "d/a-pp.f90")]
    #[case("d/a.F90.1a2b3c4d.o", ".o", "x/a.F90", "d/a.F90.1a2b3c4d-pp.f90")]
    #[case("d/Makefile.o", ".o", "Makefile", "d/Makefile-pp")]
    fn preprocessed_paths_follow_objects(
        #[case] object: &str,
        #[case] ext: &str,
        #[case] source: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(
            preprocessed_path(Utf8Path::new(object), ext, Utf8Path::new(source)),
            expected
        );
    }

    #[rstest]
    fn depend_info_uses_kebab_case_keys() {
        let info = TargetDependInfo {
            language: Language::from("Fortran"),
            compiler_id: CompilerFamily::Gnu,
            include_dirs: vec![],
            module_dir: "app.dir".into(),
            linked_target_dirs: vec![],
            ddi_files: vec!["app.dir/a.f90.o.ddi".into()],
        };
        let value = serde_json::to_value(&info).expect("serialise");
        assert_eq!(value.get("compiler-id").and_then(|v| v.as_str()), Some("gnu"));
        assert!(value.get("ddi-files").is_some());
        assert!(value.get("linked-target-dirs").is_some());
    }

    #[rstest]
    fn paths_are_scoped_to_the_object_dir() {
        let fortran = Language::from("Fortran");
        assert_eq!(dyndep_path(Utf8Path::new("app.dir"), &fortran), "app.dir/Fortran.dd");
        assert_eq!(
            depend_info_path(Utf8Path::new("app.dir"), &fortran),
            "app.dir/FortranDependInfo.json"
        );
        assert_eq!(ddi_path(Utf8Path::new("app.dir/a.f90.o")), "app.dir/a.f90.o.ddi");
    }
}
