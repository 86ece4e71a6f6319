//! Path resolution helpers for the runner module.

use std::path::Path;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

use super::RunnerError;
use crate::cli::Cli;

/// UTF-8 form of a command line path.
pub(super) fn to_utf8(path: &Path) -> Result<Utf8PathBuf, RunnerError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|p| RunnerError::NonUtf8Path {
        path: p.display().to_string(),
    })
}

/// Determine the manifest path respecting the CLI's directory option.
///
/// # Errors
///
/// Returns an error when the CLI `file` or `directory` paths are not valid
/// UTF-8.
pub(super) fn resolve_manifest_path(cli: &Cli) -> Result<Utf8PathBuf> {
    let file = to_utf8(&cli.file)?;
    let resolved = match &cli.directory {
        Some(dir) => to_utf8(dir)?.join(&file),
        None => file,
    };
    Ok(resolved)
}

/// Fail with [`RunnerError::ManifestNotFound`] unless `path` is a file.
pub(super) fn ensure_manifest_exists(manifest_path: &Utf8Path) -> Result<()> {
    if manifest_path.is_file() {
        return Ok(());
    }
    let directory = manifest_path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .map_or_else(|| "the current directory".to_owned(), |p| format!("'{p}'"));
    Err(RunnerError::ManifestNotFound {
        manifest_name: manifest_path
            .file_name()
            .unwrap_or(manifest_path.as_str())
            .to_owned(),
        directory,
        path: manifest_path.to_path_buf(),
    }
    .into())
}

/// Absolute form of `path` when it exists; the path unchanged otherwise.
pub(super) fn canonical_or_given(path: &Utf8Path) -> Utf8PathBuf {
    path.canonicalize_utf8().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    fn directory_option_prefixes_the_manifest() {
        let cli = Cli {
            directory: Some(PathBuf::from("proj")),
            ..Cli::default()
        };
        let path = resolve_manifest_path(&cli).expect("path");
        assert_eq!(path, Utf8PathBuf::from("proj/tsugite.yml"));
    }

    #[rstest]
    fn missing_manifests_name_the_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("tsugite.yml")).expect("utf8");
        let err = ensure_manifest_exists(&path).expect_err("missing");
        let runner = err.downcast_ref::<RunnerError>().expect("runner error");
        assert!(matches!(
            runner,
            RunnerError::ManifestNotFound { manifest_name, .. } if manifest_name == "tsugite.yml"
        ));
    }
}
