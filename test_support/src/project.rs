//! Temporary project directories for command line tests.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tempfile::TempDir;

/// A temporary directory holding a manifest and its sources.
#[derive(Debug)]
pub struct TempProject {
    _dir: TempDir,
    root: Utf8PathBuf,
    handle: Dir,
}

impl TempProject {
    /// Create an empty project directory.
    ///
    /// # Panics
    ///
    /// Panics when the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let handle = Dir::open_ambient_dir(&root, ambient_authority()).expect("open temp dir");
        Self {
            _dir: dir,
            root,
            handle,
        }
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Write `contents` to `path`, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics when the file cannot be written.
    pub fn write(&self, path: &str, contents: &str) {
        if let Some(parent) = Utf8Path::new(path).parent().filter(|p| !p.as_str().is_empty()) {
            self.handle.create_dir_all(parent).expect("create parent");
        }
        self.handle.write(path, contents).expect("write file");
    }

    /// Read `path` as text.
    ///
    /// # Panics
    ///
    /// Panics when the file cannot be read.
    #[must_use]
    pub fn read(&self, path: &str) -> String {
        self.handle.read_to_string(path).expect("read file")
    }

    /// Whether `path` exists.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.handle.exists(path)
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}
