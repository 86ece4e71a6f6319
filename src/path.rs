//! Build-root-relative path resolution and command-line quoting.
//!
//! The executor runs inside the build root, so every path written to a build
//! statement is expressed relative to it when possible. Paths outside the
//! build root stay absolute. Normalisation is purely lexical; resolving
//! symlinks is the caller's job.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use shell_quote::{QuoteRefExt, Sh};

use crate::config::Platform;

/// Converts project paths into the form the executor expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    source_root: Utf8PathBuf,
    build_root: Utf8PathBuf,
}

impl PathResolver {
    /// Create a resolver. A relative `build_root` is taken relative to
    /// `source_root`.
    ///
    /// ```
    /// use tsugite::path::PathResolver;
    ///
    /// let resolver = PathResolver::new("/work/proj", "build");
    /// assert_eq!(resolver.to_ninja_path("build/gen/x.c".as_ref()), "gen/x.c");
    /// assert_eq!(resolver.to_ninja_path("src/a.c".as_ref()), "/work/proj/src/a.c");
    /// ```
    #[must_use]
    pub fn new(source_root: impl Into<Utf8PathBuf>, build_root: impl AsRef<Utf8Path>) -> Self {
        let source_root = normalise(&source_root.into());
        let build_root = normalise(&source_root.join(build_root.as_ref()));
        Self {
            source_root,
            build_root,
        }
    }

    /// Normalised source root.
    #[must_use]
    pub fn source_root(&self) -> &Utf8Path {
        &self.source_root
    }

    /// Normalised build root.
    #[must_use]
    pub fn build_root(&self) -> &Utf8Path {
        &self.build_root
    }

    /// Absolute, normalised form of a project path.
    #[must_use]
    pub fn absolute(&self, path: &Utf8Path) -> Utf8PathBuf {
        normalise(&self.source_root.join(path))
    }

    /// Convert a project path into the executor's form.
    #[must_use]
    pub fn to_ninja_path(&self, path: &Utf8Path) -> Utf8PathBuf {
        let abs = self.absolute(path);
        abs.strip_prefix(&self.build_root)
            .map_or_else(|_| abs.clone(), Utf8Path::to_path_buf)
    }

    /// Convert a build-root-relative path (such as an output directory) into
    /// the executor's form.
    #[must_use]
    pub fn build_path(&self, path: &Utf8Path) -> Utf8PathBuf {
        self.to_ninja_path(&self.build_root.join(path))
    }

    /// Bulk form of [`Self::to_ninja_path`].
    #[must_use]
    pub fn map_paths<'p, I>(&self, paths: I) -> Vec<Utf8PathBuf>
    where
        I: IntoIterator<Item = &'p Utf8PathBuf>,
    {
        paths.into_iter().map(|p| self.to_ninja_path(p)).collect()
    }

    /// Path of `path` below the source or build tree, used to lay out object
    /// files. Generated files match the build tree first.
    #[must_use]
    pub fn tree_relative(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        let abs = self.absolute(path);
        abs.strip_prefix(&self.build_root)
            .or_else(|_| abs.strip_prefix(&self.source_root))
            .ok()
            .filter(|rel| !rel.as_str().is_empty())
            .map(Utf8Path::to_path_buf)
    }
}

/// Lexically normalise a path: drop `.` and fold `..` into the parent.
#[must_use]
pub fn normalise(path: &Utf8Path) -> Utf8PathBuf {
    let mut out: Vec<Utf8Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match out.last() {
                Some(Utf8Component::Normal(_)) => {
                    out.pop();
                }
                Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return Utf8PathBuf::from(".");
    }
    out.iter().collect()
}

/// Quote a single command-line word for the target platform's shell.
///
/// Words made only of characters every shell passes through unchanged are
/// returned as-is.
///
/// ```
/// use tsugite::config::Platform;
/// use tsugite::path::shell_word;
///
/// assert_eq!(shell_word("-DFOO=1", Platform::Linux), "-DFOO=1");
/// let quoted = shell_word("-DMSG=a b", Platform::Linux);
/// assert_eq!(shlex::split(&quoted), Some(vec!["-DMSG=a b".to_owned()]));
/// assert_eq!(shell_word("-DMSG=a b", Platform::Windows), "\"-DMSG=a b\"");
/// ```
#[must_use]
pub fn shell_word(word: &str, platform: Platform) -> String {
    if !word.is_empty() && word.chars().all(is_shell_safe) {
        return word.to_owned();
    }
    if platform.is_windows() {
        return format!("\"{}\"", word.replace('"', "\\\""));
    }
    let bytes: Vec<u8> = word.quoted(Sh);
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug_assert!(false, "shell quoting produced non UTF-8 bytes: {err}");
            String::from_utf8_lossy(&err.into_bytes()).into_owned()
        }
    }
}

const fn is_shell_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '_' | '-' | '+' | '=' | '/' | '.' | ',' | ':' | '@' | '%' | '^'
        )
}
