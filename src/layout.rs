//! Where a target's outputs live inside the build root.
//!
//! All paths returned here are build-root-relative; callers convert them
//! with [`PathResolver::build_path`] before writing them to a statement.

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::Platform;
use crate::hasher::short_digest;
use crate::model::{ArtifactKind, Target, TargetInfo};
use crate::path::PathResolver;

/// Output locations for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    name: String,
    kind: ArtifactKind,
    platform: Platform,
    output_dir: Utf8PathBuf,
    object_dir: Utf8PathBuf,
}

impl TargetLayout {
    /// Compute the layout of `target` on `platform`.
    ///
    /// ```
    /// use tsugite::config::Platform;
    /// use tsugite::layout::TargetLayout;
    /// use tsugite::model::{ArtifactKind, Target};
    ///
    /// let layout = TargetLayout::new(&Target::new("core", ArtifactKind::StaticLibrary), Platform::Linux);
    /// assert_eq!(layout.object_dir().as_str(), "core.dir");
    /// assert_eq!(layout.artifact().as_deref().map(|p| p.as_str()), Some("libcore.a"));
    /// ```
    #[must_use]
    pub fn new(target: &Target, platform: Platform) -> Self {
        let output_dir = target
            .properties
            .output_directory
            .clone()
            .unwrap_or_default();
        let object_dir = output_dir.join(format!("{}.dir", target.name));
        Self {
            name: target.name.clone(),
            kind: target.kind,
            platform,
            output_dir,
            object_dir,
        }
    }

    /// Directory the artifact is written to.
    #[must_use]
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Directory holding objects and per-target intermediates.
    #[must_use]
    pub fn object_dir(&self) -> &Utf8Path {
        &self.object_dir
    }

    /// Whether bundle resources are laid out into an application package.
    #[must_use]
    pub const fn is_app_bundle(&self) -> bool {
        matches!(self.kind, ArtifactKind::Bundle) && self.platform.is_apple()
    }

    /// Root of the bundle content tree.
    #[must_use]
    pub fn bundle_content_dir(&self) -> Utf8PathBuf {
        self.output_dir
            .join(format!("{}.app", self.name))
            .join("Contents")
    }

    /// Path of the linked artifact, absent for utilities.
    #[must_use]
    pub fn artifact(&self) -> Option<Utf8PathBuf> {
        if self.is_app_bundle() {
            return Some(self.bundle_content_dir().join("MacOS").join(&self.name));
        }
        artifact_file_name(&self.name, self.kind, self.platform).map(|f| self.output_dir.join(f))
    }

    /// Object path for `source` before collision handling.
    ///
    /// The source's path below the build or source tree is mirrored under
    /// the object directory; files outside both trees use their file name.
    #[must_use]
    pub fn object_path(
        &self,
        resolver: &PathResolver,
        source: &Utf8Path,
        extension: &str,
    ) -> Utf8PathBuf {
        let relative = resolver.tree_relative(source).unwrap_or_else(|| {
            source
                .file_name()
                .map_or_else(|| Utf8PathBuf::from("source"), Utf8PathBuf::from)
        });
        self.object_dir.join(format!("{relative}{extension}"))
    }

    /// Object path used when [`Self::object_path`] is already taken.
    ///
    /// The suffix is derived from the source's parent directory so it is
    /// stable across runs.
    #[must_use]
    pub fn disambiguated_object_path(
        &self,
        resolver: &PathResolver,
        source: &Utf8Path,
        extension: &str,
    ) -> Utf8PathBuf {
        let absolute = resolver.absolute(source);
        let parent = absolute.parent().map_or("", Utf8Path::as_str);
        let file = absolute.file_name().unwrap_or("source");
        self.object_dir
            .join(format!("{file}.{}{extension}", short_digest(parent)))
    }

    /// What dependants need to know about this target.
    #[must_use]
    pub fn target_info(&self) -> TargetInfo {
        TargetInfo {
            name: self.name.clone(),
            kind: self.kind,
            artifact: self.artifact(),
            object_dir: self.object_dir.clone(),
        }
    }
}

/// File name of a target's artifact on `platform`.
///
/// ```
/// use tsugite::config::Platform;
/// use tsugite::layout::artifact_file_name;
/// use tsugite::model::ArtifactKind;
///
/// assert_eq!(
///     artifact_file_name("z", ArtifactKind::SharedLibrary, Platform::MacOs).as_deref(),
///     Some("libz.dylib")
/// );
/// ```
#[must_use]
pub fn artifact_file_name(name: &str, kind: ArtifactKind, platform: Platform) -> Option<String> {
    let file = match (kind, platform) {
        (ArtifactKind::Utility, _) => return None,
        (ArtifactKind::Executable | ArtifactKind::Bundle, Platform::Windows) => {
            format!("{name}.exe")
        }
        (ArtifactKind::Executable | ArtifactKind::Bundle, _) => name.to_owned(),
        (ArtifactKind::StaticLibrary, Platform::Windows) => format!("{name}.lib"),
        (ArtifactKind::StaticLibrary, _) => format!("lib{name}.a"),
        (ArtifactKind::SharedLibrary | ArtifactKind::Module, Platform::Windows) => {
            format!("{name}.dll")
        }
        (ArtifactKind::SharedLibrary, Platform::MacOs) => format!("lib{name}.dylib"),
        (ArtifactKind::SharedLibrary, Platform::Linux) => format!("lib{name}.so"),
        (ArtifactKind::Module, _) => format!("{name}.so"),
    };
    Some(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn resolver() -> PathResolver {
        PathResolver::new("/work/proj", "build")
    }

    fn layout(kind: ArtifactKind, platform: Platform) -> TargetLayout {
        let mut target = Target::new("app", kind);
        target.properties.output_directory = Some("bin".into());
        TargetLayout::new(&target, platform)
    }

    #[rstest]
    #[case(ArtifactKind::Executable, Platform::Linux, Some("bin/app"))]
    #[case(ArtifactKind::Executable, Platform::Windows, Some("bin/app.exe"))]
    #[case(ArtifactKind::StaticLibrary, Platform::Windows, Some("bin/app.lib"))]
    #[case(ArtifactKind::SharedLibrary, Platform::Linux, Some("bin/libapp.so"))]
    #[case(ArtifactKind::Module, Platform::MacOs, Some("bin/app.so"))]
    #[case(ArtifactKind::Bundle, Platform::MacOs, Some("bin/app.app/Contents/MacOS/app"))]
    #[case(ArtifactKind::Bundle, Platform::Linux, Some("bin/app"))]
    #[case(ArtifactKind::Utility, Platform::Linux, None)]
    fn artifacts_follow_platform_naming(
        #[case] kind: ArtifactKind,
        #[case] platform: Platform,
        #[case] expected: Option<&str>,
    ) {
        let artifact = layout(kind, platform).artifact();
        assert_eq!(artifact.as_deref().map(Utf8Path::as_str), expected);
    }

    #[rstest]
    #[case("src/a.cpp", "bin/app.dir/src/a.cpp.o")]
    #[case("build/gen/a.cpp", "bin/app.dir/gen/a.cpp.o")]
    #[case("/opt/vendor/a.cpp", "bin/app.dir/a.cpp.o")]
    fn objects_mirror_the_tree(resolver: PathResolver, #[case] source: &str, #[case] expected: &str) {
        let layout = layout(ArtifactKind::Executable, Platform::Linux);
        assert_eq!(layout.object_path(&resolver, Utf8Path::new(source), ".o"), expected);
    }

    #[rstest]
    fn disambiguation_depends_on_parent_directory(resolver: PathResolver) {
        let layout = layout(ArtifactKind::Executable, Platform::Linux);
        let first = layout.disambiguated_object_path(&resolver, Utf8Path::new("/opt/a/x.c"), ".o");
        let second = layout.disambiguated_object_path(&resolver, Utf8Path::new("/opt/b/x.c"), ".o");
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("bin/app.dir/x.c."));
        assert!(first.as_str().ends_with(".o"));
        assert_eq!(
            first,
            layout.disambiguated_object_path(&resolver, Utf8Path::new("/opt/a/x.c"), ".o")
        );
    }
}
