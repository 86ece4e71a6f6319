//! Project manifests.
//!
//! A manifest is a YAML document with three sections:
//!
//! ```yaml
//! config:
//!   build_root: build
//!   platform: linux
//! toolchain:
//!   languages:
//!     CXX: { compiler: c++, family: gnu, extensions: [cpp] }
//! targets:
//!   - name: app
//!     kind: executable
//!     languages: [CXX]
//!     sources: [src/main.cpp]
//! ```
//!
//! The YAML is parsed into an intermediate JSON value first so syntax and
//! structure errors produce separate diagnostics. Relative roots are anchored
//! at the manifest's directory by [`ProjectManifest::anchor`].

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::layout::TargetLayout;
use crate::model::{Target, TargetInfo, TargetLookup};
use crate::path::normalise;
use crate::toolchain::Toolchain;

mod diagnostics;
mod hints;

pub use diagnostics::{BoxedDiagnostic, ManifestError, map_data_error, map_yaml_error};

/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "tsugite.yml";

/// A parsed project description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectManifest {
    /// Run-wide generator settings.
    pub config: GeneratorConfig,
    /// Toolchain used by every target.
    pub toolchain: Toolchain,
    /// Targets in generation order.
    pub targets: Vec<Target>,
}

impl ProjectManifest {
    /// Parse manifest text labelled `name` in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] for syntax and structure errors and
    /// [`ManifestError::DuplicateTarget`] when two targets share a name.
    pub fn from_str_named(yaml: &str, name: &str) -> Result<Self, ManifestError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc: serde_json::Value =
            serde_saphyr::from_str(yaml).map_err(|err| ManifestError::Parse {
                name: name.to_owned(),
                source: map_yaml_error(err, yaml, name),
            })?;
        let manifest: Self = if doc.is_null() {
            Self::default()
        } else {
            serde_json::from_value(doc).map_err(|err| ManifestError::Parse {
                name: name.to_owned(),
                source: map_data_error(err, name),
            })?
        };
        manifest.check_unique_names(name)?;
        Ok(manifest)
    }

    /// Read and parse the manifest at `path`, anchoring relative roots at its
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or does not parse.
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        let parent = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file = path.file_name().unwrap_or(path.as_str());
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .with_context(|| format!("failed to open manifest directory {parent}"))?;
        let text = dir
            .read_to_string(file)
            .with_context(|| format!("failed to read manifest {path}"))?;
        let manifest = Self::from_str_named(&text, path.as_str())?;
        Ok(manifest.anchor(parent))
    }

    /// Resolve a relative source root against `base`.
    #[must_use]
    pub fn anchor(mut self, base: &Utf8Path) -> Self {
        if self.config.source_root.is_relative() {
            self.config.source_root = normalise(&base.join(&self.config.source_root));
        }
        self
    }

    /// Target named `name`.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Dependency lookup over this manifest's targets.
    #[must_use]
    pub fn lookup(&self) -> ManifestLookup {
        let infos = self
            .targets
            .iter()
            .map(|target| {
                let info = TargetLayout::new(target, self.config.platform).target_info();
                (target.name.clone(), info)
            })
            .collect();
        ManifestLookup { infos }
    }

    fn check_unique_names(&self, name: &str) -> Result<(), ManifestError> {
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.name.as_str()) {
                return Err(ManifestError::DuplicateTarget {
                    name: name.to_owned(),
                    target: target.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// [`TargetLookup`] backed by a manifest's targets.
#[derive(Debug, Clone, Default)]
pub struct ManifestLookup {
    infos: HashMap<String, TargetInfo>,
}

impl TargetLookup for ManifestLookup {
    fn target_info(&self, name: &str) -> Option<TargetInfo> {
        self.infos.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;
    use crate::model::{ArtifactKind, Language, LinkItem};
    use rstest::rstest;

    const PROJECT: &str = concat!(
        "config:\n",
        "  source_root: .\n",
        "  platform: linux\n",
        "toolchain:\n",
        "  languages:\n",
        "    CXX:\n",
        "      compiler: c++\n",
        "      family: gnu\n",
        "      extensions: [cpp]\n",
        "targets:\n",
        "  - name: core\n",
        "    kind: static-library\n",
        "    languages: [CXX]\n",
        "    sources: [src/core.cpp]\n",
        "  - name: app\n",
        "    kind: executable\n",
        "    languages: [CXX]\n",
        "    sources:\n",
        "      - src/main.cpp\n",
        "      - path: src/extra.cpp\n",
        "        compile_definitions: [FOO=1]\n",
        "    link_items:\n",
        "      - target: core\n",
        "      - flag: -lm\n",
        "    properties:\n",
        "      standards: { CXX: \"17\" }\n",
    );

    #[rstest]
    fn parses_targets_in_order() {
        let manifest = ProjectManifest::from_str_named(PROJECT, "tsugite.yml").expect("parse");
        assert_eq!(manifest.config.platform, Platform::Linux);
        let names: Vec<&str> = manifest.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["core", "app"]);
        let app = manifest.target("app").expect("app");
        assert_eq!(app.sources.len(), 2);
        assert_eq!(
            app.link_items,
            vec![LinkItem::Target("core".into()), LinkItem::Flag("-lm".into())]
        );
        assert_eq!(
            app.properties.standards.get(&Language::from("CXX")).map(String::as_str),
            Some("17")
        );
    }

    #[rstest]
    fn lookup_reports_artifacts() {
        let manifest = ProjectManifest::from_str_named(PROJECT, "tsugite.yml").expect("parse");
        let info = manifest.lookup().target_info("core").expect("core");
        assert_eq!(info.kind, ArtifactKind::StaticLibrary);
        assert_eq!(info.artifact.as_deref().map(Utf8Path::as_str), Some("libcore.a"));
        assert!(manifest.lookup().target_info("missing").is_none());
    }

    #[rstest]
    fn duplicate_targets_are_rejected() {
        let yaml = "targets:\n  - { name: a, kind: utility }\n  - { name: a, kind: utility }\n";
        let err = ProjectManifest::from_str_named(yaml, "tsugite.yml").expect_err("duplicate");
        assert!(matches!(err, ManifestError::DuplicateTarget { ref target, .. } if target == "a"));
    }

    #[rstest]
    fn unknown_keys_are_structure_errors() {
        let yaml = "targets:\n  - { name: a, kind: utility, colour: red }\n";
        let err = ProjectManifest::from_str_named(yaml, "tsugite.yml").expect_err("unknown key");
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[rstest]
    fn empty_documents_are_empty_projects() {
        let manifest = ProjectManifest::from_str_named("", "tsugite.yml").expect("parse");
        assert!(manifest.targets.is_empty());
    }

    #[rstest]
    fn relative_source_roots_follow_the_manifest() {
        let manifest = ProjectManifest::default().anchor(Utf8Path::new("/work/proj"));
        assert_eq!(manifest.config.source_root, "/work/proj");
    }
}
