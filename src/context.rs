//! Read-only inputs shared by the steps of one target's generation.

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::GeneratorConfig;
use crate::error::GenError;
use crate::flags::FlagComposer;
use crate::layout::TargetLayout;
use crate::model::{Target, TargetInfo, TargetLookup};
use crate::ninja_gen::is_representable;
use crate::path::PathResolver;
use crate::rules::RuleEmitter;
use crate::toolchain::Toolchain;

/// Everything a generation step may read but never mutate.
pub struct TargetContext<'a> {
    /// Target being generated.
    pub target: &'a Target,
    /// Toolchain the target is compiled with.
    pub toolchain: &'a Toolchain,
    /// Run-wide settings.
    pub config: &'a GeneratorConfig,
    /// Other targets, for link and order dependencies.
    pub lookup: &'a dyn TargetLookup,
    /// Path conversion for the run's roots.
    pub resolver: PathResolver,
    /// Output locations of the target.
    pub layout: TargetLayout,
}

impl<'a> TargetContext<'a> {
    /// Assemble the context for `target`.
    #[must_use]
    pub fn new(
        target: &'a Target,
        toolchain: &'a Toolchain,
        config: &'a GeneratorConfig,
        lookup: &'a dyn TargetLookup,
    ) -> Self {
        Self {
            target,
            toolchain,
            config,
            lookup,
            resolver: PathResolver::new(config.source_root.clone(), &config.build_root),
            layout: TargetLayout::new(target, config.platform),
        }
    }

    /// Target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Flag composer bound to this target.
    #[must_use]
    pub fn composer(&self) -> FlagComposer<'_> {
        FlagComposer::new(self.target, self.toolchain, &self.resolver, self.config.platform)
    }

    /// Rule emitter bound to this target.
    #[must_use]
    pub const fn emitter(&self) -> RuleEmitter<'a> {
        RuleEmitter::new(self.target, self.toolchain, self.config.platform)
    }

    /// Convert a build-root-relative path to executor form.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidPath`] for paths the build file cannot
    /// express.
    pub fn build_path(&self, path: &Utf8Path) -> Result<Utf8PathBuf, GenError> {
        self.checked(self.resolver.build_path(path))
    }

    /// Convert a project path to executor form.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidPath`] for paths the build file cannot
    /// express.
    pub fn project_path(&self, path: &Utf8Path) -> Result<Utf8PathBuf, GenError> {
        self.checked(self.resolver.to_ninja_path(path))
    }

    fn checked(&self, path: Utf8PathBuf) -> Result<Utf8PathBuf, GenError> {
        if is_representable(path.as_str()) {
            Ok(path)
        } else {
            Err(GenError::InvalidPath {
                target: self.target.name.clone(),
                path: path.into_string(),
            })
        }
    }

    /// Look up a dependency.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownTarget`] when `name` is not a known target.
    pub fn dependency(&self, name: &str) -> Result<TargetInfo, GenError> {
        self.lookup
            .target_info(name)
            .ok_or_else(|| GenError::UnknownTarget {
                target: self.target.name.clone(),
                dependency: name.to_owned(),
            })
    }

    /// Error mapper for sink failures on `stream`.
    pub fn sink_error(&self, stream: &'static str) -> impl FnOnce(std::io::Error) -> GenError {
        let target = self.target.name.clone();
        move |source| GenError::Sink {
            target,
            stream,
            source,
        }
    }

    /// Name of the phony edge every object of `target` order-depends on.
    #[must_use]
    pub fn order_depends_name(target: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("object_order_depends_target_{target}"))
    }
}
