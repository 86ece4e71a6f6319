//! Generator configuration shared by every target in a generation run.

use camino::Utf8PathBuf;
use ortho_config::figment::{Figment, providers::Env};
use ortho_config::uncased::Uncased;
use ortho_config::{MergeComposer, OrthoConfig, OrthoMergeExt, OrthoResult, sanitize_value};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "TSUGITE_";

/// Platform the generated build description targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux and other ELF platforms.
    Linux,
    /// macOS.
    #[serde(rename = "macos")]
    MacOs,
    /// Windows.
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    /// Whether bundles are laid out as application packages.
    #[must_use]
    pub const fn is_apple(self) -> bool {
        matches!(self, Self::MacOs)
    }

    /// Whether the platform follows Windows naming conventions.
    #[must_use]
    pub const fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }

    /// Longest command line the platform reliably accepts.
    #[must_use]
    pub const fn default_command_line_limit(self) -> usize {
        match self {
            Self::Windows => 8000,
            Self::Linux | Self::MacOs => 131_072,
        }
    }

    /// Default object file extension.
    #[must_use]
    pub const fn object_extension(self) -> &'static str {
        match self {
            Self::Windows => ".obj",
            Self::Linux | Self::MacOs => ".o",
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

/// Settings that apply to every generated target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Root that relative source paths are resolved against.
    pub source_root: Utf8PathBuf,
    /// Directory the executor runs in; emitted paths are relative to it.
    pub build_root: Utf8PathBuf,
    /// Target platform.
    pub platform: Platform,
    /// Override for the command line length limit.
    pub command_line_limit: Option<usize>,
    /// Deflect every compile and link command through a response file.
    pub force_response_file: bool,
    /// Produce compilation database entries alongside build statements.
    pub export_compile_commands: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source_root: Utf8PathBuf::from("."),
            build_root: Utf8PathBuf::from("build"),
            platform: Platform::default(),
            command_line_limit: None,
            force_response_file: false,
            export_compile_commands: false,
        }
    }
}

impl GeneratorConfig {
    /// Effective command line length limit.
    #[must_use]
    pub fn command_line_limit(&self) -> usize {
        self.command_line_limit
            .unwrap_or_else(|| self.platform.default_command_line_limit())
    }

    /// Layer the `TSUGITE_*` environment over these settings.
    ///
    /// # Errors
    ///
    /// Returns an [`ortho_config::OrthoError`] when a variable does not
    /// parse as the setting it names.
    pub fn with_environment(self) -> OrthoResult<Self> {
        let env_provider = Env::prefixed(ENV_PREFIX)
            .map(|key| Uncased::new(key.as_str().to_ascii_uppercase()))
            .split("__");
        let environment = Figment::from(env_provider)
            .extract::<serde_json::Value>()
            .into_ortho_merge()?;
        self.merge_environment(environment)
    }

    /// Merge an environment layer over these settings.
    ///
    /// ```rust
    /// use serde_json::json;
    /// use tsugite::config::GeneratorConfig;
    ///
    /// let config = GeneratorConfig::default()
    ///     .merge_environment(json!({ "force_response_file": true }))
    ///     .expect("merge");
    /// assert!(config.force_response_file);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an [`ortho_config::OrthoError`] when the layers do not merge.
    pub fn merge_environment(mut self, environment: serde_json::Value) -> OrthoResult<Self> {
        let mut composer = MergeComposer::with_capacity(2);
        composer.push_defaults(sanitize_value(&ConfigOverrides::from(&self))?);
        composer.push_environment(environment);
        let merged = ConfigOverrides::merge_from_layers(composer.layers())?;
        if let Some(force) = merged.force_response_file {
            self.force_response_file = force;
        }
        if let Some(export) = merged.export_compile_commands {
            self.export_compile_commands = export;
        }
        if merged.command_line_limit.is_some() {
            self.command_line_limit = merged.command_line_limit;
        }
        Ok(self)
    }
}

/// Settings the environment may override, for example
/// `TSUGITE_FORCE_RESPONSE_FILE=true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TSUGITE")]
pub struct ConfigOverrides {
    /// Deflect every compile and link command through a response file.
    pub force_response_file: Option<bool>,
    /// Produce compilation database entries.
    pub export_compile_commands: Option<bool>,
    /// Command line length limit.
    pub command_line_limit: Option<usize>,
}

impl From<&GeneratorConfig> for ConfigOverrides {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            force_response_file: Some(config.force_response_file),
            export_compile_commands: Some(config.export_compile_commands),
            command_line_limit: config.command_line_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Value, json};

    #[rstest]
    #[case(json!({ "force_response_file": true }), true)]
    #[case(json!({ "force_response_file": false }), false)]
    fn environment_overrides_manifest_flags(#[case] environment: Value, #[case] expected: bool) {
        let config = GeneratorConfig {
            force_response_file: !expected,
            ..GeneratorConfig::default()
        }
        .merge_environment(environment)
        .expect("merge");
        assert_eq!(config.force_response_file, expected);
    }

    #[rstest]
    fn empty_environment_keeps_manifest_values() {
        let manifest = GeneratorConfig {
            force_response_file: true,
            command_line_limit: Some(64),
            ..GeneratorConfig::default()
        };
        let merged = manifest
            .clone()
            .merge_environment(json!({}))
            .expect("merge");
        assert_eq!(merged, manifest);
    }

    #[rstest]
    fn environment_sets_command_line_limit() {
        let config = GeneratorConfig::default()
            .merge_environment(json!({ "command_line_limit": 42, "export_compile_commands": true }))
            .expect("merge");
        assert_eq!(config.command_line_limit(), 42);
        assert!(config.export_compile_commands);
    }

    #[rstest]
    fn malformed_environment_values_are_rejected() {
        let result = GeneratorConfig::default()
            .merge_environment(json!({ "command_line_limit": "lots" }));
        assert!(result.is_err());
    }

    #[rstest]
    #[case(Platform::Windows, 8000)]
    #[case(Platform::Linux, 131_072)]
    fn command_line_limit_follows_platform(#[case] platform: Platform, #[case] limit: usize) {
        let config = GeneratorConfig {
            platform,
            ..GeneratorConfig::default()
        };
        assert_eq!(config.command_line_limit(), limit);
    }

    #[rstest]
    fn explicit_limit_wins() {
        let config = GeneratorConfig {
            command_line_limit: Some(42),
            ..GeneratorConfig::default()
        };
        assert_eq!(config.command_line_limit(), 42);
    }
}
