//! Command line interface definition using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::manifest::DEFAULT_MANIFEST;

mod parsing;

use parsing::parse_jobs;

/// Maximum number of generation threads accepted by the CLI.
const MAX_JOBS: usize = 64;

/// Lower build targets into Ninja rules and build statements.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the project manifest.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_MANIFEST)]
    pub file: PathBuf,

    /// Run as if started in this directory.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Number of targets generated in parallel.
    ///
    /// Values must be between 1 and 64.
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute; defaults to `generate`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Apply the default command if none was specified.
    #[must_use]
    pub fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            self.command = Some(Commands::Generate(GenerateArgs::default()));
        }
        self
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_MANIFEST),
            directory: None,
            jobs: None,
            verbose: false,
            command: None,
        }
        .with_default_command()
    }
}

/// Arguments accepted by the `generate` command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct GenerateArgs {
    /// Rules file name inside the build root.
    #[arg(long, value_name = "FILE", default_value = "rules.ninja")]
    pub rules: PathBuf,

    /// Build file name inside the build root.
    #[arg(long, value_name = "FILE", default_value = "build.ninja")]
    pub build: PathBuf,

    /// Also write `compile_commands.json` to the build root.
    #[arg(long)]
    pub compile_commands: bool,

    /// Generate only these targets; all targets when empty.
    pub targets: Vec<String>,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            rules: PathBuf::from("rules.ninja"),
            build: PathBuf::from("build.ninja"),
            compile_commands: false,
            targets: Vec::new(),
        }
    }
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Write the rules and build files for the manifest's targets.
    Generate(GenerateArgs),

    /// Lower every target without writing anything, reporting errors.
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[rstest]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[rstest]
    fn generate_is_the_default_command() {
        let cli = Cli::try_parse_from(["tsugite"]).expect("parse").with_default_command();
        assert_eq!(cli.command, Some(Commands::Generate(GenerateArgs::default())));
        assert_eq!(cli.file, PathBuf::from(DEFAULT_MANIFEST));
    }

    #[rstest]
    fn generate_accepts_output_names() {
        let cli = Cli::try_parse_from([
            "tsugite",
            "-C",
            "proj",
            "generate",
            "--rules",
            "r.ninja",
            "--compile-commands",
            "app",
        ])
        .expect("parse");
        let Some(Commands::Generate(args)) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.rules, PathBuf::from("r.ninja"));
        assert!(args.compile_commands);
        assert_eq!(args.targets, vec!["app".to_owned()]);
        assert_eq!(cli.directory, Some(PathBuf::from("proj")));
    }

    #[rstest]
    #[case("0")]
    #[case("65")]
    #[case("many")]
    fn jobs_are_validated(#[case] jobs: &str) {
        assert!(Cli::try_parse_from(["tsugite", "-j", jobs]).is_err());
    }
}
