//! Test utilities shared by the integration tests.
//!
//! Provides toolchain fixtures, a fixed dependency lookup, helpers for
//! locating statements in recorded sink output and a temporary project
//! directory for command line tests.

pub mod lookup;
pub mod project;
pub mod statements;
pub mod toolchains;

pub use lookup::StaticLookup;
pub use project::TempProject;
