//! Tsugite core library.
//!
//! Lowers resolved build targets into Ninja rules and build statements. A
//! [`manifest::ProjectManifest`] describes the targets and toolchain;
//! [`generator::TargetGenerator`] lowers one target into a
//! [`sink::NinjaSink`]; [`runner`] drives a whole project from the command
//! line.

pub mod bundle;
pub mod cli;
pub mod compile_commands;
pub mod config;
pub mod context;
pub mod dyndep;
pub mod error;
pub mod flags;
pub mod generator;
pub mod hasher;
pub mod ir;
pub mod layout;
pub mod link;
pub mod manifest;
pub mod model;
pub mod ninja_gen;
pub mod path;
pub mod rules;
pub mod runner;
pub mod session;
pub mod sink;
pub mod statements;
pub mod strategy;
pub mod toolchain;
