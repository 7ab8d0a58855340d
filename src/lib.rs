//! Freshen: the library
//!
//! Watches a Go source tree, rebuilds the program when a source file changes
//! and reruns it, keeping exactly one instance alive. The `freshen` binary is
//! a thin launcher over [`run`]; the pieces are public so the cycle can be
//! driven from tests or embedded elsewhere.

#![deny(deprecated, unsafe_code)]
#![allow(clippy::default_trait_access, clippy::cognitive_complexity)]

#[macro_use]
extern crate clap;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate log;

pub mod build;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
mod limits;
pub mod orchestrator;
mod process;
pub mod run;
pub mod scan;
mod signal;
pub mod supervisor;
pub mod watcher;

pub use run::run;
