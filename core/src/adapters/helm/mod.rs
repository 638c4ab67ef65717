//! The `helm` subprocess adapter for release and repository operations.

pub mod errors;
pub mod models;
mod runner;

pub use errors::{HelmError, Result};
pub use runner::{build_helm_command, parse_helm_output, HelmCommand, HelmRunner};
