//! The `kubectl` subprocess backend.

mod backend;
pub mod errors;
pub mod models;

pub use backend::{build_command, parse_output, KubectlBackend, KubectlCommand};
pub use errors::{KubectlError, Result};
