//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interface the dispatcher uses to reach a cluster.
//! Implementations live in `adapters`.

mod backend;

pub use backend::{BackendResult, ClusterBackend};
