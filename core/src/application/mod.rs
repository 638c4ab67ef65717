//! Application layer - Use case services.
//!
//! - `dispatcher`: validation, primary attempt and single fallback
//! - `cluster_service`: the caller-facing operations built on the dispatcher
//! - `helm_service`: helm release and repository operations

mod cluster_service;
pub mod dispatcher;
mod helm_service;

#[cfg(test)]
pub(crate) mod testing;

pub use cluster_service::ClusterService;
pub use dispatcher::{transition, Attempt, DispatchEvent, DispatchState, Dispatcher};
pub use helm_service::HelmService;
