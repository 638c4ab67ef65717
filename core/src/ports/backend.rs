//! Cluster backend port (interface).

use crate::domain::{ErrorInfo, ExecutionMode, Operation, ResourceOutput};

/// Result of a single backend call.
pub type BackendResult = std::result::Result<ResourceOutput, ErrorInfo>;

/// Port for executing operations against a cluster.
///
/// Implementations map their own failures into an `ErrorInfo` so the
/// dispatcher can decide whether to fall back without knowing which backend
/// it talked to.
pub trait ClusterBackend: Send + Sync {
    /// Which execution mode this backend provides.
    fn mode(&self) -> ExecutionMode;

    /// Execute an already validated operation.
    fn execute(
        &self,
        operation: &Operation,
    ) -> impl std::future::Future<Output = BackendResult> + Send;
}
