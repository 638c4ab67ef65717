//! Domain layer - Pure business logic and data models.
//!
//! This module contains the request, operation and result types shared by
//! every backend. These types have no I/O dependencies and can be tested in
//! isolation.

pub mod helm;
pub mod manifest;
mod name;
mod operation;
mod output;
mod request;
mod result;

// Re-export all domain types
pub use helm::{
    ChartSummary, HelmOperation, ReleaseSpec, ReleaseSummary, RepositorySummary,
};
pub use name::{dns1123_violation, is_dns1123_label, MAX_LABEL_LENGTH};
pub use operation::{Operation, Verb};
pub use output::{DeploymentSummary, NamespaceSummary, PodSummary, ResourceOutput};
pub use request::{Attributes, PortMapping, ResourceKind, ResourceLimits, ResourceRequest};
pub use result::{ErrorInfo, ErrorKind, ExecutionMode, OperationResult};
