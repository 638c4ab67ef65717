//! kubedispatch core library
//!
//! Runs pod, deployment and namespace operations against a Kubernetes
//! cluster through one of two backends:
//! - `kubectl` as a subprocess
//! - the `kube` client talking to the API server directly
//!
//! Every operation is validated before any external call, sent to the
//! primary backend, and retried once on the other backend when the primary
//! is unavailable or the network failed. Both backends return the same
//! `OperationResult`.
//!
//! Helm releases and repositories are managed through the `helm` binary,
//! without fallback.
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Requests, operations, results and manifests
//! - `ports`: The `ClusterBackend` trait
//! - `adapters`: kubectl and kube backends, port-forward registry
//! - `application`: Dispatcher and cluster service

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;
pub mod query;

// Re-export domain types (primary API)
pub use domain::{
    Attributes, ErrorInfo, ErrorKind, ExecutionMode, HelmOperation, Operation, OperationResult,
    PortMapping, ReleaseSpec, ResourceKind, ResourceOutput, ResourceRequest, Verb,
};

// Re-export other commonly used types
pub use adapters::{
    AnyBackend, ForwardInfo, ForwardRegistry, HelmRunner, KubeBackend, KubectlBackend,
};
pub use application::{ClusterService, Dispatcher, HelmService};
pub use config::{ConfigStore, Settings};
pub use error::{Error, Result};
pub use ports::ClusterBackend;
