//! Adapters layer - Concrete backend implementations.
//!
//! - `kubectl`: runs `kubectl` as a subprocess
//! - `sdk`: talks to the API server through `kube::Client`
//! - `forward`: registry of running port-forward sessions, shared by both
//! - `helm`: runs `helm` for release and repository operations

pub mod discovery;
pub mod forward;
pub mod helm;
pub mod kubectl;
pub(crate) mod process;
pub mod sdk;

use crate::config::Settings;
use crate::domain::{ExecutionMode, Operation};
use crate::ports::{BackendResult, ClusterBackend};

pub use forward::{ForwardHandle, ForwardInfo, ForwardRegistry};
pub use helm::HelmRunner;
pub use kubectl::KubectlBackend;
pub use sdk::KubeBackend;

/// Either backend, so a dispatcher can hold both behind one type.
pub enum AnyBackend {
    Cli(KubectlBackend),
    Sdk(KubeBackend),
}

impl AnyBackend {
    /// Creates the backend for `mode`.
    pub async fn for_mode(mode: ExecutionMode, settings: &Settings, forwards: ForwardRegistry) -> Self {
        match mode {
            ExecutionMode::Cli => Self::Cli(KubectlBackend::new(settings, forwards)),
            ExecutionMode::Sdk => Self::Sdk(KubeBackend::connect(settings, forwards).await),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Self::Cli(backend) => backend.is_available(),
            Self::Sdk(backend) => backend.is_available(),
        }
    }
}

impl ClusterBackend for AnyBackend {
    fn mode(&self) -> ExecutionMode {
        match self {
            Self::Cli(backend) => backend.mode(),
            Self::Sdk(backend) => backend.mode(),
        }
    }

    async fn execute(&self, operation: &Operation) -> BackendResult {
        match self {
            Self::Cli(backend) => backend.execute(operation).await,
            Self::Sdk(backend) => backend.execute(operation).await,
        }
    }
}
