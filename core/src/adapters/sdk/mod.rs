//! The `kube` client backend.

mod backend;
pub mod errors;

pub use backend::KubeBackend;
pub use errors::SdkError;
