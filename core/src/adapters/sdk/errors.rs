//! Errors raised by the `kube` client backend, and their classification.

use std::time::Duration;

use thiserror::Error;

use crate::domain::{ErrorInfo, ErrorKind};

/// Result type alias for SDK backend operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors that can occur while talking to the API server through `kube`.
#[derive(Error, Debug)]
pub enum SdkError {
    /// No client could be built (no kubeconfig, no in-cluster env).
    #[error("Kubernetes client unavailable: {0}")]
    Unavailable(String),

    /// Error returned by the kube client.
    #[error("{0}")]
    Kube(#[from] kube::Error),

    /// The request did not finish in time.
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The local port-forward listener could not bind.
    #[error("Failed to listen on 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The port-forward stream failed.
    #[error("Port-forward failed: {0}")]
    PortForward(String),

    /// The operation cannot be expressed for this resource.
    #[error("{0}")]
    Invalid(String),

    /// I/O error while copying forwarded traffic.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// The kind this error maps to in the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::BackendUnavailable,
            Self::Kube(error) => classify(error),
            Self::Timeout(_) => ErrorKind::TransientNetworkError,
            Self::Bind { source, .. } => match source.kind() {
                std::io::ErrorKind::AddrInUse => ErrorKind::InvalidArgument,
                std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
                _ => ErrorKind::Unknown,
            },
            Self::Invalid(_) => ErrorKind::InvalidArgument,
            Self::PortForward(_) | Self::Io(_) => ErrorKind::Unknown,
        }
    }
}

/// Classifies a kube client error.
fn classify(error: &kube::Error) -> ErrorKind {
    match error {
        kube::Error::Api(response) => match response.code {
            404 => ErrorKind::ResourceNotFound,
            409 if response.reason == "AlreadyExists" => ErrorKind::ResourceAlreadyExists,
            401 | 403 => ErrorKind::PermissionDenied,
            400 | 422 => ErrorKind::InvalidArgument,
            503 | 504 => ErrorKind::TransientNetworkError,
            _ => ErrorKind::Unknown,
        },
        kube::Error::HyperError(_) | kube::Error::Service(_) => ErrorKind::TransientNetworkError,
        kube::Error::InferConfig(_) => ErrorKind::BackendUnavailable,
        _ => ErrorKind::Unknown,
    }
}

impl From<SdkError> for ErrorInfo {
    fn from(error: SdkError) -> Self {
        let kind = error.kind();
        let message = match &error {
            // The server message already reads like `pods "web-1" not found`.
            SdkError::Kube(kube::Error::Api(response)) if !response.message.is_empty() => {
                response.message.clone()
            }
            _ => error.to_string(),
        };
        ErrorInfo::new(kind, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str, message: &str) -> SdkError {
        let response: kube::error::ErrorResponse = serde_json::from_value(serde_json::json!({
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code
        }))
        .unwrap();
        SdkError::Kube(kube::Error::Api(response.into()))
    }

    #[test]
    fn test_api_error_classification() {
        assert_eq!(
            api_error(404, "NotFound", "pods \"web-1\" not found").kind(),
            ErrorKind::ResourceNotFound
        );
        assert_eq!(
            api_error(409, "AlreadyExists", "pods \"web-1\" already exists").kind(),
            ErrorKind::ResourceAlreadyExists
        );
        assert_eq!(
            api_error(409, "Conflict", "the object has been modified").kind(),
            ErrorKind::Unknown
        );
        assert_eq!(
            api_error(403, "Forbidden", "pods is forbidden").kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            api_error(422, "Invalid", "Deployment.apps \"api\" is invalid").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            api_error(503, "ServiceUnavailable", "etcdserver: leader changed").kind(),
            ErrorKind::TransientNetworkError
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ErrorInfo::from(SdkError::Unavailable("no kubeconfig".to_string())).is_retryable());
        assert!(ErrorInfo::from(SdkError::Timeout(Duration::from_secs(10))).is_retryable());
        assert!(!ErrorInfo::from(api_error(404, "NotFound", "gone")).is_retryable());
    }

    #[test]
    fn test_bind_errors() {
        let in_use = SdkError::Bind {
            port: 8080,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert_eq!(in_use.kind(), ErrorKind::InvalidArgument);
        assert!(in_use.to_string().contains("8080"));
    }

    #[test]
    fn test_api_message_is_kept() {
        let info = ErrorInfo::from(api_error(404, "NotFound", "pods \"web-1\" not found"));
        assert_eq!(info.message, "pods \"web-1\" not found");
    }
}
