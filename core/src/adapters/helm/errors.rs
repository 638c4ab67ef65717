//! Errors raised while running helm, and their classification.

use thiserror::Error;

use crate::adapters::kubectl::errors::CONNECTION_ERRORS;
use crate::domain::{ErrorInfo, ErrorKind};

pub type Result<T> = std::result::Result<T, HelmError>;

#[derive(Error, Debug)]
pub enum HelmError {
    #[error("helm not found")]
    HelmNotFound,

    /// helm could not reach the cluster or load its kubeconfig.
    #[error("Cluster not reachable: {0}")]
    ClusterNotConnected(String),

    #[error("helm command timed out")]
    Timeout,

    /// Release, chart or repository does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Release name in use, or repository already added with another URL.
    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Invalid(String),

    #[error("helm failed: {0}")]
    CommandFailed(String),

    #[error("Failed to parse helm output: {0}")]
    ParsingFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// stderr fragments that mean the release, chart or repository is missing.
const NOT_FOUND_ERRORS: &[&str] = &[
    "not found",
    "has no deployed releases",
    "no repo named",
];

const EXISTS_ERRORS: &[&str] = &["cannot re-use a name", "already exists"];

impl HelmError {
    /// Classifies helm's stderr into an error variant.
    pub fn from_helm_error(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("kubernetes cluster unreachable")
            || CONNECTION_ERRORS.iter().any(|p| lower.contains(p))
        {
            Self::ClusterNotConnected(message)
        } else if EXISTS_ERRORS.iter().any(|p| lower.contains(p)) {
            Self::AlreadyExists(message)
        } else if NOT_FOUND_ERRORS.iter().any(|p| lower.contains(p)) {
            Self::NotFound(message)
        } else if lower.contains("forbidden") || lower.contains("unauthorized") {
            Self::Forbidden(message)
        } else if lower.contains("invalid") {
            Self::Invalid(message)
        } else {
            Self::CommandFailed(message)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HelmNotFound => ErrorKind::BackendUnavailable,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::BackendUnavailable
            }
            Self::ClusterNotConnected(_) | Self::Timeout => ErrorKind::TransientNetworkError,
            Self::NotFound(_) => ErrorKind::ResourceNotFound,
            Self::AlreadyExists(_) => ErrorKind::ResourceAlreadyExists,
            Self::Forbidden(_) => ErrorKind::PermissionDenied,
            Self::Invalid(_) => ErrorKind::InvalidArgument,
            Self::CommandFailed(_) | Self::ParsingFailed(_) | Self::Io(_) => ErrorKind::Unknown,
        }
    }
}

impl From<HelmError> for ErrorInfo {
    fn from(error: HelmError) -> Self {
        ErrorInfo::new(error.kind(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(stderr: &str) -> ErrorKind {
        HelmError::from_helm_error(stderr).kind()
    }

    #[test]
    fn test_helm_error_detection() {
        assert_eq!(
            kind("Error: INSTALLATION FAILED: cannot re-use a name that is still in use"),
            ErrorKind::ResourceAlreadyExists
        );
        assert_eq!(
            kind("Error: uninstall: Release not loaded: web: release: not found"),
            ErrorKind::ResourceNotFound
        );
        assert_eq!(
            kind("Error: UPGRADE FAILED: \"web\" has no deployed releases"),
            ErrorKind::ResourceNotFound
        );
        assert_eq!(kind("Error: no repo named \"bitnami\" found"), ErrorKind::ResourceNotFound);
        assert_eq!(
            kind("Error: repository name (bitnami) already exists, please specify a different name"),
            ErrorKind::ResourceAlreadyExists
        );
        assert_eq!(
            kind("Error: list: failed to list: secrets is forbidden: User \"dev\" cannot list resource \"secrets\""),
            ErrorKind::PermissionDenied
        );
        assert_eq!(kind("Error: something odd"), ErrorKind::Unknown);
    }

    #[test]
    fn test_unreachable_cluster() {
        let err = HelmError::from_helm_error(
            "Error: INSTALLATION FAILED: Kubernetes cluster unreachable: Get \"https://127.0.0.1:6443/version\": dial tcp 127.0.0.1:6443: connect: connection refused",
        );
        assert!(matches!(err, HelmError::ClusterNotConnected(_)));
        assert_eq!(err.kind(), ErrorKind::TransientNetworkError);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        assert_eq!(HelmError::HelmNotFound.kind(), ErrorKind::BackendUnavailable);
        let io = HelmError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(io.kind(), ErrorKind::BackendUnavailable);
    }
}
