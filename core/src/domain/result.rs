//! Operation results and the error taxonomy shared by both backends.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::output::ResourceOutput;

/// Which backend executes an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Shell out to `kubectl`.
    Cli,
    /// Call the cluster API through the `kube` client.
    Sdk,
}

impl ExecutionMode {
    /// The other mode, used as the fallback target.
    pub fn other(self) -> Self {
        match self {
            Self::Cli => Self::Sdk,
            Self::Sdk => Self::Cli,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Sdk => "sdk",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cli" | "kubectl" => Ok(Self::Cli),
            "sdk" | "api" => Ok(Self::Sdk),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

/// Classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A name or namespace is not a DNS-1123 label.
    InvalidName,
    /// Any other argument was rejected (negative replicas, unsupported operation, ...).
    InvalidArgument,
    ResourceNotFound,
    ResourceAlreadyExists,
    /// The backend cannot be used at all (binary missing, no client).
    BackendUnavailable,
    /// The cluster could not be reached for a reason that may go away.
    TransientNetworkError,
    PermissionDenied,
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind is retried once on the secondary backend.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::BackendUnavailable | Self::TransientNetworkError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidName => "invalid name",
            Self::InvalidArgument => "invalid argument",
            Self::ResourceNotFound => "resource not found",
            Self::ResourceAlreadyExists => "resource already exists",
            Self::BackendUnavailable => "backend unavailable",
            Self::TransientNetworkError => "transient network error",
            Self::PermissionDenied => "permission denied",
            Self::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

/// A classified error with a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidName, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendUnavailable, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// The normalized result of one caller-facing operation.
///
/// The shape is identical whichever backend served the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ResourceOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl OperationResult {
    pub fn ok(output: ResourceOutput) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(error: ErrorInfo) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error),
        }
    }

    /// The error kind, if the operation failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

impl From<Result<ResourceOutput, ErrorInfo>> for OperationResult {
    fn from(result: Result<ResourceOutput, ErrorInfo>) -> Self {
        match result {
            Ok(output) => Self::ok(output),
            Err(error) => Self::failed(error),
        }
    }
}
