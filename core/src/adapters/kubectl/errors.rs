//! Errors raised while running kubectl, and their classification.

use thiserror::Error;

use crate::domain::{ErrorInfo, ErrorKind};

/// Result type alias for kubectl operations.
pub type Result<T> = std::result::Result<T, KubectlError>;

/// Errors that can occur while running kubectl.
#[derive(Error, Debug)]
pub enum KubectlError {
    /// No kubectl binary was found.
    #[error("kubectl not found")]
    KubectlNotFound,

    /// kubectl has no usable kubeconfig.
    #[error("kubectl is not configured: {0}")]
    NotConfigured(String),

    /// The API server could not be reached.
    #[error("Cluster not reachable: {0}")]
    ClusterNotConnected(String),

    /// The command did not finish in time.
    #[error("kubectl command timed out")]
    Timeout,

    /// The server reported that the resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The server reported that the resource already exists.
    #[error("{0}")]
    AlreadyExists(String),

    /// The server refused the request for the current identity.
    #[error("{0}")]
    Forbidden(String),

    /// The server rejected the object as invalid.
    #[error("{0}")]
    Invalid(String),

    /// A local port is already taken.
    #[error("Local port {0} is already in use")]
    PortConflict(u16),

    /// kubectl failed for another reason.
    #[error("kubectl failed: {0}")]
    CommandFailed(String),

    /// Output could not be parsed.
    #[error("Failed to parse kubectl output: {0}")]
    ParsingFailed(String),

    /// I/O error while spawning or talking to kubectl.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// stderr fragments that mean the API server could not be reached.
pub(crate) const CONNECTION_ERRORS: &[&str] = &[
    "connection refused",
    "was refused",
    "unable to connect to the server",
    "dial tcp",
    "i/o timeout",
    "tls handshake timeout",
    "no such host",
    "connection reset by peer",
    "context deadline exceeded",
    "(serviceunavailable)",
    "(timeout)",
];

/// stderr fragments that mean kubectl has no kubeconfig to work with.
const CONFIG_ERRORS: &[&str] = &[
    "no configuration has been provided",
    "error loading config file",
    "invalid configuration",
    "current-context is not set",
];

impl KubectlError {
    /// Classifies kubectl's stderr into an error variant.
    pub fn from_kubectl_error(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if CONFIG_ERRORS.iter().any(|p| lower.contains(p)) {
            Self::NotConfigured(message)
        } else if CONNECTION_ERRORS.iter().any(|p| lower.contains(p)) {
            Self::ClusterNotConnected(message)
        } else if lower.contains("(notfound)") || lower.contains(" not found") {
            Self::NotFound(message)
        } else if lower.contains("(alreadyexists)") || lower.contains("already exists") {
            Self::AlreadyExists(message)
        } else if lower.contains("(forbidden)")
            || lower.contains("(unauthorized)")
            || lower.contains("forbidden")
            || lower.contains("must be logged in")
        {
            Self::Forbidden(message)
        } else if lower.contains("(invalid)") || lower.contains("is invalid") {
            Self::Invalid(message)
        } else if let Some(port) = detect_port_conflict(&message) {
            Self::PortConflict(port)
        } else {
            Self::CommandFailed(message)
        }
    }

    /// The kind this error maps to in the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KubectlNotFound | Self::NotConfigured(_) => ErrorKind::BackendUnavailable,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::BackendUnavailable
            }
            Self::ClusterNotConnected(_) | Self::Timeout => ErrorKind::TransientNetworkError,
            Self::NotFound(_) => ErrorKind::ResourceNotFound,
            Self::AlreadyExists(_) => ErrorKind::ResourceAlreadyExists,
            Self::Forbidden(_) => ErrorKind::PermissionDenied,
            Self::Invalid(_) | Self::PortConflict(_) => ErrorKind::InvalidArgument,
            Self::CommandFailed(_) | Self::ParsingFailed(_) | Self::Io(_) => ErrorKind::Unknown,
        }
    }
}

impl From<KubectlError> for ErrorInfo {
    fn from(error: KubectlError) -> Self {
        ErrorInfo::new(error.kind(), error.to_string())
    }
}

/// Checks if a line of kubectl output reports an error.
pub fn is_error_line(line: &str) -> bool {
    let line_lower = line.to_lowercase();
    line_lower.starts_with("error")
        || line_lower.contains("unable to")
        || line_lower.contains("failed")
        || line_lower.contains("connection refused")
        || line_lower.contains("lost connection")
}

/// Detects a local port conflict in a kubectl output line.
/// Returns the conflicting port if detected.
pub fn detect_port_conflict(line: &str) -> Option<u16> {
    // kubectl format: "unable to listen on port 8080: ... listen tcp4 127.0.0.1:8080: bind: address already in use"
    if !line.to_lowercase().contains("address already in use") {
        return None;
    }

    // Take the first number after a colon that is too large to be an IP octet.
    line.split(':').skip(1).find_map(|part| {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u16>().ok().filter(|port| *port > 255)
    })
}
