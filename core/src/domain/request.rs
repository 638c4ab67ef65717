//! Resource requests: what a caller wants to act on.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::name::dns1123_violation;
use super::result::ErrorInfo;

/// The Kubernetes resource kinds this crate manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pod,
    Deployment,
    Namespace,
}

impl ResourceKind {
    /// Resource name as used on the kubectl command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Deployment => "deployment",
            Self::Namespace => "namespace",
        }
    }

    /// Plural form used by `kubectl get`.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Pod => "pods",
            Self::Deployment => "deployments",
            Self::Namespace => "namespaces",
        }
    }

    /// Whether resources of this kind live inside a namespace.
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, Self::Namespace)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `local:remote` port pair for port forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub local: u16,
    pub remote: u16,
}

impl std::str::FromStr for PortMapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, remote) = s
            .split_once(':')
            .ok_or_else(|| format!("expected LOCAL:REMOTE, got '{}'", s))?;
        let local = local
            .trim()
            .parse()
            .map_err(|_| format!("invalid local port '{}'", local))?;
        let remote = remote
            .trim()
            .parse()
            .map_err(|_| format!("invalid remote port '{}'", remote))?;
        Ok(Self { local, remote })
    }
}

/// Container resource requests and limits, e.g. `{"cpu": "100m"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

impl ResourceLimits {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.limits.is_empty()
    }
}

/// Optional attributes of a request. Which ones matter depends on the operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub image: Option<String>,
    /// Signed so that negative input can be rejected instead of wrapping.
    pub replicas: Option<i64>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub container_port: Option<u16>,
    pub resources: Option<ResourceLimits>,
    pub grace_period: Option<u32>,
    pub label_selector: Option<String>,
    pub ports: Option<PortMapping>,
}

/// A request against one resource (or, for list operations, one collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    /// Resource name. For `Namespace` requests this is the namespace itself.
    /// Empty for list operations.
    pub name: String,
    /// Target namespace. Unused for `Namespace` requests.
    pub namespace: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceRequest {
    pub fn new(kind: ResourceKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
            attributes: Attributes::default(),
        }
    }

    pub fn pod(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(ResourceKind::Pod, name, namespace)
    }

    pub fn deployment(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(ResourceKind::Deployment, name, namespace)
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Namespace, name, "")
    }

    /// A request for a whole collection, as used by list operations.
    pub fn collection(kind: ResourceKind, namespace: impl Into<String>) -> Self {
        Self::new(kind, "", namespace)
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Validates the name (when `require_name`) and the namespace (for namespaced kinds).
    pub fn validate_names(&self, require_name: bool) -> Result<(), ErrorInfo> {
        if require_name {
            if let Some(reason) = dns1123_violation(&self.name) {
                return Err(ErrorInfo::invalid_name(format!(
                    "{} name '{}' {}",
                    self.kind, self.name, reason
                )));
            }
        }

        if self.kind.is_namespaced() {
            if let Some(reason) = dns1123_violation(&self.namespace) {
                return Err(ErrorInfo::invalid_name(format!(
                    "namespace '{}' {}",
                    self.namespace, reason
                )));
            }
        }

        Ok(())
    }

    /// Labels to apply, defaulting to `app=<name>` when none were given.
    pub fn labels_or_default(&self) -> BTreeMap<String, String> {
        if self.attributes.labels.is_empty() {
            BTreeMap::from([("app".to_string(), self.name.clone())])
        } else {
            self.attributes.labels.clone()
        }
    }

    /// `namespace/name` for namespaced kinds, `name` otherwise.
    pub fn display_id(&self) -> String {
        if self.kind.is_namespaced() {
            format!("{}/{}", self.namespace, self.name)
        } else {
            self.name.clone()
        }
    }
}
