//! Logical operations routed by the dispatcher.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::request::{ResourceKind, ResourceRequest};
use super::result::ErrorInfo;

/// What to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verb {
    Create,
    Get,
    Update,
    Delete,
    List,
    Scale,
    PortForward,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Scale => "scale",
            Self::PortForward => "port-forward",
        }
    }

    /// Whether the verb targets a single named resource.
    pub fn requires_name(&self) -> bool {
        !matches!(self, Self::List)
    }

    /// Whether the verb is defined for the given kind.
    pub fn supports(&self, kind: ResourceKind) -> bool {
        match self {
            Self::Create | Self::Get | Self::Delete | Self::List => true,
            Self::Update => kind != ResourceKind::Namespace,
            Self::Scale => kind == ResourceKind::Deployment,
            Self::PortForward => kind == ResourceKind::Pod,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully described logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Act on a resource or collection.
    Resource { verb: Verb, request: ResourceRequest },
    /// Check that the cluster answers.
    Ping,
}

impl Operation {
    pub fn new(verb: Verb, request: ResourceRequest) -> Self {
        Self::Resource { verb, request }
    }

    pub fn request(&self) -> Option<&ResourceRequest> {
        match self {
            Self::Resource { request, .. } => Some(request),
            Self::Ping => None,
        }
    }

    /// Checks everything that can be checked without talking to the cluster.
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        let Self::Resource { verb, request } = self else {
            return Ok(());
        };

        if !verb.supports(request.kind) {
            return Err(ErrorInfo::invalid_argument(format!(
                "'{}' is not supported for {} resources",
                verb, request.kind
            )));
        }

        request.validate_names(verb.requires_name())?;

        let attributes = &request.attributes;
        if let Some(replicas) = attributes.replicas {
            if replicas < 0 || replicas > i64::from(i32::MAX) {
                return Err(ErrorInfo::invalid_argument(format!(
                    "replicas must be a non-negative integer, got {}",
                    replicas
                )));
            }
        }

        match verb {
            Verb::Scale if attributes.replicas.is_none() => {
                return Err(ErrorInfo::invalid_argument("scale requires a replica count"));
            }
            Verb::Update => {
                let has_changes = match request.kind {
                    ResourceKind::Deployment => {
                        attributes.replicas.is_some()
                            || attributes.image.is_some()
                            || !attributes.labels.is_empty()
                    }
                    _ => !attributes.labels.is_empty(),
                };
                if !has_changes {
                    return Err(ErrorInfo::invalid_argument(format!(
                        "nothing to update for {} {}",
                        request.kind,
                        request.display_id()
                    )));
                }
            }
            Verb::PortForward => match attributes.ports {
                None => {
                    return Err(ErrorInfo::invalid_argument(
                        "port-forward requires a LOCAL:REMOTE port mapping",
                    ))
                }
                Some(ports) if ports.local == 0 || ports.remote == 0 => {
                    return Err(ErrorInfo::invalid_argument("ports must be between 1 and 65535"));
                }
                Some(_) => {}
            },
            _ => {}
        }

        if attributes.container_port == Some(0) {
            return Err(ErrorInfo::invalid_argument(
                "container port must be between 1 and 65535",
            ));
        }

        Ok(())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource { verb, request } if request.name.is_empty() => {
                write!(f, "{} {} in {}", verb, request.kind.plural(), request.namespace)
            }
            Self::Resource { verb, request } => {
                write!(f, "{} {} {}", verb, request.kind, request.display_id())
            }
            Self::Ping => f.write_str("ping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attributes, ErrorKind, PortMapping};

    fn scale(replicas: i64) -> Operation {
        Operation::new(
            Verb::Scale,
            ResourceRequest::deployment("api", "prod").with_attributes(Attributes {
                replicas: Some(replicas),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_scale_replicas_validation() {
        assert!(scale(5).validate().is_ok());
        assert!(scale(0).validate().is_ok());

        let err = scale(-1).validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_scale_without_replicas() {
        let op = Operation::new(Verb::Scale, ResourceRequest::deployment("api", "prod"));
        assert_eq!(op.validate().unwrap_err().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unsupported_combinations() {
        let op = Operation::new(Verb::Scale, ResourceRequest::pod("web-1", "default"));
        assert_eq!(op.validate().unwrap_err().kind, ErrorKind::InvalidArgument);

        let op = Operation::new(Verb::Update, ResourceRequest::namespace("team-a"));
        assert_eq!(op.validate().unwrap_err().kind, ErrorKind::InvalidArgument);

        let op = Operation::new(Verb::PortForward, ResourceRequest::deployment("api", "prod"));
        assert_eq!(op.validate().unwrap_err().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_update_requires_changes() {
        let op = Operation::new(Verb::Update, ResourceRequest::pod("web-1", "default"));
        assert_eq!(op.validate().unwrap_err().kind, ErrorKind::InvalidArgument);

        let mut request = ResourceRequest::deployment("api", "prod");
        request.attributes.image = Some("api:2".to_string());
        assert!(Operation::new(Verb::Update, request).validate().is_ok());
    }

    #[test]
    fn test_invalid_name_checked_before_arguments() {
        let op = Operation::new(
            Verb::Scale,
            ResourceRequest::deployment("API", "prod").with_attributes(Attributes {
                replicas: Some(-1),
                ..Default::default()
            }),
        );
        assert_eq!(op.validate().unwrap_err().kind, ErrorKind::InvalidName);
    }

    #[test]
    fn test_port_forward_validation() {
        let mut request = ResourceRequest::pod("web-1", "default");
        let op = Operation::new(Verb::PortForward, request.clone());
        assert!(op.validate().is_err());

        request.attributes.ports = Some(PortMapping { local: 0, remote: 80 });
        let op = Operation::new(Verb::PortForward, request.clone());
        assert!(op.validate().is_err());

        request.attributes.ports = Some(PortMapping { local: 8080, remote: 80 });
        let op = Operation::new(Verb::PortForward, request);
        assert!(op.validate().is_ok());
    }

    #[test]
    fn test_display() {
        let op = Operation::new(Verb::Get, ResourceRequest::pod("web-1", "default"));
        assert_eq!(op.to_string(), "get pod default/web-1");

        let op = Operation::new(
            Verb::List,
            ResourceRequest::collection(ResourceKind::Deployment, "prod"),
        );
        assert_eq!(op.to_string(), "list deployments in prod");
        assert_eq!(Operation::Ping.to_string(), "ping");
    }
}
