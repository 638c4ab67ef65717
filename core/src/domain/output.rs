//! Normalized operation output.
//!
//! Both backends end up with `k8s-openapi` objects (the CLI backend asks
//! kubectl for `-o json`), and both map them into these summaries, so callers
//! see the same shape regardless of which backend served a request.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v1::Scale;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::helm::{ChartSummary, ReleaseSummary, RepositorySummary};
use super::request::ResourceKind;

/// Summary of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    pub phase: Option<String>,
    pub ip: Option<String>,
    pub node: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl From<&Pod> for PodSummary {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        Self {
            name: pod.name_any(),
            namespace: pod.namespace().unwrap_or_default(),
            phase: status.and_then(|s| s.phase.clone()),
            ip: status.and_then(|s| s.pod_ip.clone()),
            node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            labels: pod.labels().clone(),
        }
    }
}

/// Summary of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub namespace: String,
    pub replicas: Option<i32>,
    pub available: Option<i32>,
    pub ready: Option<i32>,
    pub image: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

impl From<&Deployment> for DeploymentSummary {
    fn from(deployment: &Deployment) -> Self {
        let spec = deployment.spec.as_ref();
        let status = deployment.status.as_ref();
        Self {
            name: deployment.name_any(),
            namespace: deployment.namespace().unwrap_or_default(),
            replicas: spec.and_then(|s| s.replicas),
            available: status.and_then(|s| s.available_replicas),
            ready: status.and_then(|s| s.ready_replicas),
            image: spec
                .and_then(|s| s.template.spec.as_ref())
                .and_then(|s| s.containers.first())
                .and_then(|c| c.image.clone()),
            labels: deployment.labels().clone(),
            selector: spec
                .and_then(|s| s.selector.match_labels.clone())
                .unwrap_or_default(),
        }
    }
}

/// Summary of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub name: String,
    pub phase: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl From<&Namespace> for NamespaceSummary {
    fn from(namespace: &Namespace) -> Self {
        Self {
            name: namespace.name_any(),
            phase: namespace.status.as_ref().and_then(|s| s.phase.clone()),
            labels: namespace.labels().clone(),
        }
    }
}

/// What a successful operation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ResourceOutput {
    Pod(PodSummary),
    Pods(Vec<PodSummary>),
    Deployment(DeploymentSummary),
    Deployments(Vec<DeploymentSummary>),
    Namespace(NamespaceSummary),
    Namespaces(Vec<NamespaceSummary>),
    Deleted {
        kind: ResourceKind,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
    Scaled {
        name: String,
        namespace: String,
        replicas: i32,
    },
    Forwarding {
        id: Uuid,
        pod: String,
        namespace: String,
        local_port: u16,
        remote_port: u16,
    },
    Cluster {
        server_version: String,
    },
    Releases(Vec<ReleaseSummary>),
    Release(ReleaseSummary),
    ReleaseUninstalled {
        name: String,
        namespace: String,
    },
    ReleaseValues {
        name: String,
        namespace: String,
        values: Value,
    },
    RolledBack {
        name: String,
        namespace: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        revision: Option<u32>,
    },
    Repositories(Vec<RepositorySummary>),
    RepositoryAdded {
        name: String,
        url: String,
    },
    RepositoryRemoved {
        name: String,
    },
    RepositoriesUpdated,
    Charts(Vec<ChartSummary>),
}

impl ResourceOutput {
    pub fn pods<'a>(pods: impl IntoIterator<Item = &'a Pod>) -> Self {
        let mut summaries: Vec<PodSummary> = pods.into_iter().map(PodSummary::from).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Self::Pods(summaries)
    }

    pub fn deployments<'a>(deployments: impl IntoIterator<Item = &'a Deployment>) -> Self {
        let mut summaries: Vec<DeploymentSummary> =
            deployments.into_iter().map(DeploymentSummary::from).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Self::Deployments(summaries)
    }

    pub fn namespaces<'a>(namespaces: impl IntoIterator<Item = &'a Namespace>) -> Self {
        let mut summaries: Vec<NamespaceSummary> =
            namespaces.into_iter().map(NamespaceSummary::from).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Self::Namespaces(summaries)
    }

    /// Output of a scale call, taken from the returned `Scale` object.
    pub fn scaled(name: &str, namespace: &str, requested: i32, scale: &Scale) -> Self {
        Self::Scaled {
            name: name.to_string(),
            namespace: namespace.to_string(),
            replicas: scale
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or(requested),
        }
    }

    pub fn deleted(kind: ResourceKind, name: &str, namespace: &str) -> Self {
        Self::Deleted {
            kind,
            name: name.to_string(),
            namespace: kind.is_namespaced().then(|| namespace.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_fixture() -> Pod {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "web-1",
                "namespace": "default",
                "labels": { "app": "web" }
            },
            "spec": {
                "nodeName": "node-a",
                "containers": [{ "name": "web-1", "image": "nginx:latest" }]
            },
            "status": { "phase": "Running", "podIP": "10.0.0.12" }
        }))
        .unwrap()
    }

    #[test]
    fn test_pod_summary() {
        let summary = PodSummary::from(&pod_fixture());
        assert_eq!(summary.name, "web-1");
        assert_eq!(summary.namespace, "default");
        assert_eq!(summary.phase.as_deref(), Some("Running"));
        assert_eq!(summary.ip.as_deref(), Some("10.0.0.12"));
        assert_eq!(summary.node.as_deref(), Some("node-a"));
        assert_eq!(summary.labels.get("app").map(String::as_str), Some("web"));
    }

    #[test]
    fn test_deployment_summary() {
        let deployment: Deployment = serde_json::from_value(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "api", "namespace": "prod" },
            "spec": {
                "replicas": 3,
                "selector": { "matchLabels": { "app": "api" } },
                "template": {
                    "metadata": { "labels": { "app": "api" } },
                    "spec": { "containers": [{ "name": "api", "image": "api:1.2" }] }
                }
            },
            "status": { "availableReplicas": 2, "readyReplicas": 2 }
        }))
        .unwrap();

        let summary = DeploymentSummary::from(&deployment);
        assert_eq!(summary.replicas, Some(3));
        assert_eq!(summary.available, Some(2));
        assert_eq!(summary.image.as_deref(), Some("api:1.2"));
        assert_eq!(summary.selector.get("app").map(String::as_str), Some("api"));
    }

    #[test]
    fn test_pod_list_sorted() {
        let mut second = pod_fixture();
        second.metadata.name = Some("aaa".to_string());
        let pods = vec![pod_fixture(), second];

        let ResourceOutput::Pods(summaries) = ResourceOutput::pods(&pods) else {
            panic!("expected pod list");
        };
        assert_eq!(summaries[0].name, "aaa");
        assert_eq!(summaries[1].name, "web-1");
    }

    #[test]
    fn test_deleted_namespace_has_no_namespace() {
        let output = ResourceOutput::deleted(ResourceKind::Namespace, "team-a", "");
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["type"], "deleted");
        assert_eq!(json["data"]["kind"], "namespace");
        assert!(json["data"].get("namespace").is_none());
    }
}
