//! Manifests and patches built from resource requests.
//!
//! Both backends send exactly these objects: the SDK backend through
//! `kube::Api`, the CLI backend as JSON on kubectl's stdin or `-p` flag.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Namespace, Pod, PodSpec, PodTemplateSpec,
    ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use serde_json::{json, Value};

use super::request::{ResourceLimits, ResourceRequest};

/// Image used when a create request does not name one.
pub const DEFAULT_IMAGE: &str = "nginx:latest";

/// Replica count used when a deployment create request does not give one.
pub const DEFAULT_REPLICAS: i32 = 1;

/// Builds the pod for a create request.
pub fn pod(request: &ResourceRequest) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(request.namespace.clone()),
            labels: Some(request.labels_or_default()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container(request)],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds the deployment for a create request.
pub fn deployment(request: &ResourceRequest) -> Deployment {
    let labels = request.labels_or_default();

    Deployment {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(request.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas(request).unwrap_or(DEFAULT_REPLICAS)),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container(request)],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds the namespace for a create request. No default labels are added.
pub fn namespace(request: &ResourceRequest) -> Namespace {
    let labels = &request.attributes.labels;
    Namespace {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            labels: (!labels.is_empty()).then(|| labels.clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Strategic merge patch that merges `labels` into a pod's labels.
pub fn pod_labels_patch(request: &ResourceRequest) -> Value {
    json!({ "metadata": { "labels": request.attributes.labels } })
}

/// Strategic merge patch for a deployment update.
///
/// Replicas, image and labels are patched independently. The selector is
/// immutable and is left alone; new labels are merged into the object and
/// its pod template.
pub fn deployment_patch(request: &ResourceRequest) -> Value {
    let attributes = &request.attributes;
    let mut spec = serde_json::Map::new();
    let mut template = serde_json::Map::new();

    if let Some(replicas) = replicas(request) {
        spec.insert("replicas".to_string(), json!(replicas));
    }

    if let Some(image) = &attributes.image {
        template.insert(
            "spec".to_string(),
            json!({ "containers": [{ "name": request.name, "image": image }] }),
        );
    }

    let mut patch = serde_json::Map::new();
    if !attributes.labels.is_empty() {
        patch.insert(
            "metadata".to_string(),
            json!({ "labels": attributes.labels }),
        );
        template.insert(
            "metadata".to_string(),
            json!({ "labels": attributes.labels }),
        );
    }

    if !template.is_empty() {
        spec.insert("template".to_string(), Value::Object(template));
    }
    if !spec.is_empty() {
        patch.insert("spec".to_string(), Value::Object(spec));
    }

    Value::Object(patch)
}

/// Merge patch for the `scale` subresource.
pub fn scale_patch(replicas: i32) -> Value {
    json!({ "spec": { "replicas": replicas } })
}

/// Replica count as the API expects it. Range is checked during validation.
pub fn replicas(request: &ResourceRequest) -> Option<i32> {
    request
        .attributes
        .replicas
        .and_then(|r| i32::try_from(r).ok())
}

fn container(request: &ResourceRequest) -> Container {
    let attributes = &request.attributes;

    Container {
        name: request.name.clone(),
        image: Some(
            attributes
                .image
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        ),
        env: (!attributes.env.is_empty()).then(|| {
            attributes
                .env
                .iter()
                .map(|(name, value)| EnvVar {
                    name: name.clone(),
                    value: Some(value.clone()),
                    ..Default::default()
                })
                .collect()
        }),
        ports: attributes.container_port.map(|port| {
            vec![ContainerPort {
                container_port: i32::from(port),
                ..Default::default()
            }]
        }),
        resources: attributes
            .resources
            .as_ref()
            .filter(|r| !r.is_empty())
            .map(resource_requirements),
        ..Default::default()
    }
}

fn resource_requirements(limits: &ResourceLimits) -> ResourceRequirements {
    fn quantities(values: &BTreeMap<String, String>) -> Option<BTreeMap<String, Quantity>> {
        (!values.is_empty()).then(|| {
            values
                .iter()
                .map(|(k, v)| (k.clone(), Quantity(v.clone())))
                .collect()
        })
    }

    ResourceRequirements {
        requests: quantities(&limits.requests),
        limits: quantities(&limits.limits),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Attributes;

    #[test]
    fn test_pod_manifest_defaults() {
        let pod = pod(&ResourceRequest::pod("web-1", "default"));
        assert_eq!(pod.metadata.name.as_deref(), Some("web-1"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("default"));

        let labels = pod.metadata.labels.unwrap();
        assert_eq!(labels.get("app").map(String::as_str), Some("web-1"));

        let container = &pod.spec.unwrap().containers[0];
        assert_eq!(container.name, "web-1");
        assert_eq!(container.image.as_deref(), Some(DEFAULT_IMAGE));
        assert!(container.env.is_none());
        assert!(container.resources.is_none());
    }

    #[test]
    fn test_pod_manifest_serializes_type_meta() {
        let value = serde_json::to_value(pod(&ResourceRequest::pod("web-1", "default"))).unwrap();
        assert_eq!(value["apiVersion"], "v1");
        assert_eq!(value["kind"], "Pod");
    }

    #[test]
    fn test_deployment_manifest() {
        let request = ResourceRequest::deployment("api", "prod").with_attributes(Attributes {
            image: Some("api:1.2".to_string()),
            replicas: Some(3),
            env: BTreeMap::from([("MODE".to_string(), "prod".to_string())]),
            container_port: Some(8080),
            resources: Some(ResourceLimits {
                requests: BTreeMap::from([("cpu".to_string(), "100m".to_string())]),
                limits: BTreeMap::new(),
            }),
            ..Default::default()
        });

        let deployment = deployment(&request);
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(
            spec.selector.match_labels.unwrap().get("app").map(String::as_str),
            Some("api")
        );

        let container = &spec.template.spec.unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("api:1.2"));
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 8080);
        assert_eq!(container.env.as_ref().unwrap()[0].name, "MODE");

        let resources = container.resources.as_ref().unwrap();
        assert_eq!(
            resources.requests.as_ref().unwrap().get("cpu"),
            Some(&Quantity("100m".to_string()))
        );
        assert!(resources.limits.is_none());
    }

    #[test]
    fn test_namespace_manifest_has_no_default_labels() {
        let namespace = namespace(&ResourceRequest::namespace("team-a"));
        assert_eq!(namespace.metadata.name.as_deref(), Some("team-a"));
        assert!(namespace.metadata.labels.is_none());
    }

    #[test]
    fn test_deployment_patch() {
        let request = ResourceRequest::deployment("api", "prod").with_attributes(Attributes {
            replicas: Some(2),
            image: Some("api:1.3".to_string()),
            labels: BTreeMap::from([("tier".to_string(), "backend".to_string())]),
            ..Default::default()
        });

        let patch = deployment_patch(&request);
        assert_eq!(patch["spec"]["replicas"], 2);
        assert_eq!(patch["spec"]["template"]["spec"]["containers"][0]["name"], "api");
        assert_eq!(patch["spec"]["template"]["spec"]["containers"][0]["image"], "api:1.3");
        assert_eq!(patch["metadata"]["labels"]["tier"], "backend");
        assert_eq!(patch["spec"]["template"]["metadata"]["labels"]["tier"], "backend");
        assert!(patch["spec"].get("selector").is_none());
    }

    #[test]
    fn test_deployment_patch_replicas_only() {
        let request = ResourceRequest::deployment("api", "prod").with_attributes(Attributes {
            replicas: Some(4),
            ..Default::default()
        });

        let patch = deployment_patch(&request);
        assert_eq!(patch, json!({ "spec": { "replicas": 4 } }));
    }

    #[test]
    fn test_scale_patch() {
        assert_eq!(scale_patch(5), json!({ "spec": { "replicas": 5 } }));
    }
}
