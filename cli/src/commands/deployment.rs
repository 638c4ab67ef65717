//! Deployment commands.

use anyhow::Result;
use kubedispatch_core::{AnyBackend, Attributes, ClusterService};

use super::output::print_result;
use super::to_map;

type Service = ClusterService<AnyBackend>;

pub async fn create(
    service: &Service,
    name: &str,
    namespace: Option<&str>,
    attributes: Attributes,
    json: bool,
) -> Result<()> {
    let result = service.create_deployment(name, namespace, attributes).await;
    print_result(&result, json)
}

pub async fn get(service: &Service, name: &str, namespace: Option<&str>, json: bool) -> Result<()> {
    print_result(&service.get_deployment(name, namespace).await, json)
}

pub async fn update(
    service: &Service,
    name: &str,
    namespace: Option<&str>,
    replicas: Option<i64>,
    image: Option<String>,
    labels: Vec<(String, String)>,
    json: bool,
) -> Result<()> {
    let attributes = Attributes {
        replicas,
        image,
        labels: to_map(labels),
        ..Attributes::default()
    };
    let result = service.update_deployment(name, namespace, attributes).await;
    print_result(&result, json)
}

pub async fn delete(service: &Service, name: &str, namespace: Option<&str>, json: bool) -> Result<()> {
    print_result(&service.delete_deployment(name, namespace).await, json)
}

pub async fn list(
    service: &Service,
    namespace: Option<&str>,
    selector: Option<&str>,
    json: bool,
) -> Result<()> {
    print_result(&service.list_deployments(namespace, selector).await, json)
}

pub async fn scale(
    service: &Service,
    name: &str,
    namespace: Option<&str>,
    replicas: i64,
    json: bool,
) -> Result<()> {
    print_result(&service.scale_deployment(name, namespace, replicas).await, json)
}
