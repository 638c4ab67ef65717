//! Pod commands.

use anyhow::Result;
use kubedispatch_core::{AnyBackend, Attributes, ClusterService, PortMapping};
use tracing::info;

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
    let result = service.create_pod(name, namespace, attributes).await;
    print_result(&result, json)
}

pub async fn get(service: &Service, name: &str, namespace: Option<&str>, json: bool) -> Result<()> {
    print_result(&service.get_pod(name, namespace).await, json)
}

pub async fn label(
    service: &Service,
    name: &str,
    namespace: Option<&str>,
    labels: Vec<(String, String)>,
    json: bool,
) -> Result<()> {
    let result = service.update_pod_labels(name, namespace, to_map(labels)).await;
    print_result(&result, json)
}

pub async fn delete(
    service: &Service,
    name: &str,
    namespace: Option<&str>,
    grace_period: Option<u32>,
    json: bool,
) -> Result<()> {
    let result = service.delete_pod(name, namespace, grace_period).await;
    print_result(&result, json)
}

pub async fn list(
    service: &Service,
    namespace: Option<&str>,
    selector: Option<&str>,
    json: bool,
) -> Result<()> {
    print_result(&service.list_pods(namespace, selector).await, json)
}

/// Starts a forward and keeps it open until Ctrl+C.
pub async fn forward(
    service: &Service,
    name: &str,
    namespace: Option<&str>,
    ports: PortMapping,
    json: bool,
) -> Result<()> {
    let result = service.port_forward(name, namespace, ports).await;
    print_result(&result, json)?;

    if !json {
        println!("Press Ctrl+C to stop.");
    }
    tokio::signal::ctrl_c().await?;

    let stopped = service.stop_all_port_forwards().await;
    info!(stopped, "port forwards stopped");
    Ok(())
}
