//! Namespace commands.

use anyhow::Result;
use kubedispatch_core::{AnyBackend, ClusterService};

use super::output::print_result;
use super::to_map;

type Service = ClusterService<AnyBackend>;

pub async fn create(service: &Service, name: &str, labels: Vec<(String, String)>, json: bool) -> Result<()> {
    print_result(&service.create_namespace(name, to_map(labels)).await, json)
}

pub async fn get(service: &Service, name: &str, json: bool) -> Result<()> {
    print_result(&service.get_namespace(name).await, json)
}

pub async fn delete(service: &Service, name: &str, json: bool) -> Result<()> {
    print_result(&service.delete_namespace(name).await, json)
}

pub async fn list(service: &Service, selector: Option<&str>, json: bool) -> Result<()> {
    print_result(&service.list_namespaces(selector).await, json)
}
