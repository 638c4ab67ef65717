//! Cluster-wide commands: ping and free-text queries.

use anyhow::Result;
use kubedispatch_core::{AnyBackend, ClusterService};

use super::output::print_result;

type Service = ClusterService<AnyBackend>;

pub async fn ping(service: &Service, json: bool) -> Result<()> {
    print_result(&service.cluster_ping().await, json)
}

pub async fn query(service: &Service, text: &str, namespace: Option<&str>, json: bool) -> Result<()> {
    print_result(&service.process_query(text, namespace).await, json)
}
