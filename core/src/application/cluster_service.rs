//! Cluster service - Caller-facing operations.
//!
//! Each method builds one `Operation` and hands it to the dispatcher, so
//! validation and fallback behave the same for every entry point.

use std::collections::BTreeMap;

use tracing::info;
use uuid::Uuid;

use super::dispatcher::Dispatcher;
use crate::adapters::{AnyBackend, ForwardInfo, ForwardRegistry};
use crate::config::Settings;
use crate::domain::{
    Attributes, ErrorInfo, ErrorKind, ExecutionMode, Operation, OperationResult, PortMapping,
    ResourceKind, ResourceRequest, Verb,
};
use crate::ports::ClusterBackend;
use crate::query;

/// Service for pod, deployment and namespace operations.
pub struct ClusterService<B: ClusterBackend> {
    dispatcher: Dispatcher<B>,
    forwards: ForwardRegistry,
    default_namespace: String,
}

impl ClusterService<AnyBackend> {
    /// Builds both backends as configured.
    pub async fn from_settings(settings: &Settings) -> Self {
        let forwards = ForwardRegistry::new();
        let primary = AnyBackend::for_mode(settings.primary, settings, forwards.clone()).await;
        let secondary = match settings.secondary() {
            Some(mode) => Some(AnyBackend::for_mode(mode, settings, forwards.clone()).await),
            None => None,
        };

        info!(
            primary = %settings.primary,
            primary_available = primary.is_available(),
            fallback = ?settings.secondary(),
            "cluster service ready"
        );

        Self::new(
            Dispatcher::new(primary, secondary),
            forwards,
            &settings.default_namespace,
        )
    }
}

impl<B: ClusterBackend> ClusterService<B> {
    pub fn new(dispatcher: Dispatcher<B>, forwards: ForwardRegistry, default_namespace: &str) -> Self {
        Self {
            dispatcher,
            forwards,
            default_namespace: default_namespace.to_string(),
        }
    }

    pub fn primary_mode(&self) -> ExecutionMode {
        self.dispatcher.primary_mode()
    }

    pub fn secondary_mode(&self) -> Option<ExecutionMode> {
        self.dispatcher.secondary_mode()
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn namespace(&self, namespace: Option<&str>) -> String {
        namespace.unwrap_or(&self.default_namespace).to_string()
    }

    async fn run(&self, verb: Verb, request: ResourceRequest) -> OperationResult {
        self.dispatcher.dispatch(&Operation::new(verb, request)).await
    }

    // =========================================================================
    // Pods
    // =========================================================================

    pub async fn create_pod(
        &self,
        name: &str,
        namespace: Option<&str>,
        attributes: Attributes,
    ) -> OperationResult {
        let request = ResourceRequest::pod(name, self.namespace(namespace)).with_attributes(attributes);
        self.run(Verb::Create, request).await
    }

    pub async fn get_pod(&self, name: &str, namespace: Option<&str>) -> OperationResult {
        self.run(Verb::Get, ResourceRequest::pod(name, self.namespace(namespace)))
            .await
    }

    /// Merges `labels` into the pod's labels.
    pub async fn update_pod_labels(
        &self,
        name: &str,
        namespace: Option<&str>,
        labels: BTreeMap<String, String>,
    ) -> OperationResult {
        let request = ResourceRequest::pod(name, self.namespace(namespace)).with_attributes(Attributes {
            labels,
            ..Attributes::default()
        });
        self.run(Verb::Update, request).await
    }

    pub async fn delete_pod(
        &self,
        name: &str,
        namespace: Option<&str>,
        grace_period: Option<u32>,
    ) -> OperationResult {
        let request = ResourceRequest::pod(name, self.namespace(namespace)).with_attributes(Attributes {
            grace_period,
            ..Attributes::default()
        });
        self.run(Verb::Delete, request).await
    }

    pub async fn list_pods(&self, namespace: Option<&str>, label_selector: Option<&str>) -> OperationResult {
        self.run(Verb::List, self.collection(ResourceKind::Pod, namespace, label_selector))
            .await
    }

    /// Starts forwarding `127.0.0.1:<local>` to `<remote>` on the pod.
    pub async fn port_forward(&self, name: &str, namespace: Option<&str>, ports: PortMapping) -> OperationResult {
        let request = ResourceRequest::pod(name, self.namespace(namespace)).with_attributes(Attributes {
            ports: Some(ports),
            ..Attributes::default()
        });
        self.run(Verb::PortForward, request).await
    }

    // =========================================================================
    // Deployments
    // =========================================================================

    pub async fn create_deployment(
        &self,
        name: &str,
        namespace: Option<&str>,
        attributes: Attributes,
    ) -> OperationResult {
        let request =
            ResourceRequest::deployment(name, self.namespace(namespace)).with_attributes(attributes);
        self.run(Verb::Create, request).await
    }

    pub async fn get_deployment(&self, name: &str, namespace: Option<&str>) -> OperationResult {
        self.run(
            Verb::Get,
            ResourceRequest::deployment(name, self.namespace(namespace)),
        )
        .await
    }

    /// Patches replicas, image and labels; only the ones set in `attributes`.
    pub async fn update_deployment(
        &self,
        name: &str,
        namespace: Option<&str>,
        attributes: Attributes,
    ) -> OperationResult {
        let request =
            ResourceRequest::deployment(name, self.namespace(namespace)).with_attributes(attributes);
        self.run(Verb::Update, request).await
    }

    pub async fn delete_deployment(&self, name: &str, namespace: Option<&str>) -> OperationResult {
        self.run(
            Verb::Delete,
            ResourceRequest::deployment(name, self.namespace(namespace)),
        )
        .await
    }

    pub async fn list_deployments(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> OperationResult {
        self.run(
            Verb::List,
            self.collection(ResourceKind::Deployment, namespace, label_selector),
        )
        .await
    }

    pub async fn scale_deployment(&self, name: &str, namespace: Option<&str>, replicas: i64) -> OperationResult {
        let request = ResourceRequest::deployment(name, self.namespace(namespace)).with_attributes(Attributes {
            replicas: Some(replicas),
            ..Attributes::default()
        });
        self.run(Verb::Scale, request).await
    }

    // =========================================================================
    // Namespaces
    // =========================================================================

    pub async fn create_namespace(&self, name: &str, labels: BTreeMap<String, String>) -> OperationResult {
        let request = ResourceRequest::namespace(name).with_attributes(Attributes {
            labels,
            ..Attributes::default()
        });
        self.run(Verb::Create, request).await
    }

    pub async fn get_namespace(&self, name: &str) -> OperationResult {
        self.run(Verb::Get, ResourceRequest::namespace(name)).await
    }

    pub async fn delete_namespace(&self, name: &str) -> OperationResult {
        self.run(Verb::Delete, ResourceRequest::namespace(name)).await
    }

    pub async fn list_namespaces(&self, label_selector: Option<&str>) -> OperationResult {
        self.run(
            Verb::List,
            self.collection(ResourceKind::Namespace, None, label_selector),
        )
        .await
    }

    // =========================================================================
    // Cluster
    // =========================================================================

    /// Asks the API server for its version.
    pub async fn cluster_ping(&self) -> OperationResult {
        self.dispatcher.dispatch(&Operation::Ping).await
    }

    /// Runs a read-only get or list derived from free text.
    ///
    /// A namespace named in the query wins over `namespace`, which wins over
    /// the configured default.
    pub async fn process_query(&self, query: &str, namespace: Option<&str>) -> OperationResult {
        let Some(request) = query::interpret(query, &self.namespace(namespace)) else {
            return OperationResult::failed(ErrorInfo::invalid_argument(format!(
                "could not find a pod, deployment or namespace in '{}'",
                query.trim()
            )));
        };

        let verb = if request.name.is_empty() {
            Verb::List
        } else {
            Verb::Get
        };
        self.run(verb, request).await
    }

    // =========================================================================
    // Port forwards
    // =========================================================================

    /// Stops a running port-forward.
    pub async fn stop_port_forward(&self, id: Uuid) -> OperationResult {
        match self.forwards.stop(id).await {
            Some(info) => OperationResult::ok(info.to_output()),
            None => OperationResult::failed(ErrorInfo::new(
                ErrorKind::ResourceNotFound,
                format!("no active port-forward with id {}", id),
            )),
        }
    }

    /// Stops every running port-forward and returns how many were stopped.
    pub async fn stop_all_port_forwards(&self) -> usize {
        self.forwards.stop_all().await
    }

    pub fn active_port_forwards(&self) -> Vec<ForwardInfo> {
        self.forwards.list()
    }

    fn collection(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> ResourceRequest {
        let namespace = if kind.is_namespaced() {
            self.namespace(namespace)
        } else {
            String::new()
        };
        ResourceRequest::collection(kind, namespace).with_attributes(Attributes {
            label_selector: label_selector.map(str::to_string),
            ..Attributes::default()
        })
    }
}
