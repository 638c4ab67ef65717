//! Backend that talks to the API server through the `kube` client.

use std::fmt::Debug;
use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::{Result, SdkError};
use crate::adapters::forward::{ForwardHandle, ForwardInfo, ForwardRegistry};
use crate::config::Settings;
use crate::domain::{
    manifest, DeploymentSummary, ErrorInfo, ExecutionMode, NamespaceSummary, Operation,
    PodSummary, ResourceKind, ResourceOutput, ResourceRequest, Verb,
};
use crate::ports::{BackendResult, ClusterBackend};

/// A resource kind handled through the generic CRUD path.
trait Managed:
    Resource + Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static
{
    fn manifest(request: &ResourceRequest) -> Self;
    fn update_patch(request: &ResourceRequest) -> Result<Value>;
    fn output(&self) -> ResourceOutput;
    fn list_output(items: &[Self]) -> ResourceOutput;
}

impl Managed for Pod {
    fn manifest(request: &ResourceRequest) -> Self {
        manifest::pod(request)
    }

    fn update_patch(request: &ResourceRequest) -> Result<Value> {
        Ok(manifest::pod_labels_patch(request))
    }

    fn output(&self) -> ResourceOutput {
        ResourceOutput::Pod(PodSummary::from(self))
    }

    fn list_output(items: &[Self]) -> ResourceOutput {
        ResourceOutput::pods(items)
    }
}

impl Managed for Deployment {
    fn manifest(request: &ResourceRequest) -> Self {
        manifest::deployment(request)
    }

    fn update_patch(request: &ResourceRequest) -> Result<Value> {
        Ok(manifest::deployment_patch(request))
    }

    fn output(&self) -> ResourceOutput {
        ResourceOutput::Deployment(DeploymentSummary::from(self))
    }

    fn list_output(items: &[Self]) -> ResourceOutput {
        ResourceOutput::deployments(items)
    }
}

impl Managed for Namespace {
    fn manifest(request: &ResourceRequest) -> Self {
        manifest::namespace(request)
    }

    fn update_patch(_: &ResourceRequest) -> Result<Value> {
        Err(SdkError::Invalid("namespaces cannot be updated".to_string()))
    }

    fn output(&self) -> ResourceOutput {
        ResourceOutput::Namespace(NamespaceSummary::from(self))
    }

    fn list_output(items: &[Self]) -> ResourceOutput {
        ResourceOutput::namespaces(items)
    }
}

/// Runs operations through a `kube::Client`.
pub struct KubeBackend {
    client: std::result::Result<Client, String>,
    timeout: Duration,
    forwards: ForwardRegistry,
}

impl KubeBackend {
    /// Builds a client from the configured kubeconfig, or from the default
    /// inference chain. Failure is kept and reported on every call.
    pub async fn connect(settings: &Settings, forwards: ForwardRegistry) -> Self {
        let client = match timeout(settings.command_timeout(), build_client(settings)).await {
            Ok(Ok(client)) => Ok(client),
            Ok(Err(reason)) => Err(reason),
            Err(_) => Err("timed out loading cluster configuration".to_string()),
        };
        if let Err(reason) = &client {
            debug!("kube client unavailable: {}", reason);
        }

        Self {
            client,
            timeout: settings.command_timeout(),
            forwards,
        }
    }

    /// Uses an existing client.
    pub fn with_client(client: Client, settings: &Settings, forwards: ForwardRegistry) -> Self {
        Self {
            client: Ok(client),
            timeout: settings.command_timeout(),
            forwards,
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_ok()
    }

    fn client(&self) -> Result<Client> {
        self.client
            .as_ref()
            .map(Client::clone)
            .map_err(|reason| SdkError::Unavailable(reason.clone()))
    }

    /// Bounds an API call by the command timeout.
    async fn timed<T>(&self, call: impl Future<Output = kube::Result<T>>) -> Result<T> {
        timeout(self.timeout, call)
            .await
            .map_err(|_| SdkError::Timeout(self.timeout))?
            .map_err(SdkError::from)
    }

    async fn run(&self, operation: &Operation) -> Result<ResourceOutput> {
        let client = self.client()?;

        let (verb, request) = match operation {
            Operation::Ping => {
                let info = self.timed(client.apiserver_version()).await?;
                return Ok(ResourceOutput::Cluster {
                    server_version: info.git_version,
                });
            }
            Operation::Resource { verb, request } => (*verb, request),
        };

        match request.kind {
            ResourceKind::Pod => {
                let pods: Api<Pod> = Api::namespaced(client, &request.namespace);
                match verb {
                    Verb::PortForward => self.port_forward(pods, request).await,
                    _ => self.crud(pods, verb, request).await,
                }
            }
            ResourceKind::Deployment => {
                let deployments: Api<Deployment> = Api::namespaced(client, &request.namespace);
                match verb {
                    Verb::Scale => self.scale(deployments, request).await,
                    _ => self.crud(deployments, verb, request).await,
                }
            }
            ResourceKind::Namespace => {
                let namespaces: Api<Namespace> = Api::all(client);
                self.crud(namespaces, verb, request).await
            }
        }
    }

    async fn crud<K: Managed>(
        &self,
        api: Api<K>,
        verb: Verb,
        request: &ResourceRequest,
    ) -> Result<ResourceOutput> {
        match verb {
            Verb::Create => {
                let created = self
                    .timed(api.create(&PostParams::default(), &K::manifest(request)))
                    .await?;
                Ok(created.output())
            }
            Verb::Get => Ok(self.timed(api.get(&request.name)).await?.output()),
            Verb::Update => {
                let patch = Patch::Strategic(K::update_patch(request)?);
                let patched = self
                    .timed(api.patch(&request.name, &PatchParams::default(), &patch))
                    .await?;
                Ok(patched.output())
            }
            Verb::Delete => {
                let params = DeleteParams {
                    grace_period_seconds: request.attributes.grace_period,
                    ..DeleteParams::default()
                };
                self.timed(api.delete(&request.name, &params)).await?;
                Ok(ResourceOutput::deleted(
                    request.kind,
                    &request.name,
                    &request.namespace,
                ))
            }
            Verb::List => {
                let mut params = ListParams::default();
                if let Some(selector) = &request.attributes.label_selector {
                    params = params.labels(selector);
                }
                let list = self.timed(api.list(&params)).await?;
                Ok(K::list_output(&list.items))
            }
            Verb::Scale | Verb::PortForward => Err(SdkError::Invalid(format!(
                "'{}' is not supported for {} resources",
                verb, request.kind
            ))),
        }
    }

    async fn scale(&self, api: Api<Deployment>, request: &ResourceRequest) -> Result<ResourceOutput> {
        let replicas = manifest::replicas(request)
            .ok_or_else(|| SdkError::Invalid("scale requires a replica count".to_string()))?;
        let patch = Patch::Merge(manifest::scale_patch(replicas));
        let scale = self
            .timed(api.patch_scale(&request.name, &PatchParams::default(), &patch))
            .await?;
        Ok(ResourceOutput::scaled(
            &request.name,
            &request.namespace,
            replicas,
            &scale,
        ))
    }

    /// Listens on `127.0.0.1:<local>` and opens one API port-forward per accepted connection.
    async fn port_forward(&self, api: Api<Pod>, request: &ResourceRequest) -> Result<ResourceOutput> {
        let ports = request
            .attributes
            .ports
            .ok_or_else(|| SdkError::Invalid("port-forward requires a port mapping".to_string()))?;

        // Report a missing pod now rather than on the first connection.
        self.timed(api.get(&request.name)).await?;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, ports.local))
            .await
            .map_err(|source| SdkError::Bind {
                port: ports.local,
                source,
            })?;

        let info = ForwardInfo::new(ExecutionMode::Sdk, &request.name, &request.namespace, ports);
        let task = tokio::spawn(accept_loop(
            info.id,
            listener,
            api,
            request.name.clone(),
            ports.remote,
        ));

        let output = info.to_output();
        self.forwards.register(info, ForwardHandle::Task(task));
        Ok(output)
    }
}

impl ClusterBackend for KubeBackend {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Sdk
    }

    async fn execute(&self, operation: &Operation) -> BackendResult {
        self.run(operation).await.map_err(ErrorInfo::from)
    }
}

async fn build_client(settings: &Settings) -> std::result::Result<Client, String> {
    let config = match &settings.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| e.to_string())?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| e.to_string())?
        }
        None => Config::infer().await.map_err(|e| e.to_string())?,
    };
    Client::try_from(config).map_err(|e| e.to_string())
}

/// Pause before accepting again after a failed `accept`.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Calls `accept` until it succeeds, pausing after each failure.
async fn accept_next<T, F, Fut>(id: Uuid, mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                // Errors such as EMFILE persist until connections close.
                warn!(%id, "accept failed: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

async fn accept_loop(id: Uuid, listener: TcpListener, api: Api<Pod>, pod: String, port: u16) {
    loop {
        let (stream, peer) = accept_next(id, || listener.accept()).await;
        debug!(%id, %peer, "forwarding connection");

        let api = api.clone();
        let pod = pod.clone();
        tokio::spawn(async move {
            if let Err(e) = forward_connection(&api, &pod, port, stream).await {
                warn!(%id, %peer, "port-forward connection failed: {}", e);
            }
        });
    }
}

async fn forward_connection(
    api: &Api<Pod>,
    pod: &str,
    port: u16,
    mut downstream: TcpStream,
) -> Result<()> {
    let mut forwarder = api.portforward(pod, &[port]).await?;
    let mut upstream = forwarder
        .take_stream(port)
        .ok_or_else(|| SdkError::PortForward(format!("no stream for port {}", port)))?;

    tokio::io::copy_bidirectional(&mut downstream, &mut upstream).await?;
    drop(upstream);

    forwarder
        .join()
        .await
        .map_err(|e| SdkError::PortForward(e.to_string()))
}
