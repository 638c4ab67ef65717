//! In-memory backends for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::{
    manifest, DeploymentSummary, ErrorInfo, ErrorKind, ExecutionMode, NamespaceSummary,
    Operation, PodSummary, ResourceKind, ResourceOutput, ResourceRequest, Verb,
};
use crate::ports::{BackendResult, ClusterBackend};

/// Shared call counter, readable after the backend moved into a dispatcher.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

enum Behavior {
    Succeed,
    Fail(ErrorInfo),
    Cluster(Arc<Mutex<BTreeMap<(ResourceKind, String, String), ResourceRequest>>>),
}

/// A backend with canned behavior that counts its calls.
pub struct MockBackend {
    mode: ExecutionMode,
    calls: CallCounter,
    behavior: Behavior,
    last: Arc<Mutex<Option<Operation>>>,
}

impl MockBackend {
    fn with_behavior(mode: ExecutionMode, behavior: Behavior) -> Self {
        Self {
            mode,
            calls: CallCounter::default(),
            behavior,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Every call succeeds with a generic output.
    pub fn succeeding(mode: ExecutionMode) -> Self {
        Self::with_behavior(mode, Behavior::Succeed)
    }

    /// Every call fails with `error`.
    pub fn failing(mode: ExecutionMode, error: ErrorInfo) -> Self {
        Self::with_behavior(mode, Behavior::Fail(error))
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }

    /// Handle to the last operation this backend received.
    pub fn last_operation(&self) -> Arc<Mutex<Option<Operation>>> {
        self.last.clone()
    }
}

impl ClusterBackend for MockBackend {
    fn mode(&self) -> ExecutionMode {
        self.mode
    }

    async fn execute(&self, operation: &Operation) -> BackendResult {
        self.calls.bump();
        *self.last.lock() = Some(operation.clone());

        match &self.behavior {
            Behavior::Succeed => Ok(ResourceOutput::Cluster {
                server_version: format!("mock-{}", self.mode),
            }),
            Behavior::Fail(error) => Err(error.clone()),
            Behavior::Cluster(objects) => apply(&mut objects.lock(), operation),
        }
    }
}

/// A tiny in-memory cluster shared by any number of backends.
#[derive(Default, Clone)]
pub struct FakeCluster {
    objects: Arc<Mutex<BTreeMap<(ResourceKind, String, String), ResourceRequest>>>,
}

impl FakeCluster {
    pub fn backend(&self, mode: ExecutionMode) -> MockBackend {
        MockBackend::with_behavior(mode, Behavior::Cluster(self.objects.clone()))
    }

    pub fn contains(&self, kind: ResourceKind, namespace: &str, name: &str) -> bool {
        self.objects
            .lock()
            .contains_key(&(kind, namespace.to_string(), name.to_string()))
    }
}

fn apply(
    objects: &mut BTreeMap<(ResourceKind, String, String), ResourceRequest>,
    operation: &Operation,
) -> BackendResult {
    let Operation::Resource { verb, request } = operation else {
        return Ok(ResourceOutput::Cluster {
            server_version: "fake".to_string(),
        });
    };

    let key = (request.kind, request.namespace.clone(), request.name.clone());
    let not_found = || {
        ErrorInfo::new(
            ErrorKind::ResourceNotFound,
            format!("{} \"{}\" not found", request.kind.plural(), request.name),
        )
    };

    match verb {
        Verb::Create => {
            if objects.contains_key(&key) {
                return Err(ErrorInfo::new(
                    ErrorKind::ResourceAlreadyExists,
                    format!("{} \"{}\" already exists", request.kind.plural(), request.name),
                ));
            }
            objects.insert(key, request.clone());
            Ok(summarize(request))
        }
        Verb::Get => objects.get(&key).map(summarize).ok_or_else(not_found),
        Verb::Update => {
            let stored = objects.get_mut(&key).ok_or_else(not_found)?;
            merge_update(stored, request);
            Ok(summarize(stored))
        }
        Verb::Delete => objects
            .remove(&key)
            .map(|_| ResourceOutput::deleted(request.kind, &request.name, &request.namespace))
            .ok_or_else(not_found),
        Verb::Scale => {
            let stored = objects.get_mut(&key).ok_or_else(not_found)?;
            stored.attributes.replicas = request.attributes.replicas;
            Ok(ResourceOutput::Scaled {
                name: request.name.clone(),
                namespace: request.namespace.clone(),
                replicas: manifest::replicas(request).unwrap_or_default(),
            })
        }
        Verb::List => {
            let items: Vec<&ResourceRequest> = objects
                .values()
                .filter(|r| r.kind == request.kind)
                .filter(|r| !request.kind.is_namespaced() || r.namespace == request.namespace)
                .collect();
            Ok(match request.kind {
                ResourceKind::Pod => ResourceOutput::Pods(
                    items.iter().map(|r| PodSummary::from(&manifest::pod(r))).collect(),
                ),
                ResourceKind::Deployment => ResourceOutput::Deployments(
                    items
                        .iter()
                        .map(|r| DeploymentSummary::from(&manifest::deployment(r)))
                        .collect(),
                ),
                ResourceKind::Namespace => ResourceOutput::Namespaces(
                    items
                        .iter()
                        .map(|r| NamespaceSummary::from(&manifest::namespace(r)))
                        .collect(),
                ),
            })
        }
        Verb::PortForward => {
            let ports = request.attributes.ports.unwrap_or(crate::domain::PortMapping {
                local: 1,
                remote: 1,
            });
            Ok(ResourceOutput::Forwarding {
                id: Uuid::new_v4(),
                pod: request.name.clone(),
                namespace: request.namespace.clone(),
                local_port: ports.local,
                remote_port: ports.remote,
            })
        }
    }
}

/// Applies an update the way the strategic merge patches do: labels merge, others replace.
fn merge_update(stored: &mut ResourceRequest, update: &ResourceRequest) {
    if !update.attributes.labels.is_empty() {
        let mut labels = stored.labels_or_default();
        labels.extend(update.attributes.labels.clone());
        stored.attributes.labels = labels;
    }
    if update.attributes.image.is_some() {
        stored.attributes.image = update.attributes.image.clone();
    }
    if update.attributes.replicas.is_some() {
        stored.attributes.replicas = update.attributes.replicas;
    }
}

fn summarize(request: &ResourceRequest) -> ResourceOutput {
    match request.kind {
        ResourceKind::Pod => ResourceOutput::Pod(PodSummary::from(&manifest::pod(request))),
        ResourceKind::Deployment => {
            ResourceOutput::Deployment(DeploymentSummary::from(&manifest::deployment(request)))
        }
        ResourceKind::Namespace => {
            ResourceOutput::Namespace(NamespaceSummary::from(&manifest::namespace(request)))
        }
    }
}
