//! Registry of running port-forward sessions.
//!
//! Both backends register what keeps a forward alive: the CLI backend a
//! `kubectl port-forward` child, the SDK backend the listener task. The lock
//! is only held for map access; killing and reaping happen after release.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{ExecutionMode, PortMapping, ResourceOutput};

/// Description of a running forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardInfo {
    pub id: Uuid,
    pub mode: ExecutionMode,
    pub pod: String,
    pub namespace: String,
    pub local_port: u16,
    pub remote_port: u16,
}

impl ForwardInfo {
    pub fn new(mode: ExecutionMode, pod: &str, namespace: &str, ports: PortMapping) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            pod: pod.to_string(),
            namespace: namespace.to_string(),
            local_port: ports.local,
            remote_port: ports.remote,
        }
    }

    pub fn to_output(&self) -> ResourceOutput {
        ResourceOutput::Forwarding {
            id: self.id,
            pod: self.pod.clone(),
            namespace: self.namespace.clone(),
            local_port: self.local_port,
            remote_port: self.remote_port,
        }
    }
}

/// What keeps a forward running.
pub enum ForwardHandle {
    /// A `kubectl port-forward` process.
    Process(Child),
    /// An in-process listener task.
    Task(JoinHandle<()>),
}

impl ForwardHandle {
    fn is_alive(&mut self) -> bool {
        match self {
            Self::Process(child) => matches!(child.try_wait(), Ok(None)),
            Self::Task(handle) => !handle.is_finished(),
        }
    }

    async fn shutdown(self) {
        match self {
            Self::Process(mut child) => {
                // kill() also waits, so the child is reaped here.
                if let Err(e) = child.kill().await {
                    warn!("failed to kill port-forward process: {}", e);
                }
            }
            Self::Task(handle) => {
                handle.abort();
                let _ = handle.await;
            }
        }
    }
}

struct ForwardSession {
    info: ForwardInfo,
    handle: ForwardHandle,
}

/// Shared registry of port-forward sessions. Clones share the same sessions.
#[derive(Clone, Default)]
pub struct ForwardRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, ForwardSession>>>,
}

impl ForwardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a session.
    pub fn register(&self, info: ForwardInfo, handle: ForwardHandle) {
        debug!(id = %info.id, pod = %info.pod, local = info.local_port, "registered port-forward");
        self.sessions
            .write()
            .insert(info.id, ForwardSession { info, handle });
    }

    /// Running sessions, ordered by local port. Sessions that ended on their own are dropped.
    pub fn list(&self) -> Vec<ForwardInfo> {
        let mut sessions = self.sessions.write();
        sessions.retain(|id, session| {
            let alive = session.handle.is_alive();
            if !alive {
                debug!(%id, "port-forward ended");
            }
            alive
        });

        let mut infos: Vec<ForwardInfo> = sessions.values().map(|s| s.info.clone()).collect();
        infos.sort_by_key(|info| info.local_port);
        infos
    }

    /// Stops one session. Returns its description, or `None` if the id is unknown.
    pub async fn stop(&self, id: Uuid) -> Option<ForwardInfo> {
        let session = self.sessions.write().remove(&id)?;
        session.handle.shutdown().await;
        debug!(%id, "stopped port-forward");
        Some(session.info)
    }

    /// Stops every session and returns how many there were.
    pub async fn stop_all(&self) -> usize {
        let sessions: Vec<ForwardSession> = self.sessions.write().drain().map(|(_, s)| s).collect();
        let count = sessions.len();
        for session in sessions {
            session.handle.shutdown().await;
        }
        count
    }
}
