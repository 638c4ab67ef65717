//! Backend that runs operations through the `kubectl` binary.
//!
//! Every command asks for `-o json` and the output is parsed into the same
//! `k8s-openapi` types the SDK backend works with.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v1::Scale;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::{detect_port_conflict, is_error_line, KubectlError, Result};
use super::models::{parse, ItemList, VersionResponse};
use crate::adapters::discovery::find_kubectl;
use crate::adapters::forward::{ForwardHandle, ForwardInfo, ForwardRegistry};
use crate::adapters::process::{run_captured, RunFailure};
use crate::config::Settings;
use crate::domain::{
    manifest, DeploymentSummary, ErrorInfo, ExecutionMode, NamespaceSummary, Operation,
    PodSummary, ResourceKind, ResourceOutput, ResourceRequest, Verb,
};
use crate::ports::{BackendResult, ClusterBackend};

/// Line kubectl prints once a port-forward listener is up.
const FORWARDING_READY: &str = "Forwarding from";

/// An argument vector plus optional stdin for one kubectl invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubectlCommand {
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl KubectlCommand {
    fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn namespace(self, request: &ResourceRequest) -> Self {
        if request.kind.is_namespaced() {
            self.arg("-n").arg(request.namespace.clone())
        } else {
            self
        }
    }

    fn json_output(self) -> Self {
        self.arg("-o").arg("json")
    }

    fn stdin(mut self, input: String) -> Self {
        self.stdin = Some(input);
        self
    }
}

/// Builds the kubectl invocation for an operation.
pub fn build_command(operation: &Operation, request_timeout: Duration) -> Result<KubectlCommand> {
    let (verb, request) = match operation {
        Operation::Ping => {
            return Ok(KubectlCommand::new(["version"])
                .json_output()
                .arg(timeout_flag(request_timeout)))
        }
        Operation::Resource { verb, request } => (*verb, request),
    };

    let kind = request.kind.as_str();
    let command = match verb {
        Verb::Create => KubectlCommand::new(["create", "-f", "-"])
            .json_output()
            .stdin(manifest_json(request)?),
        Verb::Get => KubectlCommand::new(["get", kind, request.name.as_str()])
            .namespace(request)
            .json_output(),
        Verb::Update => {
            let patch = match request.kind {
                ResourceKind::Pod => manifest::pod_labels_patch(request),
                ResourceKind::Deployment => manifest::deployment_patch(request),
                ResourceKind::Namespace => {
                    return Err(KubectlError::Invalid(
                        "namespaces cannot be updated".to_string(),
                    ))
                }
            };
            KubectlCommand::new(["patch", kind, request.name.as_str()])
                .namespace(request)
                .arg("--type")
                .arg("strategic")
                .arg("-p")
                .arg(to_json(&patch)?)
                .json_output()
        }
        Verb::Delete => {
            let mut command = KubectlCommand::new(["delete", kind, request.name.as_str()])
                .namespace(request)
                .arg("--wait=false");
            if let Some(grace) = request.attributes.grace_period {
                command = command.arg(format!("--grace-period={}", grace));
                if grace == 0 {
                    command = command.arg("--force");
                }
            }
            command
        }
        Verb::List => {
            let mut command = KubectlCommand::new(["get", request.kind.plural()]).namespace(request);
            if let Some(selector) = &request.attributes.label_selector {
                command = command.arg("-l").arg(selector.clone());
            }
            command.json_output()
        }
        Verb::Scale => {
            let replicas = manifest::replicas(request).ok_or_else(|| {
                KubectlError::Invalid("scale requires a replica count".to_string())
            })?;
            KubectlCommand::new(["patch", kind, request.name.as_str()])
                .namespace(request)
                .arg("--subresource=scale")
                .arg("--type")
                .arg("merge")
                .arg("-p")
                .arg(to_json(&manifest::scale_patch(replicas))?)
                .json_output()
        }
        Verb::PortForward => {
            let ports = request.attributes.ports.ok_or_else(|| {
                KubectlError::Invalid("port-forward requires a port mapping".to_string())
            })?;
            // Long-running; no request timeout.
            return Ok(KubectlCommand::new(["port-forward".to_string(), format!("pod/{}", request.name)])
                .namespace(request)
                .arg(format!("{}:{}", ports.local, ports.remote))
                .arg("--address=127.0.0.1"));
        }
    };

    Ok(command.arg(timeout_flag(request_timeout)))
}

fn timeout_flag(request_timeout: Duration) -> String {
    // 0 means "no timeout" to kubectl.
    format!("--request-timeout={}s", request_timeout.as_secs().max(1))
}

fn manifest_json(request: &ResourceRequest) -> Result<String> {
    let json = match request.kind {
        ResourceKind::Pod => serde_json::to_string(&manifest::pod(request)),
        ResourceKind::Deployment => serde_json::to_string(&manifest::deployment(request)),
        ResourceKind::Namespace => serde_json::to_string(&manifest::namespace(request)),
    };
    json.map_err(|e| KubectlError::ParsingFailed(e.to_string()))
}

fn to_json(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| KubectlError::ParsingFailed(e.to_string()))
}

/// Turns kubectl's stdout into the normalized output for an operation.
pub fn parse_output(operation: &Operation, stdout: &str) -> Result<ResourceOutput> {
    let (verb, request) = match operation {
        Operation::Ping => {
            let version: VersionResponse = parse(stdout)?;
            let server = version.server_version.ok_or_else(|| {
                KubectlError::ClusterNotConnected("server version unavailable".to_string())
            })?;
            return Ok(ResourceOutput::Cluster {
                server_version: server.git_version,
            });
        }
        Operation::Resource { verb, request } => (*verb, request),
    };

    match verb {
        Verb::Create | Verb::Get | Verb::Update => Ok(match request.kind {
            ResourceKind::Pod => ResourceOutput::Pod(PodSummary::from(&parse::<Pod>(stdout)?)),
            ResourceKind::Deployment => ResourceOutput::Deployment(DeploymentSummary::from(
                &parse::<Deployment>(stdout)?,
            )),
            ResourceKind::Namespace => {
                ResourceOutput::Namespace(NamespaceSummary::from(&parse::<Namespace>(stdout)?))
            }
        }),
        Verb::Delete => Ok(ResourceOutput::deleted(
            request.kind,
            &request.name,
            &request.namespace,
        )),
        Verb::List => Ok(match request.kind {
            ResourceKind::Pod => ResourceOutput::pods(&parse::<ItemList<Pod>>(stdout)?.items),
            ResourceKind::Deployment => {
                ResourceOutput::deployments(&parse::<ItemList<Deployment>>(stdout)?.items)
            }
            ResourceKind::Namespace => {
                ResourceOutput::namespaces(&parse::<ItemList<Namespace>>(stdout)?.items)
            }
        }),
        Verb::Scale => {
            let scale: Scale = parse(stdout)?;
            Ok(ResourceOutput::scaled(
                &request.name,
                &request.namespace,
                manifest::replicas(request).unwrap_or_default(),
                &scale,
            ))
        }
        Verb::PortForward => Err(KubectlError::CommandFailed(
            "port-forward produces no parseable output".to_string(),
        )),
    }
}

/// Runs operations through a kubectl subprocess.
pub struct KubectlBackend {
    kubectl_path: Option<PathBuf>,
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
    ready_timeout: Duration,
    forwards: ForwardRegistry,
}

impl KubectlBackend {
    /// Creates the backend, locating kubectl now. A missing binary is not an
    /// error here; every call then fails as unavailable.
    pub fn new(settings: &Settings, forwards: ForwardRegistry) -> Self {
        let kubectl_path = find_kubectl(settings.kubectl_path.as_deref());
        match &kubectl_path {
            Some(path) => debug!(path = %path.display(), "using kubectl"),
            None => debug!("kubectl not found"),
        }

        Self {
            kubectl_path,
            kubeconfig: settings.kubeconfig(),
            timeout: settings.command_timeout(),
            ready_timeout: settings.port_forward_timeout(),
            forwards,
        }
    }

    pub fn is_available(&self) -> bool {
        self.kubectl_path.is_some()
    }

    async fn run_operation(&self, operation: &Operation) -> Result<ResourceOutput> {
        let command = build_command(operation, self.timeout)?;

        if let Operation::Resource {
            verb: Verb::PortForward,
            request,
        } = operation
        {
            return self.port_forward(request, &command).await;
        }

        let stdout = self.run(&command).await?;
        parse_output(operation, &stdout)
    }

    fn command(&self, args: &[String]) -> Result<Command> {
        let kubectl_path = self
            .kubectl_path
            .as_ref()
            .ok_or(KubectlError::KubectlNotFound)?;

        let mut command = Command::new(kubectl_path);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(kubeconfig) = &self.kubeconfig {
            command.env("KUBECONFIG", kubeconfig);
        }
        Ok(command)
    }

    /// Executes a command and returns its stdout.
    async fn run(&self, kubectl: &KubectlCommand) -> Result<String> {
        let command = self.command(&kubectl.args)?;

        match run_captured(command, kubectl.stdin.as_deref(), self.timeout).await {
            Ok(output) if output.status.success() => String::from_utf8(output.stdout)
                .map_err(|e| KubectlError::ParsingFailed(e.to_string())),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(args = ?kubectl.args, status = %output.status, "kubectl failed: {}", stderr.trim());
                Err(KubectlError::from_kubectl_error(&stderr))
            }
            Err(RunFailure::Io(e)) => Err(KubectlError::Io(e)),
            Err(RunFailure::TimedOut) => Err(KubectlError::Timeout),
        }
    }

    /// Starts `kubectl port-forward`, waits until it listens and registers it.
    async fn port_forward(
        &self,
        request: &ResourceRequest,
        kubectl: &KubectlCommand,
    ) -> Result<ResourceOutput> {
        let ports = request
            .attributes
            .ports
            .ok_or_else(|| KubectlError::Invalid("port-forward requires a port mapping".to_string()))?;

        let mut child = self.command(&kubectl.args)?.stdin(Stdio::null()).spawn()?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(KubectlError::CommandFailed(
                "port-forward output was not captured".to_string(),
            ));
        };
        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();

        let ready = timeout(
            self.ready_timeout,
            wait_until_forwarding(&mut stdout, &mut stderr),
        )
        .await
        .unwrap_or(Err(KubectlError::Timeout));

        if let Err(e) = ready {
            let _ = child.kill().await;
            return Err(e);
        }

        let info = ForwardInfo::new(ExecutionMode::Cli, &request.name, &request.namespace, ports);
        tokio::spawn(drain_output(info.id, stdout, stderr));

        let output = info.to_output();
        self.forwards.register(info, ForwardHandle::Process(child));
        Ok(output)
    }
}

impl ClusterBackend for KubectlBackend {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Cli
    }

    async fn execute(&self, operation: &Operation) -> BackendResult {
        self.run_operation(operation).await.map_err(ErrorInfo::from)
    }
}

/// Reads port-forward output until the listener is ready or kubectl gives up.
async fn wait_until_forwarding<O, E>(stdout: &mut Lines<O>, stderr: &mut Lines<E>) -> Result<()>
where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let mut stderr_open = true;
    let mut errors: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            line = stdout.next_line() => match line? {
                Some(line) if line.contains(FORWARDING_READY) => {
                    debug!("kubectl: {}", line);
                    return Ok(());
                }
                Some(line) => debug!("kubectl: {}", line),
                None => break,
            },
            line = stderr.next_line(), if stderr_open => match line? {
                Some(line) => {
                    if let Some(port) = detect_port_conflict(&line) {
                        return Err(KubectlError::PortConflict(port));
                    }
                    if !line.trim().is_empty() {
                        errors.push(line);
                    }
                }
                None => stderr_open = false,
            },
        }
    }

    // stdout closed: kubectl is exiting. Collect what is left on stderr.
    while stderr_open {
        match stderr.next_line().await? {
            Some(line) => {
                if let Some(port) = detect_port_conflict(&line) {
                    return Err(KubectlError::PortConflict(port));
                }
                if !line.trim().is_empty() {
                    errors.push(line);
                }
            }
            None => stderr_open = false,
        }
    }

    if errors.is_empty() {
        Err(KubectlError::CommandFailed(
            "kubectl port-forward exited before forwarding started".to_string(),
        ))
    } else {
        Err(KubectlError::from_kubectl_error(&errors.join("\n")))
    }
}

/// Logs the rest of a running port-forward's output.
async fn drain_output<O, E>(id: Uuid, mut stdout: Lines<O>, mut stderr: Lines<E>)
where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let mut stdout_open = true;
    let mut stderr_open = true;

    while stdout_open || stderr_open {
        tokio::select! {
            line = stdout.next_line(), if stdout_open => match line {
                Ok(Some(line)) => debug!(%id, "kubectl: {}", line),
                _ => stdout_open = false,
            },
            line = stderr.next_line(), if stderr_open => match line {
                Ok(Some(line)) if is_error_line(&line) => warn!(%id, "kubectl: {}", line),
                Ok(Some(line)) => debug!(%id, "kubectl: {}", line),
                _ => stderr_open = false,
            },
        }
    }

    debug!(%id, "port-forward output closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attributes, ErrorKind, PortMapping};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn args(operation: &Operation) -> Vec<String> {
        build_command(operation, TIMEOUT).unwrap().args
    }

    #[test]
    fn test_get_pod_command() {
        let op = Operation::new(Verb::Get, ResourceRequest::pod("web-1", "default"));
        assert_eq!(
            args(&op),
            ["get", "pod", "web-1", "-n", "default", "-o", "json", "--request-timeout=10s"]
        );
    }

    #[test]
    fn test_create_sends_manifest_on_stdin() {
        let op = Operation::new(
            Verb::Create,
            ResourceRequest::pod("web-1", "default").with_attributes(Attributes {
                image: Some("nginx:latest".to_string()),
                ..Default::default()
            }),
        );
        let command = build_command(&op, TIMEOUT).unwrap();
        assert_eq!(&command.args[..5], ["create", "-f", "-", "-o", "json"]);

        let manifest: serde_json::Value =
            serde_json::from_str(command.stdin.as_deref().unwrap()).unwrap();
        assert_eq!(manifest["kind"], "Pod");
        assert_eq!(manifest["metadata"]["namespace"], "default");
        assert_eq!(manifest["spec"]["containers"][0]["image"], "nginx:latest");
    }

    #[test]
    fn test_namespace_commands_have_no_namespace_flag() {
        let op = Operation::new(Verb::Delete, ResourceRequest::namespace("team-a"));
        assert_eq!(
            args(&op),
            ["delete", "namespace", "team-a", "--wait=false", "--request-timeout=10s"]
        );
    }

    #[test]
    fn test_delete_with_zero_grace_period_forces() {
        let op = Operation::new(
            Verb::Delete,
            ResourceRequest::pod("web-1", "default").with_attributes(Attributes {
                grace_period: Some(0),
                ..Default::default()
            }),
        );
        let args = args(&op);
        assert!(args.contains(&"--grace-period=0".to_string()));
        assert!(args.contains(&"--force".to_string()));
    }

    #[test]
    fn test_scale_command() {
        let op = Operation::new(
            Verb::Scale,
            ResourceRequest::deployment("api", "prod").with_attributes(Attributes {
                replicas: Some(5),
                ..Default::default()
            }),
        );
        let args = args(&op);
        assert_eq!(&args[..5], ["patch", "deployment", "api", "-n", "prod"]);
        assert!(args.contains(&"--subresource=scale".to_string()));
        assert!(args.contains(&r#"{"spec":{"replicas":5}}"#.to_string()));
    }

    #[test]
    fn test_list_with_selector() {
        let op = Operation::new(
            Verb::List,
            ResourceRequest::collection(ResourceKind::Deployment, "prod").with_attributes(
                Attributes {
                    label_selector: Some("app=api".to_string()),
                    ..Default::default()
                },
            ),
        );
        assert_eq!(
            args(&op),
            [
                "get",
                "deployments",
                "-n",
                "prod",
                "-l",
                "app=api",
                "-o",
                "json",
                "--request-timeout=10s"
            ]
        );
    }

    #[test]
    fn test_port_forward_command() {
        let op = Operation::new(
            Verb::PortForward,
            ResourceRequest::pod("web-1", "default").with_attributes(Attributes {
                ports: Some(PortMapping { local: 8080, remote: 80 }),
                ..Default::default()
            }),
        );
        assert_eq!(
            args(&op),
            ["port-forward", "pod/web-1", "-n", "default", "8080:80", "--address=127.0.0.1"]
        );
    }

    #[test]
    fn test_ping_command() {
        assert_eq!(
            args(&Operation::Ping),
            ["version", "-o", "json", "--request-timeout=10s"]
        );
    }

    #[test]
    fn test_parse_scale_output() {
        let op = Operation::new(
            Verb::Scale,
            ResourceRequest::deployment("api", "prod").with_attributes(Attributes {
                replicas: Some(5),
                ..Default::default()
            }),
        );
        let stdout = r#"{"apiVersion":"autoscaling/v1","kind":"Scale","metadata":{"name":"api","namespace":"prod"},"spec":{"replicas":5},"status":{"replicas":3}}"#;
        assert_eq!(
            parse_output(&op, stdout).unwrap(),
            ResourceOutput::Scaled {
                name: "api".to_string(),
                namespace: "prod".to_string(),
                replicas: 5
            }
        );
    }

    #[test]
    fn test_parse_delete_output_ignores_stdout() {
        let op = Operation::new(Verb::Delete, ResourceRequest::pod("web-1", "default"));
        assert_eq!(
            parse_output(&op, "pod \"web-1\" deleted").unwrap(),
            ResourceOutput::deleted(ResourceKind::Pod, "web-1", "default")
        );
    }

    #[tokio::test]
    async fn test_missing_kubectl_is_unavailable() {
        let settings = Settings {
            kubectl_path: Some(PathBuf::from("/nonexistent/kubectl")),
            ..Settings::default()
        };
        let backend = KubectlBackend::new(&settings, ForwardRegistry::new());
        assert!(!backend.is_available());

        let err = backend.execute(&Operation::Ping).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::BackendUnavailable);
        assert!(err.is_retryable());
    }

    #[cfg(unix)]
    mod fake_kubectl {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Writes a shell script standing in for kubectl.
        fn backend(script: &str) -> (KubectlBackend, ForwardRegistry, TempDir) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("kubectl");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

            let settings = Settings {
                kubectl_path: Some(path),
                port_forward_timeout_secs: 2,
                ..Settings::default()
            };
            let registry = ForwardRegistry::new();
            (KubectlBackend::new(&settings, registry.clone()), registry, dir)
        }

        #[tokio::test]
        async fn test_create_pod_through_kubectl() {
            let (backend, _, _dir) = backend(
                r#"cat > /dev/null
echo '{"apiVersion":"v1","kind":"Pod","metadata":{"name":"web-1","namespace":"default"},"status":{"phase":"Pending"}}'"#,
            );
            let op = Operation::new(Verb::Create, ResourceRequest::pod("web-1", "default"));

            let output = backend.execute(&op).await.unwrap();
            let ResourceOutput::Pod(pod) = output else {
                panic!("expected pod output");
            };
            assert_eq!(pod.name, "web-1");
            assert_eq!(pod.phase.as_deref(), Some("Pending"));
        }

        #[tokio::test]
        async fn test_kubectl_failure_is_classified() {
            let (backend, _, _dir) = backend(
                r#"echo 'Error from server (NotFound): pods "web-1" not found' >&2
exit 1"#,
            );
            let op = Operation::new(Verb::Get, ResourceRequest::pod("web-1", "default"));

            let err = backend.execute(&op).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::ResourceNotFound);
        }

        #[tokio::test]
        async fn test_unreachable_cluster_is_transient() {
            let (backend, _, _dir) = backend(
                r#"echo 'The connection to the server localhost:8080 was refused - did you specify the right host or port?' >&2
exit 1"#,
            );

            let err = backend.execute(&Operation::Ping).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::TransientNetworkError);
        }

        fn forward_op() -> Operation {
            Operation::new(
                Verb::PortForward,
                ResourceRequest::pod("web-1", "default").with_attributes(Attributes {
                    ports: Some(PortMapping { local: 18080, remote: 80 }),
                    ..Default::default()
                }),
            )
        }

        #[tokio::test]
        async fn test_port_forward_registers_process() {
            let (backend, registry, _dir) = backend(
                r#"echo 'Forwarding from 127.0.0.1:18080 -> 80'
exec sleep 30"#,
            );

            let output = backend.execute(&forward_op()).await.unwrap();
            let ResourceOutput::Forwarding { id, local_port, .. } = output else {
                panic!("expected forwarding output");
            };
            assert_eq!(local_port, 18080);
            assert_eq!(registry.list()[0].id, id);
            assert_eq!(registry.list()[0].mode, ExecutionMode::Cli);

            assert!(registry.stop(id).await.is_some());
            assert!(registry.list().is_empty());
        }

        #[tokio::test]
        async fn test_port_forward_port_conflict() {
            let (backend, registry, _dir) = backend(
                r#"echo 'Unable to listen on port 18080: Listeners failed to create with the following errors: [unable to create listener: Error listen tcp4 127.0.0.1:18080: bind: address already in use]' >&2
exit 1"#,
            );

            let err = backend.execute(&forward_op()).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidArgument);
            assert!(err.message.contains("18080"));
            assert!(registry.list().is_empty());
        }

        #[tokio::test]
        async fn test_port_forward_times_out() {
            let (backend, registry, _dir) = backend("exec sleep 30");

            let err = backend.execute(&forward_op()).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::TransientNetworkError);
            assert!(registry.list().is_empty());
        }
    }
}
