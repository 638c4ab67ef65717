//! Runs helm operations through the `helm` binary.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::errors::{HelmError, Result};
use super::models::{parse, ChartEntry, ListedRelease, Release, RepoEntry};
use crate::adapters::discovery::find_helm;
use crate::adapters::process::{run_captured, RunFailure};
use crate::config::Settings;
use crate::domain::{
    ChartSummary, ErrorInfo, HelmOperation, ReleaseSpec, ReleaseSummary, RepositorySummary,
    ResourceOutput,
};

/// What `helm repo list` prints, with a failing status, when no repository is configured.
const NO_REPOSITORIES: &str = "no repositories to show";

/// An argument vector plus optional stdin for one helm invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmCommand {
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl HelmCommand {
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

    fn namespace(self, namespace: &str) -> Self {
        self.arg("-n").arg(namespace)
    }

    fn json_output(self) -> Self {
        self.arg("-o").arg("json")
    }

    /// Adds `--version` and, when there are values, `-f -` with the values on stdin.
    fn chart_options(mut self, spec: &ReleaseSpec) -> Result<Self> {
        if let Some(version) = &spec.version {
            self = self.arg("--version").arg(version.clone());
        }
        if let Some(values) = &spec.values {
            // JSON is valid YAML, so helm reads it as a values file.
            let values = serde_json::to_string(values)
                .map_err(|e| HelmError::ParsingFailed(e.to_string()))?;
            self = self.arg("-f").arg("-");
            self.stdin = Some(values);
        }
        Ok(self)
    }
}

/// Builds the helm invocation for an operation.
pub fn build_helm_command(operation: &HelmOperation) -> Result<HelmCommand> {
    let command = match operation {
        HelmOperation::ListReleases { namespace } => {
            let command = match namespace {
                Some(namespace) => HelmCommand::new(["list"]).namespace(namespace),
                None => HelmCommand::new(["list", "--all-namespaces"]),
            };
            command.json_output()
        }
        HelmOperation::Install(spec) => {
            HelmCommand::new(["install", spec.name.as_str(), spec.chart.as_str()])
                .namespace(&spec.namespace)
                .chart_options(spec)?
                .json_output()
        }
        HelmOperation::Upgrade { spec, install } => {
            let mut command = HelmCommand::new(["upgrade", spec.name.as_str(), spec.chart.as_str()])
                .namespace(&spec.namespace);
            if *install {
                command = command.arg("--install");
            }
            command.chart_options(spec)?.json_output()
        }
        HelmOperation::Uninstall {
            name,
            namespace,
            keep_history,
        } => {
            let command = HelmCommand::new(["uninstall", name.as_str()]).namespace(namespace);
            if *keep_history {
                command.arg("--keep-history")
            } else {
                command
            }
        }
        HelmOperation::GetValues {
            name,
            namespace,
            all,
        } => {
            let command = HelmCommand::new(["get", "values", name.as_str()])
                .namespace(namespace)
                .json_output();
            if *all {
                command.arg("--all")
            } else {
                command
            }
        }
        HelmOperation::Rollback {
            name,
            namespace,
            revision,
        } => {
            let mut command = HelmCommand::new(["rollback", name.as_str()]);
            if let Some(revision) = revision {
                command = command.arg(revision.to_string());
            }
            command.namespace(namespace)
        }
        HelmOperation::SearchRepo { keyword, regex } => {
            let mut command = HelmCommand::new(["search", "repo"]);
            if let Some(keyword) = keyword {
                if *regex {
                    command = command.arg("--regexp");
                }
                command = command.arg(keyword.clone());
            }
            command.json_output()
        }
        HelmOperation::RepoAdd { name, url } => {
            HelmCommand::new(["repo", "add", name.as_str(), url.as_str()])
        }
        HelmOperation::RepoList => HelmCommand::new(["repo", "list"]).json_output(),
        HelmOperation::RepoUpdate => HelmCommand::new(["repo", "update"]),
        HelmOperation::RepoRemove { name } => HelmCommand::new(["repo", "remove", name.as_str()]),
    };

    Ok(command)
}

/// Turns helm's stdout into the normalized output for an operation.
pub fn parse_helm_output(operation: &HelmOperation, stdout: &str) -> Result<ResourceOutput> {
    match operation {
        HelmOperation::ListReleases { .. } => {
            let mut releases = parse::<Vec<ListedRelease>>(stdout)?
                .into_iter()
                .map(ListedRelease::into_summary)
                .collect::<Result<Vec<_>>>()?;
            releases.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
            Ok(ResourceOutput::Releases(releases))
        }
        HelmOperation::Install(_) | HelmOperation::Upgrade { .. } => Ok(ResourceOutput::Release(
            ReleaseSummary::from(parse::<Release>(stdout)?),
        )),
        HelmOperation::Uninstall { name, namespace, .. } => Ok(ResourceOutput::ReleaseUninstalled {
            name: name.clone(),
            namespace: namespace.clone(),
        }),
        HelmOperation::GetValues { name, namespace, .. } => {
            // A release installed without overrides prints `null`.
            let values = match parse::<serde_json::Value>(stdout)? {
                serde_json::Value::Null => serde_json::Value::Object(Default::default()),
                values => values,
            };
            Ok(ResourceOutput::ReleaseValues {
                name: name.clone(),
                namespace: namespace.clone(),
                values,
            })
        }
        HelmOperation::Rollback {
            name,
            namespace,
            revision,
        } => Ok(ResourceOutput::RolledBack {
            name: name.clone(),
            namespace: namespace.clone(),
            revision: *revision,
        }),
        HelmOperation::SearchRepo { .. } => Ok(ResourceOutput::Charts(
            parse::<Vec<ChartEntry>>(stdout)?
                .into_iter()
                .map(ChartSummary::from)
                .collect(),
        )),
        HelmOperation::RepoAdd { name, url } => Ok(ResourceOutput::RepositoryAdded {
            name: name.clone(),
            url: url.clone(),
        }),
        HelmOperation::RepoList => Ok(ResourceOutput::Repositories(
            parse::<Vec<RepoEntry>>(stdout)?
                .into_iter()
                .map(RepositorySummary::from)
                .collect(),
        )),
        HelmOperation::RepoUpdate => Ok(ResourceOutput::RepositoriesUpdated),
        HelmOperation::RepoRemove { name } => {
            Ok(ResourceOutput::RepositoryRemoved { name: name.clone() })
        }
    }
}

/// Runs helm as a subprocess against the configured kubeconfig.
pub struct HelmRunner {
    helm_path: Option<PathBuf>,
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
}

impl HelmRunner {
    /// Locates helm now. A missing binary fails every call as unavailable.
    pub fn new(settings: &Settings) -> Self {
        let helm_path = find_helm(settings.helm_path.as_deref());
        match &helm_path {
            Some(path) => debug!(path = %path.display(), "using helm"),
            None => debug!("helm not found"),
        }

        Self {
            helm_path,
            kubeconfig: settings.kubeconfig(),
            timeout: settings.command_timeout(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.helm_path.is_some()
    }

    pub async fn execute(&self, operation: &HelmOperation) -> std::result::Result<ResourceOutput, ErrorInfo> {
        self.run_operation(operation).await.map_err(ErrorInfo::from)
    }

    async fn run_operation(&self, operation: &HelmOperation) -> Result<ResourceOutput> {
        let command = build_helm_command(operation)?;
        let stdout = match self.run(&command).await {
            Err(HelmError::CommandFailed(message))
                if matches!(operation, HelmOperation::RepoList) && message.contains(NO_REPOSITORIES) =>
            {
                return Ok(ResourceOutput::Repositories(Vec::new()));
            }
            result => result?,
        };
        parse_helm_output(operation, &stdout)
    }

    /// Executes a command and returns its stdout.
    async fn run(&self, helm: &HelmCommand) -> Result<String> {
        let helm_path = self.helm_path.as_ref().ok_or(HelmError::HelmNotFound)?;

        let mut command = Command::new(helm_path);
        command.args(&helm.args);
        if let Some(kubeconfig) = &self.kubeconfig {
            command.env("KUBECONFIG", kubeconfig);
        }

        match run_captured(command, helm.stdin.as_deref(), self.timeout).await {
            Ok(output) if output.status.success() => String::from_utf8(output.stdout)
                .map_err(|e| HelmError::ParsingFailed(e.to_string())),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(args = ?helm.args, status = %output.status, "helm failed: {}", stderr.trim());
                Err(HelmError::from_helm_error(&stderr))
            }
            Err(RunFailure::Io(e)) => Err(HelmError::Io(e)),
            Err(RunFailure::TimedOut) => Err(HelmError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use serde_json::json;

    fn args(operation: &HelmOperation) -> Vec<String> {
        build_helm_command(operation).unwrap().args
    }

    fn spec() -> ReleaseSpec {
        ReleaseSpec::new("web", "bitnami/nginx", "apps")
    }

    #[test]
    fn test_list_commands() {
        assert_eq!(
            args(&HelmOperation::ListReleases {
                namespace: Some("apps".to_string())
            }),
            ["list", "-n", "apps", "-o", "json"]
        );
        assert_eq!(
            args(&HelmOperation::ListReleases { namespace: None }),
            ["list", "--all-namespaces", "-o", "json"]
        );
    }

    #[test]
    fn test_install_passes_values_on_stdin() {
        let mut spec = spec();
        spec.version = Some("15.1.0".to_string());
        spec.values = Some(json!({ "replicaCount": 2 }));

        let command = build_helm_command(&HelmOperation::Install(spec)).unwrap();
        assert_eq!(
            command.args,
            [
                "install",
                "web",
                "bitnami/nginx",
                "-n",
                "apps",
                "--version",
                "15.1.0",
                "-f",
                "-",
                "-o",
                "json"
            ]
        );
        assert_eq!(command.stdin.as_deref(), Some(r#"{"replicaCount":2}"#));
    }

    #[test]
    fn test_upgrade_without_values_has_no_stdin() {
        let command = build_helm_command(&HelmOperation::Upgrade {
            spec: spec(),
            install: true,
        })
        .unwrap();
        assert_eq!(
            command.args,
            ["upgrade", "web", "bitnami/nginx", "-n", "apps", "--install", "-o", "json"]
        );
        assert_eq!(command.stdin, None);
    }

    #[test]
    fn test_release_commands() {
        assert_eq!(
            args(&HelmOperation::Uninstall {
                name: "web".to_string(),
                namespace: "apps".to_string(),
                keep_history: true,
            }),
            ["uninstall", "web", "-n", "apps", "--keep-history"]
        );
        assert_eq!(
            args(&HelmOperation::GetValues {
                name: "web".to_string(),
                namespace: "apps".to_string(),
                all: true,
            }),
            ["get", "values", "web", "-n", "apps", "-o", "json", "--all"]
        );
        assert_eq!(
            args(&HelmOperation::Rollback {
                name: "web".to_string(),
                namespace: "apps".to_string(),
                revision: Some(2),
            }),
            ["rollback", "web", "2", "-n", "apps"]
        );
    }

    #[test]
    fn test_repo_commands() {
        assert_eq!(
            args(&HelmOperation::SearchRepo {
                keyword: Some("^bitnami/".to_string()),
                regex: true,
            }),
            ["search", "repo", "--regexp", "^bitnami/", "-o", "json"]
        );
        assert_eq!(
            args(&HelmOperation::RepoAdd {
                name: "bitnami".to_string(),
                url: "https://charts.bitnami.com/bitnami".to_string(),
            }),
            ["repo", "add", "bitnami", "https://charts.bitnami.com/bitnami"]
        );
        assert_eq!(args(&HelmOperation::RepoList), ["repo", "list", "-o", "json"]);
        assert_eq!(args(&HelmOperation::RepoUpdate), ["repo", "update"]);
    }

    #[test]
    fn test_parse_null_values() {
        let op = HelmOperation::GetValues {
            name: "web".to_string(),
            namespace: "apps".to_string(),
            all: false,
        };
        assert_eq!(
            parse_helm_output(&op, "null\n").unwrap(),
            ResourceOutput::ReleaseValues {
                name: "web".to_string(),
                namespace: "apps".to_string(),
                values: json!({}),
            }
        );
    }

    #[test]
    fn test_parse_releases_sorted() {
        let stdout = r#"[
            {"name":"web","namespace":"b","revision":"1","status":"deployed","chart":"nginx-1.0.0"},
            {"name":"api","namespace":"a","revision":"2","status":"failed","chart":"api-0.1.0"}
        ]"#;
        let ResourceOutput::Releases(releases) =
            parse_helm_output(&HelmOperation::ListReleases { namespace: None }, stdout).unwrap()
        else {
            panic!("expected releases");
        };
        let names: Vec<_> = releases.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["api", "web"]);
    }

    #[tokio::test]
    async fn test_missing_helm_is_unavailable() {
        let settings = Settings {
            helm_path: Some(PathBuf::from("/nonexistent/helm")),
            ..Settings::default()
        };
        let runner = HelmRunner::new(&settings);
        assert!(!runner.is_available());

        let err = runner.execute(&HelmOperation::RepoList).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::BackendUnavailable);
    }

    #[cfg(unix)]
    mod fake_helm {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Writes a shell script standing in for helm.
        fn runner(script: &str) -> (HelmRunner, TempDir) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("helm");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

            let settings = Settings {
                helm_path: Some(path),
                ..Settings::default()
            };
            (HelmRunner::new(&settings), dir)
        }

        #[tokio::test]
        async fn test_install_reads_values_from_stdin() {
            // Fails unless the expected values arrive on stdin.
            let (runner, _dir) = runner(
                r#"values=$(cat)
[ "$values" = '{"replicaCount":2}' ] || { echo "Error: unexpected values $values" >&2; exit 1; }
echo '{"name":"web","namespace":"apps","version":1,"info":{"status":"deployed"},"chart":{"metadata":{"name":"nginx","version":"15.1.0"}}}'"#,
            );
            let mut spec = spec();
            spec.values = Some(json!({ "replicaCount": 2 }));

            let ResourceOutput::Release(release) =
                runner.execute(&HelmOperation::Install(spec)).await.unwrap()
            else {
                panic!("expected release output");
            };
            assert_eq!(release.status, "deployed");
            assert_eq!(release.chart, "nginx-15.1.0");
        }

        #[tokio::test]
        async fn test_empty_repo_list() {
            let (runner, _dir) = runner(
                r#"echo 'Error: no repositories to show' >&2
exit 1"#,
            );
            assert_eq!(
                runner.execute(&HelmOperation::RepoList).await.unwrap(),
                ResourceOutput::Repositories(Vec::new())
            );
        }

        #[tokio::test]
        async fn test_name_in_use() {
            let (runner, _dir) = runner(
                r#"echo 'Error: INSTALLATION FAILED: cannot re-use a name that is still in use' >&2
exit 1"#,
            );
            let err = runner
                .execute(&HelmOperation::Install(spec()))
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::ResourceAlreadyExists);
        }
    }
}
