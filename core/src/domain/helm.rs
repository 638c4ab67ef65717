//! Helm release and repository operations.
//!
//! Helm runs only through its CLI, so these operations never take part in
//! backend fallback. They are validated the same way before anything runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::name::dns1123_violation;
use super::result::ErrorInfo;

/// Helm refuses release names longer than this.
pub const MAX_RELEASE_NAME_LENGTH: usize = 53;

/// A chart to install or upgrade as a named release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    pub name: String,
    /// Chart reference: `repo/chart`, a local path, or an `oci://` URL.
    pub chart: String,
    pub namespace: String,
    /// Chart version constraint; latest when unset.
    pub version: Option<String>,
    /// Values overriding the chart defaults. Must be a JSON object.
    pub values: Option<Value>,
}

impl ReleaseSpec {
    pub fn new(name: impl Into<String>, chart: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chart: chart.into(),
            namespace: namespace.into(),
            version: None,
            values: None,
        }
    }

    fn validate(&self) -> Result<(), ErrorInfo> {
        validate_release(&self.name, &self.namespace)?;
        if self.chart.trim().is_empty() {
            return Err(ErrorInfo::invalid_argument("chart must not be empty"));
        }
        if matches!(&self.version, Some(version) if version.trim().is_empty()) {
            return Err(ErrorInfo::invalid_argument("chart version must not be empty"));
        }
        match &self.values {
            None | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(ErrorInfo::invalid_argument("values must be a JSON object")),
        }
    }
}

/// One helm invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelmOperation {
    /// Releases in one namespace, or in all of them when `None`.
    ListReleases { namespace: Option<String> },
    Install(ReleaseSpec),
    /// With `install`, a missing release is installed instead of failing.
    Upgrade { spec: ReleaseSpec, install: bool },
    Uninstall {
        name: String,
        namespace: String,
        keep_history: bool,
    },
    /// User-supplied values, or every computed value with `all`.
    GetValues {
        name: String,
        namespace: String,
        all: bool,
    },
    /// Rolls back to `revision`, or to the previous one when `None`.
    Rollback {
        name: String,
        namespace: String,
        revision: Option<u32>,
    },
    SearchRepo { keyword: Option<String>, regex: bool },
    RepoAdd { name: String, url: String },
    RepoList,
    RepoUpdate,
    RepoRemove { name: String },
}

impl HelmOperation {
    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListReleases { .. } => "list",
            Self::Install(_) => "install",
            Self::Upgrade { .. } => "upgrade",
            Self::Uninstall { .. } => "uninstall",
            Self::GetValues { .. } => "get values",
            Self::Rollback { .. } => "rollback",
            Self::SearchRepo { .. } => "search repo",
            Self::RepoAdd { .. } => "repo add",
            Self::RepoList => "repo list",
            Self::RepoUpdate => "repo update",
            Self::RepoRemove { .. } => "repo remove",
        }
    }

    /// Checks names and arguments before helm is run.
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            Self::ListReleases { namespace } => match namespace {
                Some(namespace) => validate_namespace(namespace),
                None => Ok(()),
            },
            Self::Install(spec) | Self::Upgrade { spec, .. } => spec.validate(),
            Self::Uninstall { name, namespace, .. } | Self::GetValues { name, namespace, .. } => {
                validate_release(name, namespace)
            }
            Self::Rollback {
                name,
                namespace,
                revision,
            } => {
                validate_release(name, namespace)?;
                if *revision == Some(0) {
                    return Err(ErrorInfo::invalid_argument("revision must be at least 1"));
                }
                Ok(())
            }
            Self::SearchRepo { keyword, .. } => match keyword {
                Some(keyword) if keyword.trim().is_empty() => {
                    Err(ErrorInfo::invalid_argument("search keyword must not be empty"))
                }
                _ => Ok(()),
            },
            Self::RepoAdd { name, url } => {
                validate_repo_name(name)?;
                validate_repo_url(url)
            }
            Self::RepoRemove { name } => validate_repo_name(name),
            Self::RepoList | Self::RepoUpdate => Ok(()),
        }
    }
}

fn validate_namespace(namespace: &str) -> Result<(), ErrorInfo> {
    match dns1123_violation(namespace) {
        Some(reason) => Err(ErrorInfo::invalid_name(format!(
            "namespace '{}' {}",
            namespace, reason
        ))),
        None => Ok(()),
    }
}

fn validate_release(name: &str, namespace: &str) -> Result<(), ErrorInfo> {
    if let Some(reason) = dns1123_violation(name) {
        return Err(ErrorInfo::invalid_name(format!(
            "release name '{}' {}",
            name, reason
        )));
    }
    if name.len() > MAX_RELEASE_NAME_LENGTH {
        return Err(ErrorInfo::invalid_name(format!(
            "release name '{}' must be no more than {} characters",
            name, MAX_RELEASE_NAME_LENGTH
        )));
    }
    validate_namespace(namespace)
}

fn validate_repo_name(name: &str) -> Result<(), ErrorInfo> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ErrorInfo::invalid_name(format!(
            "repository name '{}' may only contain alphanumerics, '-', '_' and '.'",
            name
        )))
    }
}

fn validate_repo_url(url: &str) -> Result<(), ErrorInfo> {
    const SCHEMES: &[&str] = &["http://", "https://", "oci://"];
    let has_host = SCHEMES
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .is_some_and(|rest| !rest.is_empty());
    if has_host {
        Ok(())
    } else {
        Err(ErrorInfo::invalid_argument(format!(
            "repository URL '{}' must start with http://, https:// or oci://",
            url
        )))
    }
}

/// A deployed release, as `helm list` reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub name: String,
    pub namespace: String,
    pub revision: u32,
    pub status: String,
    /// `name-version` of the chart.
    pub chart: String,
    pub app_version: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSummary {
    /// `repo/chart`.
    pub name: String,
    pub version: String,
    pub app_version: Option<String>,
    pub description: Option<String>,
}
