//! Helm service - Release and repository operations.
//!
//! Helm has a single execution path, so there is no dispatcher here: each
//! operation is validated, then run once.

use serde_json::Value;
use tracing::{debug, info};

use crate::adapters::HelmRunner;
use crate::config::Settings;
use crate::domain::{HelmOperation, OperationResult, ReleaseSpec};

pub struct HelmService {
    runner: HelmRunner,
    default_namespace: String,
}

impl HelmService {
    pub fn from_settings(settings: &Settings) -> Self {
        let runner = HelmRunner::new(settings);
        info!(available = runner.is_available(), "helm service ready");
        Self::new(runner, &settings.default_namespace)
    }

    pub fn new(runner: HelmRunner, default_namespace: &str) -> Self {
        Self {
            runner,
            default_namespace: default_namespace.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.runner.is_available()
    }

    fn namespace(&self, namespace: Option<&str>) -> String {
        namespace.unwrap_or(&self.default_namespace).to_string()
    }

    async fn run(&self, operation: HelmOperation) -> OperationResult {
        if let Err(error) = operation.validate() {
            debug!(operation = operation.as_str(), %error, "rejected before running helm");
            return OperationResult::failed(error);
        }
        self.runner.execute(&operation).await.into()
    }

    fn spec(
        &self,
        name: &str,
        chart: &str,
        namespace: Option<&str>,
        version: Option<&str>,
        values: Option<Value>,
    ) -> ReleaseSpec {
        ReleaseSpec {
            version: version.map(str::to_string),
            values,
            ..ReleaseSpec::new(name, chart, self.namespace(namespace))
        }
    }

    /// Releases in `namespace`, or the default namespace.
    pub async fn list_releases(&self, namespace: Option<&str>) -> OperationResult {
        self.run(HelmOperation::ListReleases {
            namespace: Some(self.namespace(namespace)),
        })
        .await
    }

    pub async fn list_all_releases(&self) -> OperationResult {
        self.run(HelmOperation::ListReleases { namespace: None }).await
    }

    pub async fn install_release(
        &self,
        name: &str,
        chart: &str,
        namespace: Option<&str>,
        version: Option<&str>,
        values: Option<Value>,
    ) -> OperationResult {
        let spec = self.spec(name, chart, namespace, version, values);
        self.run(HelmOperation::Install(spec)).await
    }

    /// Upgrades a release; with `install`, installs it when missing.
    pub async fn upgrade_release(
        &self,
        name: &str,
        chart: &str,
        namespace: Option<&str>,
        version: Option<&str>,
        values: Option<Value>,
        install: bool,
    ) -> OperationResult {
        let spec = self.spec(name, chart, namespace, version, values);
        self.run(HelmOperation::Upgrade { spec, install }).await
    }

    pub async fn uninstall_release(
        &self,
        name: &str,
        namespace: Option<&str>,
        keep_history: bool,
    ) -> OperationResult {
        self.run(HelmOperation::Uninstall {
            name: name.to_string(),
            namespace: self.namespace(namespace),
            keep_history,
        })
        .await
    }

    pub async fn get_values(&self, name: &str, namespace: Option<&str>, all: bool) -> OperationResult {
        self.run(HelmOperation::GetValues {
            name: name.to_string(),
            namespace: self.namespace(namespace),
            all,
        })
        .await
    }

    /// Rolls back to `revision`, or to the previous revision.
    pub async fn rollback_release(
        &self,
        name: &str,
        revision: Option<u32>,
        namespace: Option<&str>,
    ) -> OperationResult {
        self.run(HelmOperation::Rollback {
            name: name.to_string(),
            namespace: self.namespace(namespace),
            revision,
        })
        .await
    }

    pub async fn search_repos(&self, keyword: Option<&str>, regex: bool) -> OperationResult {
        self.run(HelmOperation::SearchRepo {
            keyword: keyword.map(str::to_string),
            regex,
        })
        .await
    }

    pub async fn repo_add(&self, name: &str, url: &str) -> OperationResult {
        self.run(HelmOperation::RepoAdd {
            name: name.to_string(),
            url: url.to_string(),
        })
        .await
    }

    pub async fn repo_list(&self) -> OperationResult {
        self.run(HelmOperation::RepoList).await
    }

    pub async fn repo_update(&self) -> OperationResult {
        self.run(HelmOperation::RepoUpdate).await
    }

    pub async fn repo_remove(&self, name: &str) -> OperationResult {
        self.run(HelmOperation::RepoRemove {
            name: name.to_string(),
        })
        .await
    }
}
