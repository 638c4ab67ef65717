//! helm `-o json` response parsing.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::errors::{HelmError, Result};
use crate::domain::{ChartSummary, ReleaseSummary, RepositorySummary};

/// One entry of `helm list -o json`. Revision is printed as a string.
#[derive(Debug, Deserialize)]
pub struct ListedRelease {
    pub name: String,
    pub namespace: String,
    pub revision: String,
    #[serde(default)]
    pub updated: Option<String>,
    pub status: String,
    pub chart: String,
    #[serde(default)]
    pub app_version: Option<String>,
}

impl ListedRelease {
    pub fn into_summary(self) -> Result<ReleaseSummary> {
        let revision = self
            .revision
            .parse()
            .map_err(|_| HelmError::ParsingFailed(format!("bad revision '{}'", self.revision)))?;
        Ok(ReleaseSummary {
            name: self.name,
            namespace: self.namespace,
            revision,
            status: self.status,
            chart: self.chart,
            app_version: self.app_version.filter(|v| !v.is_empty()),
            updated: self.updated,
        })
    }
}

/// The release object printed by `helm install|upgrade -o json`.
#[derive(Debug, Deserialize)]
pub struct Release {
    pub name: String,
    pub namespace: String,
    pub version: u32,
    pub info: ReleaseInfo,
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseInfo {
    pub status: String,
    #[serde(default)]
    pub last_deployed: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    pub metadata: ChartMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
}

impl From<Release> for ReleaseSummary {
    fn from(release: Release) -> Self {
        let metadata = release.chart.metadata;
        Self {
            name: release.name,
            namespace: release.namespace,
            revision: release.version,
            status: release.info.status,
            chart: format!("{}-{}", metadata.name, metadata.version),
            app_version: metadata.app_version,
            updated: release.info.last_deployed,
        }
    }
}

/// One entry of `helm repo list -o json`.
#[derive(Debug, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub url: String,
}

impl From<RepoEntry> for RepositorySummary {
    fn from(entry: RepoEntry) -> Self {
        Self {
            name: entry.name,
            url: entry.url,
        }
    }
}

/// One entry of `helm search repo -o json`.
#[derive(Debug, Deserialize)]
pub struct ChartEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<ChartEntry> for ChartSummary {
    fn from(entry: ChartEntry) -> Self {
        Self {
            name: entry.name,
            version: entry.version,
            app_version: entry.app_version.filter(|v| !v.is_empty()),
            description: entry.description.filter(|d| !d.is_empty()),
        }
    }
}

/// Parses helm's JSON output into `T`.
pub fn parse<T: DeserializeOwned>(output: &str) -> Result<T> {
    serde_json::from_str(output).map_err(|e| HelmError::ParsingFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_list() {
        let output = r#"[{"name":"web","namespace":"default","revision":"3","updated":"2024-05-01 10:00:00.000000 +0000 UTC","status":"deployed","chart":"nginx-15.1.0","app_version":"1.25.3"}]"#;
        let releases: Vec<ListedRelease> = parse(output).unwrap();
        let summary = releases.into_iter().next().unwrap().into_summary().unwrap();

        assert_eq!(summary.name, "web");
        assert_eq!(summary.revision, 3);
        assert_eq!(summary.chart, "nginx-15.1.0");
        assert_eq!(summary.app_version.as_deref(), Some("1.25.3"));
    }

    #[test]
    fn test_bad_revision() {
        let output = r#"[{"name":"web","namespace":"default","revision":"x","status":"deployed","chart":"nginx-1.0.0"}]"#;
        let releases: Vec<ListedRelease> = parse(output).unwrap();
        let err = releases.into_iter().next().unwrap().into_summary().unwrap_err();
        assert!(matches!(err, HelmError::ParsingFailed(_)));
    }

    #[test]
    fn test_parse_installed_release() {
        let output = r#"{"name":"web","namespace":"apps","version":1,"info":{"status":"deployed","last_deployed":"2024-05-01T10:00:00Z","description":"Install complete"},"chart":{"metadata":{"name":"nginx","version":"15.1.0","appVersion":"1.25.3"}},"config":{}}"#;
        let summary = ReleaseSummary::from(parse::<Release>(output).unwrap());

        assert_eq!(summary.namespace, "apps");
        assert_eq!(summary.revision, 1);
        assert_eq!(summary.status, "deployed");
        assert_eq!(summary.chart, "nginx-15.1.0");
        assert_eq!(summary.updated.as_deref(), Some("2024-05-01T10:00:00Z"));
    }

    #[test]
    fn test_parse_search_results() {
        let output = r#"[{"name":"bitnami/nginx","version":"15.1.0","app_version":"1.25.3","description":"NGINX Open Source"},{"name":"local/tool","version":"0.1.0","app_version":"","description":""}]"#;
        let charts: Vec<ChartSummary> = parse::<Vec<ChartEntry>>(output)
            .unwrap()
            .into_iter()
            .map(ChartSummary::from)
            .collect();

        assert_eq!(charts[0].description.as_deref(), Some("NGINX Open Source"));
        assert_eq!(charts[1].app_version, None);
        assert_eq!(charts[1].description, None);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse::<Vec<RepoEntry>>("not json"), Err(HelmError::ParsingFailed(_))));
    }
}
