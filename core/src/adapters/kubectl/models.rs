//! kubectl JSON response parsing.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::errors::{KubectlError, Result};

/// Response structure for `kubectl get <kind> -o json`.
///
/// kubectl reports lists as `kind: List`, so the typed `k8s-openapi` list
/// objects do not apply; only the items are kept.
#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Response structure for `kubectl version -o json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub server_version: Option<VersionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub git_version: String,
}

/// Parses kubectl's JSON output into `T`.
pub fn parse<T: DeserializeOwned>(output: &str) -> Result<T> {
    serde_json::from_str(output).map_err(|e| KubectlError::ParsingFailed(e.to_string()))
}
