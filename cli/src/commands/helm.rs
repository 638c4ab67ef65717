//! Helm commands.

use anyhow::{bail, Context, Result};
use kubedispatch_core::HelmService;
use serde_json::{Map, Value};

use super::output::print_result;

/// Chart, version and values shared by install and upgrade.
pub struct ChartArgs {
    pub chart: String,
    pub version: Option<String>,
    pub values_json: Option<String>,
    pub set: Vec<(String, String)>,
}

impl ChartArgs {
    /// Merges `--values-json` with `--set` pairs; `--set` wins.
    fn values(&self) -> Result<Option<Value>> {
        let mut values = match &self.values_json {
            Some(text) => match serde_json::from_str::<Value>(text).context("invalid --values-json")? {
                Value::Object(map) => map,
                _ => bail!("--values-json must be a JSON object"),
            },
            None => Map::new(),
        };

        for (path, value) in &self.set {
            set_path(&mut values, path, parse_scalar(value))?;
        }

        Ok((!values.is_empty()).then_some(Value::Object(values)))
    }
}

/// `true`, `2` or `"x"` keep their JSON type; anything else is a string.
fn parse_scalar(value: &str) -> Value {
    match serde_json::from_str::<Value>(value) {
        Ok(parsed @ (Value::Bool(_) | Value::Number(_) | Value::Null | Value::String(_))) => parsed,
        _ => Value::String(value.to_string()),
    }
}

/// Sets a dotted path such as `image.tag`, creating objects on the way.
fn set_path(values: &mut Map<String, Value>, path: &str, value: Value) -> Result<()> {
    let mut keys = path.split('.').peekable();
    let mut current = values;

    while let Some(key) = keys.next() {
        if key.is_empty() {
            bail!("empty key in --set path '{}'", path);
        }
        if keys.peek().is_none() {
            current.insert(key.to_string(), value);
            return Ok(());
        }

        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => bail!("--set path '{}' goes through a non-object value at '{}'", path, key),
        };
    }

    Ok(())
}

pub async fn list(service: &HelmService, namespace: Option<&str>, all: bool, json: bool) -> Result<()> {
    let result = if all {
        service.list_all_releases().await
    } else {
        service.list_releases(namespace).await
    };
    print_result(&result, json)
}

pub async fn install(
    service: &HelmService,
    name: &str,
    namespace: Option<&str>,
    chart: ChartArgs,
    json: bool,
) -> Result<()> {
    let values = chart.values()?;
    let result = service
        .install_release(name, &chart.chart, namespace, chart.version.as_deref(), values)
        .await;
    print_result(&result, json)
}

pub async fn upgrade(
    service: &HelmService,
    name: &str,
    namespace: Option<&str>,
    chart: ChartArgs,
    install: bool,
    json: bool,
) -> Result<()> {
    let values = chart.values()?;
    let result = service
        .upgrade_release(
            name,
            &chart.chart,
            namespace,
            chart.version.as_deref(),
            values,
            install,
        )
        .await;
    print_result(&result, json)
}

pub async fn uninstall(
    service: &HelmService,
    name: &str,
    namespace: Option<&str>,
    keep_history: bool,
    json: bool,
) -> Result<()> {
    let result = service.uninstall_release(name, namespace, keep_history).await;
    print_result(&result, json)
}

pub async fn values(
    service: &HelmService,
    name: &str,
    namespace: Option<&str>,
    all: bool,
    json: bool,
) -> Result<()> {
    print_result(&service.get_values(name, namespace, all).await, json)
}

pub async fn rollback(
    service: &HelmService,
    name: &str,
    revision: Option<u32>,
    namespace: Option<&str>,
    json: bool,
) -> Result<()> {
    print_result(&service.rollback_release(name, revision, namespace).await, json)
}

pub async fn search(service: &HelmService, keyword: Option<&str>, regex: bool, json: bool) -> Result<()> {
    print_result(&service.search_repos(keyword, regex).await, json)
}

pub async fn repo_add(service: &HelmService, name: &str, url: &str, json: bool) -> Result<()> {
    print_result(&service.repo_add(name, url).await, json)
}

pub async fn repo_list(service: &HelmService, json: bool) -> Result<()> {
    print_result(&service.repo_list().await, json)
}

pub async fn repo_update(service: &HelmService, json: bool) -> Result<()> {
    print_result(&service.repo_update().await, json)
}

pub async fn repo_remove(service: &HelmService, name: &str, json: bool) -> Result<()> {
    print_result(&service.repo_remove(name).await, json)
}
