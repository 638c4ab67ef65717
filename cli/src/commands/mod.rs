//! CLI command implementations.

pub mod cluster;
pub mod config;
pub mod deployment;
pub mod helm;
pub mod namespace;
mod output;
pub mod pod;

use std::collections::BTreeMap;

/// Parses `KEY=VALUE` arguments such as `--label app=web`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn to_map(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}
