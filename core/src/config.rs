//! Configuration management.
//!
//! Stores settings in JSON format at `~/.kubedispatch/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::{dns1123_violation, ExecutionMode};
use crate::error::{Error, Result};

/// Settings stored in `config.json`. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend tried first.
    pub primary: ExecutionMode,

    /// Fall back to the other backend when the primary is unavailable.
    pub fallback_enabled: bool,

    /// Explicit kubectl binary; searched for when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubectl_path: Option<PathBuf>,

    /// Explicit helm binary; searched for when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helm_path: Option<PathBuf>,

    /// Kubeconfig file; `KUBECONFIG` and the usual defaults apply when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Upper bound for one backend call, in seconds.
    pub command_timeout_secs: u64,

    /// How long to wait for a port-forward to start listening, in seconds.
    pub port_forward_timeout_secs: u64,

    /// Namespace used when a request does not name one.
    pub default_namespace: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primary: ExecutionMode::Sdk,
            fallback_enabled: true,
            kubectl_path: None,
            helm_path: None,
            kubeconfig: None,
            command_timeout_secs: 10,
            port_forward_timeout_secs: 10,
            default_namespace: "default".to_string(),
        }
    }
}

impl Settings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn port_forward_timeout(&self) -> Duration {
        Duration::from_secs(self.port_forward_timeout_secs)
    }

    /// Kubeconfig to hand to kubectl: the configured file, else `$KUBECONFIG`.
    pub fn kubeconfig(&self) -> Option<PathBuf> {
        self.kubeconfig
            .clone()
            .or_else(|| std::env::var_os("KUBECONFIG").map(PathBuf::from))
    }

    /// The backend used when the primary is unavailable, if fallback is enabled.
    pub fn secondary(&self) -> Option<ExecutionMode> {
        self.fallback_enabled.then(|| self.primary.other())
    }

    /// Rejects values no backend can work with.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(Error::Config(
                "command_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.port_forward_timeout_secs == 0 {
            return Err(Error::Config(
                "port_forward_timeout_secs must be at least 1".to_string(),
            ));
        }
        if let Some(reason) = dns1123_violation(&self.default_namespace) {
            return Err(Error::Config(format!("default_namespace: {}", reason)));
        }
        Ok(())
    }

    /// Sets one field from its `config.json` key and a string value.
    ///
    /// Path keys accept an empty value to clear them. The result is validated.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let invalid = |what: &str| Error::Config(format!("invalid value '{}' for {}: {}", value, key, what));
        let optional_path = || (!value.is_empty()).then(|| PathBuf::from(value));

        match key {
            "primary" => self.primary = value.parse().map_err(|e: String| invalid(&e))?,
            "fallback_enabled" => {
                self.fallback_enabled = value.parse().map_err(|_| invalid("expected true or false"))?
            }
            "kubectl_path" => self.kubectl_path = optional_path(),
            "helm_path" => self.helm_path = optional_path(),
            "kubeconfig" => self.kubeconfig = optional_path(),
            "command_timeout_secs" => {
                self.command_timeout_secs = value.parse().map_err(|_| invalid("expected seconds"))?
            }
            "port_forward_timeout_secs" => {
                self.port_forward_timeout_secs =
                    value.parse().map_err(|_| invalid("expected seconds"))?
            }
            "default_namespace" => self.default_namespace = value.to_string(),
            other => return Err(Error::Config(format!("unknown setting '{}'", other))),
        }

        self.validate()
    }
}

/// Configuration store for reading and writing settings.
///
/// Handles reading and writing `~/.kubedispatch/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.kubedispatch/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_path = home.join(".kubedispatch").join("config.json");

        Ok(Self { config_path })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load settings from disk.
    ///
    /// Returns default settings if the file doesn't exist.
    pub async fn load(&self) -> Result<Settings> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;

        if let Some(config_dir) = self.config_path.parent() {
            fs::create_dir_all(config_dir)
                .await
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(settings)?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }
}
