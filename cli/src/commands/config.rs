//! Config commands - show, change and create the settings file.

use anyhow::{bail, Result};
use kubedispatch_core::{ConfigStore, Settings};

pub fn show(store: &ConfigStore, settings: &Settings, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    let optional_path = |path: Option<std::path::PathBuf>| {
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("Config file:        {}", store.path().display());
    println!("Primary backend:    {}", settings.primary.as_str());
    println!(
        "Fallback:           {}",
        match settings.secondary() {
            Some(mode) => mode.as_str(),
            None => "disabled",
        }
    );
    println!("kubectl:            {}", optional_path(settings.kubectl_path.clone()));
    println!("helm:               {}", optional_path(settings.helm_path.clone()));
    println!("kubeconfig:         {}", optional_path(settings.kubeconfig()));
    println!("Command timeout:    {}s", settings.command_timeout_secs);
    println!("Forward timeout:    {}s", settings.port_forward_timeout_secs);
    println!("Default namespace:  {}", settings.default_namespace);
    Ok(())
}

/// Changes one stored setting. Command-line overrides are not persisted.
pub async fn set(store: &ConfigStore, key: &str, value: &str) -> Result<Settings> {
    let mut settings = store.load().await?;
    settings.set(key, value)?;
    store.save(&settings).await?;
    Ok(settings)
}

/// Writes the default settings. An existing file is kept unless `force` is set.
pub async fn init(store: &ConfigStore, force: bool) -> Result<()> {
    if store.path().exists() && !force {
        bail!(
            "{} already exists; use --force to overwrite it",
            store.path().display()
        );
    }
    store.save(&Settings::default()).await?;
    Ok(())
}
