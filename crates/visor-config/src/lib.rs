//! Configuration loading and persistence for the streaming client.

mod types;

pub use types::*;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .context("could not determine config directory")?
        .join("visor-stream");
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load the settings file, writing the defaults out first if none exists.
pub fn load_config() -> Result<Settings> {
    let path = config_path()?;
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file found, writing defaults");
        let settings = Settings::default();
        save_config(&settings)?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let settings: Settings = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    Ok(settings)
}

pub fn save_config(settings: &Settings) -> Result<()> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    let path = config_path()?;
    let contents = toml::to_string_pretty(settings).context("failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    Ok(())
}
