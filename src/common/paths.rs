use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the shortgen config directory
pub fn shortgen_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join("shortgen");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory at {}", config_dir.display()))?;

    Ok(config_dir)
}

/// Default location for rendered content when none is configured
pub fn default_content_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shortgen")
        .join("content")
}
