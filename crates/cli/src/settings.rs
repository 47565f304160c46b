use anyhow::{Context, Result};
use codeflow_block_engine::{EngineConfig, EngineError};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "codeflow.toml";

/// Resolve engine settings.
///
/// An explicit path must exist; otherwise `codeflow.toml` in the working
/// directory is used when present, and built-in defaults when not.
pub fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    let path = match explicit {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
        None => return Ok(EngineConfig::default()),
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = parse_config(&raw).with_context(|| format!("In {}", path.display()))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn parse_config(raw: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(raw).context("Invalid TOML")?;
    config.validate().map_err(EngineError::invalid_config)?;
    Ok(config)
}
