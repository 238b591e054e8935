// Configuration loader
// Loads settings from ~/.aula/config.toml (or $AULA_CONFIG) plus environment overrides

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::{CONFIG_DIR, CONFIG_FILE};
use super::settings::Config;

/// Load configuration from the config file and environment
pub fn load_config() -> Result<Config> {
    let mut config = match config_path() {
        Some(path) if path.exists() => load_config_from(&path)?,
        Some(path) => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Config::default()
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// Load an explicit config file, without environment overrides or validation
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// `$AULA_CONFIG` if set, else `~/.aula/config.toml`
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AULA_CONFIG") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Apply `AULA_BASE_URL`, `AULA_TOKEN` and `AULA_SENDER` from `lookup`.
/// Empty values are ignored.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(base_url) = get("AULA_BASE_URL") {
        config.backend.base_url = base_url;
    }
    if let Some(token) = get("AULA_TOKEN") {
        config.backend.token = Some(token);
    }
    if let Some(sender) = get("AULA_SENDER") {
        config.identity.sender = Some(sender);
    }
}
