//! Configuration management for Playweave
//!
//! Settings live in `playweave.yml`, `playweave.json` or `playweave.toml`
//! inside the config directory. The first file found wins, YAML first;
//! without any file the defaults apply.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::playbook::compiler::DEFAULT_MAX_INCLUDE_DEPTH;
use crate::playbook::lookup::StaticLookupRegistry;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayweaveConfig {
    /// Lookup plugins registered on top of the builtin ones
    pub lookup_plugins: Vec<String>,
    /// Maximum depth of nested includes
    pub max_include_depth: usize,
    /// Number of dispatch workers
    pub workers: usize,
    /// Directory relative include paths are resolved against
    /// (default: the directory of the compiled file)
    pub base_dir: Option<PathBuf>,
}

impl Default for PlayweaveConfig {
    fn default() -> Self {
        Self {
            lookup_plugins: Vec::new(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            workers: 4,
            base_dir: None,
        }
    }
}

impl PlayweaveConfig {
    /// Builtin lookups plus the configured plugins
    pub fn lookup_registry(&self) -> StaticLookupRegistry {
        StaticLookupRegistry::with_builtins(self.lookup_plugins.iter().cloned())
    }
}

/// Default config directory: `/etc/playweave` if it exists, otherwise
/// `~/.config/playweave`
pub fn default_config_dir() -> PathBuf {
    let system_config = PathBuf::from("/etc/playweave");
    if system_config.exists() {
        system_config
    } else {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("playweave")
    }
}

/// Load configuration from the config directory
pub fn load_config(config_dir: &Path) -> Result<PlayweaveConfig> {
    let yaml_path = config_dir.join("playweave.yml");
    let json_path = config_dir.join("playweave.json");
    let toml_path = config_dir.join("playweave.toml");

    let config = if yaml_path.exists() {
        let contents = read(&yaml_path)?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("invalid YAML in {}", yaml_path.display()))?
    } else if json_path.exists() {
        let contents = read(&json_path)?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid JSON in {}", json_path.display()))?
    } else if toml_path.exists() {
        let contents = read(&toml_path)?;
        toml::from_str(&contents)
            .with_context(|| format!("invalid TOML in {}", toml_path.display()))?
    } else {
        return Ok(PlayweaveConfig::default());
    };

    validate(&config)?;
    Ok(config)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn validate(config: &PlayweaveConfig) -> Result<()> {
    if config.workers == 0 {
        anyhow::bail!("workers must be at least 1");
    }
    if config.max_include_depth == 0 {
        anyhow::bail!("max_include_depth must be at least 1");
    }
    Ok(())
}
