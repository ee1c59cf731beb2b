//! Configuration file management for ketchup.
//!
//! Provides a TOML-based config file at `~/.config/ketchup/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ketchup_core::config::PlannerConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub maps: MapsSection,
    #[serde(default)]
    pub planner: PlannerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModelSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub generation_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MapsSection {
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlannerSection {
    pub fallback: Option<bool>,
    pub max_tool_rounds: Option<usize>,
    pub default_location: Option<String>,
}

impl ConfigFile {
    /// The file's value for a `KETCHUP_*` variable name, as text.
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "KETCHUP_MODEL_BASE_URL" => self.model.base_url.clone(),
            "KETCHUP_MODEL" => self.model.model.clone(),
            "KETCHUP_MODEL_API_KEY" => self.model.api_key.clone(),
            "KETCHUP_GENERATION_TIMEOUT_SECS" => {
                self.model.generation_timeout_secs.map(|s| s.to_string())
            }
            "KETCHUP_MAPS_API_KEY" => self.maps.api_key.clone(),
            "KETCHUP_PLANNER_FALLBACK" => self.planner.fallback.map(|b| b.to_string()),
            "KETCHUP_MAX_TOOL_ROUNDS" => self.planner.max_tool_rounds.map(|n| n.to_string()),
            "KETCHUP_DEFAULT_LOCATION" => self.planner.default_location.clone(),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the ketchup config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/ketchup` or `~/.config/ketchup`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("ketchup");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ketchup")
}

/// Return the path to the ketchup config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file if one exists. A present but malformed file is an error.
pub fn load_optional_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(&path).map(Some)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix since it may hold API keys.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Flags that override everything else.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub no_fallback: bool,
    pub max_rounds: Option<usize>,
}

/// Resolve planner configuration using the chain: CLI flag > env var > config file > default.
pub fn resolve(cli: &CliOverrides) -> Result<PlannerConfig> {
    let file = load_optional_config()?;
    Ok(resolve_with(cli, file.as_ref(), |key| std::env::var(key).ok()))
}

fn resolve_with(
    cli: &CliOverrides,
    file: Option<&ConfigFile>,
    env: impl Fn(&str) -> Option<String>,
) -> PlannerConfig {
    let mut config = PlannerConfig::from_lookup(|key| {
        env(key)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| file.and_then(|f| f.lookup(key)))
    });

    if let Some(url) = &cli.base_url {
        config.model.base_url = url.clone();
    }
    if let Some(model) = &cli.model {
        config.model.model = model.clone();
    }
    if cli.no_fallback {
        config.fallback_enabled = false;
    }
    if let Some(rounds) = cli.max_rounds {
        config.max_tool_rounds = rounds;
    }
    config
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
