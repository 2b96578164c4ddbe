//! Application configuration for AssetForge.
//!
//! User config lives at `~/.assetforge/assetforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AssetForgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "assetforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".assetforge";

/// Default database file name inside the config directory.
const DATABASE_FILE_NAME: &str = "assetforge.db";

// ---------------------------------------------------------------------------
// Config structs (matching assetforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Consolidation engine settings.
    #[serde(default)]
    pub engine: EngineSection,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageSection,

    /// Request defaults.
    #[serde(default)]
    pub defaults: DefaultsSection,
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Maximum number of asset groups enhanced concurrently.
    #[serde(default = "default_enhancement_concurrency")]
    pub enhancement_concurrency: usize,

    /// Wall-clock budget for the whole enhancement fan-out, in ms.
    #[serde(default = "default_enhancement_budget_ms")]
    pub enhancement_budget_ms: u64,

    /// Raw-asset ids starting with this prefix carry extractor metadata
    /// and are never consolidated.
    #[serde(default = "default_internal_marker_prefix")]
    pub internal_marker_prefix: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            enhancement_concurrency: default_enhancement_concurrency(),
            enhancement_budget_ms: default_enhancement_budget_ms(),
            internal_marker_prefix: default_internal_marker_prefix(),
        }
    }
}

fn default_enhancement_concurrency() -> usize {
    4
}
fn default_enhancement_budget_ms() -> u64 {
    30_000
}
fn default_internal_marker_prefix() -> String {
    "_".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Database file path. Defaults to `~/.assetforge/assetforge.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsSection {
    /// Deliverable type passed through to the engine.
    #[serde(default = "default_deliverable_type")]
    pub deliverable_type: String,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            deliverable_type: default_deliverable_type(),
        }
    }
}

fn default_deliverable_type() -> String {
    "business_assets".into()
}

// ---------------------------------------------------------------------------
// Engine config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum in-flight group enhancements (at least 1).
    pub enhancement_concurrency: usize,
    /// Overall budget for all group enhancements of one request.
    pub enhancement_budget: Duration,
    /// Prefix of raw-asset ids reserved for extractor metadata.
    pub internal_marker_prefix: String,
    /// Deliverable type passed through per request.
    pub deliverable_type: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enhancement_concurrency: config.engine.enhancement_concurrency.max(1),
            enhancement_budget: Duration::from_millis(config.engine.enhancement_budget_ms),
            internal_marker_prefix: config.engine.internal_marker_prefix.clone(),
            deliverable_type: config.defaults.deliverable_type.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.assetforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AssetForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.assetforge/assetforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: explicit config value, else the default location.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.storage.database_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(config_dir()?.join(DATABASE_FILE_NAME)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AssetForgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        AssetForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AssetForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AssetForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AssetForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("enhancement_concurrency"));
        assert!(toml_str.contains("business_assets"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[engine]
enhancement_budget_ms = 500

[storage]
database_path = "/tmp/assets.db"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.engine.enhancement_budget_ms, 500);
        assert_eq!(config.engine.enhancement_concurrency, 4);
        assert_eq!(config.engine.internal_marker_prefix, "_");
        assert_eq!(
            database_path(&config).expect("db path"),
            PathBuf::from("/tmp/assets.db")
        );
    }

    #[test]
    fn engine_config_from_app_config() {
        let mut app = AppConfig::default();
        app.engine.enhancement_concurrency = 0;
        let engine = EngineConfig::from(&app);
        assert_eq!(engine.enhancement_concurrency, 1);
        assert_eq!(engine.enhancement_budget, Duration::from_secs(30));
        assert_eq!(engine.deliverable_type, "business_assets");
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/assetforge.toml")).unwrap_err();
        assert!(matches!(err, AssetForgeError::Io { .. }));
    }
}
