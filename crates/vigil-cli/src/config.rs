//! CLI configuration management.
//!
//! Precedence, lowest first: defaults, the config file, `VIGIL_*`
//! environment variables (a `.env` file is honored), then CLI flags.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vigil_plugins::BUILTIN_SCANNERS_ROOT;

/// Overrides the config file location.
const CONFIG_ENV: &str = "VIGIL_CONFIG";

/// Application-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the scanner category directories. `None` means the built-in tree.
    pub scanners_root: Option<PathBuf>,

    /// Canonical registry file.
    pub registry_path: PathBuf,

    /// Project inventory (JSON).
    pub inventory_path: Option<PathBuf>,

    /// Database snapshot (JSON). Optional backend.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let registry_path = project_dirs()
            .map(|dirs| dirs.data_dir().join("registry.json"))
            .unwrap_or_else(|| PathBuf::from("registry.json"));

        Self {
            scanners_root: None,
            registry_path,
            inventory_path: None,
            database_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = Self::load_file()?;

        if let Ok(root) = std::env::var("VIGIL_SCANNERS_ROOT") {
            config.scanners_root = Some(PathBuf::from(root));
        }
        if let Ok(registry) = std::env::var("VIGIL_REGISTRY_PATH") {
            config.registry_path = PathBuf::from(registry);
        }
        if let Ok(inventory) = std::env::var("VIGIL_INVENTORY_PATH") {
            config.inventory_path = Some(PathBuf::from(inventory));
        }
        if let Ok(database) = std::env::var("VIGIL_DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(database));
        }

        Ok(config)
    }

    /// Load the config file alone, without environment overrides.
    pub fn load_file() -> Result<Self> {
        let Some(config_path) = Self::config_file_path() else {
            return Ok(Self::default());
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config = serde_json::from_str(&contents).with_context(|| {
            format!("Failed to parse config file {}", config_path.display())
        })?;
        debug!(path = %config_path.display(), "Loaded config file");
        Ok(config)
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_file_path() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        }
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Scanner root in effect.
    pub fn scanners_root(&self) -> PathBuf {
        self.scanners_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(BUILTIN_SCANNERS_ROOT))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "vigil", "vigil")
}

/// Availability of an optional backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BackendStatus {
    Available,
    Missing,
    Unreadable(String),
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendStatus::Available => write!(f, "available"),
            BackendStatus::Missing => write!(f, "not configured"),
            BackendStatus::Unreadable(reason) => write!(f, "unreadable ({})", reason),
        }
    }
}

/// Optional backends, probed once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backends {
    pub database: BackendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Backends {
    pub fn probe(config: &Config) -> Self {
        let database = match config.database_path.as_deref() {
            None => BackendStatus::Missing,
            Some(path) => probe_file(path),
        };
        debug!(database = %database, "Probed backends");

        Self {
            database,
            database_path: config.database_path.clone(),
        }
    }

    pub fn database_available(&self) -> bool {
        self.database == BackendStatus::Available
    }
}

fn probe_file(path: &Path) -> BackendStatus {
    if !path.exists() {
        warn!(path = %path.display(), "Database snapshot configured but not found");
        return BackendStatus::Missing;
    }
    if !path.is_file() {
        return BackendStatus::Unreadable("not a regular file".to_string());
    }
    match File::open(path) {
        Ok(_) => BackendStatus::Available,
        Err(e) => BackendStatus::Unreadable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_uses_builtin_scanners() {
        let config = Config {
            scanners_root: None,
            ..Config::default()
        };
        assert_eq!(config.scanners_root(), PathBuf::from(BUILTIN_SCANNERS_ROOT));
        assert!(config.registry_path.ends_with("registry.json"));
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"inventory_path": "inv.json"}"#).unwrap();
        assert_eq!(config.inventory_path, Some(PathBuf::from("inv.json")));
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_probe_database() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("db.json");
        std::fs::write(&present, "[]").unwrap();

        let mut config = Config::default();
        assert_eq!(Backends::probe(&config).database, BackendStatus::Missing);

        config.database_path = Some(temp.path().join("absent.json"));
        assert_eq!(Backends::probe(&config).database, BackendStatus::Missing);

        config.database_path = Some(temp.path().to_path_buf());
        assert!(matches!(
            Backends::probe(&config).database,
            BackendStatus::Unreadable(_)
        ));

        config.database_path = Some(present);
        assert!(Backends::probe(&config).database_available());
    }
}
