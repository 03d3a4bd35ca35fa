//! Config command implementation.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;

const KEYS: &str = "scanners-root, registry-path, inventory-path, database-path";

fn display(path: Option<&PathBuf>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("Vigil Configuration");
    println!("{:-<40}", "");
    println!("Scanners Root:   {}", config.scanners_root().display());
    println!("Registry Path:   {}", config.registry_path.display());
    println!("Inventory Path:  {}", display(config.inventory_path.as_ref()));
    println!("Database Path:   {}", display(config.database_path.as_ref()));

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value. `none` clears an optional path.
pub fn set(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let optional = if value.eq_ignore_ascii_case("none") || value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    };

    match key {
        "scanners-root" | "scanners_root" | "root" => config.scanners_root = optional,
        "registry-path" | "registry_path" | "registry" => {
            let Some(path) = optional else {
                anyhow::bail!("registry-path cannot be cleared");
            };
            config.registry_path = path;
        }
        "inventory-path" | "inventory_path" | "inventory" => config.inventory_path = optional,
        "database-path" | "database_path" | "database" => config.database_path = optional,
        _ => {
            anyhow::bail!("Unknown config key: {}. Valid keys: {}", key, KEYS);
        }
    }

    config.save()?;
    println!("Set {} to: {}", key, value);
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    let value = match key {
        "scanners-root" | "scanners_root" | "root" => config.scanners_root().display().to_string(),
        "registry-path" | "registry_path" | "registry" => {
            config.registry_path.display().to_string()
        }
        "inventory-path" | "inventory_path" | "inventory" => {
            display(config.inventory_path.as_ref())
        }
        "database-path" | "database_path" | "database" => display(config.database_path.as_ref()),
        _ => {
            anyhow::bail!("Unknown config key: {}. Valid keys: {}", key, KEYS);
        }
    };

    println!("{}", value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults");
    Ok(())
}
