//! Scanner listing and execution.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};
use vigil_plugins::{discover, Discovery, ScannerCatalog};

use crate::config::Config;

/// Build the registry for the configured scanner root.
pub fn load(config: &Config) -> Result<Discovery> {
    let root = config.scanners_root();
    debug!(root = %root.display(), "Discovering scanners");
    discover(&root, &ScannerCatalog::builtin())
        .with_context(|| format!("Failed to discover scanners under {}", root.display()))
}

/// List registered scanners, optionally for one category.
pub fn list(config: &Config, category: Option<&str>) -> Result<()> {
    let discovery = load(config)?;
    let registry = &discovery.registry;

    let categories = match category {
        Some(c) => {
            if !discovery.report.categories.contains_key(c) {
                anyhow::bail!(
                    "Unknown category: {}. Known categories: {}",
                    c,
                    registry.categories().join(", ")
                );
            }
            vec![c.to_string()]
        }
        None => registry.categories(),
    };

    for category in categories {
        println!("📂 {}", category);
        for name in registry.list_by_category(&category).keys() {
            let description = registry
                .meta(name)
                .map(|m| m.description.as_str())
                .unwrap_or("");
            println!("   • {:<20} {}", name, description);
        }
    }

    let issues = discovery.report.issues.len();
    if issues > 0 {
        println!();
        println!("⚠️  {} load issue(s); run `vigil introspect` for details", issues);
    }

    Ok(())
}

/// Run one scanner against `path` and print its JSON output.
pub fn run(config: &Config, name: &str, path: &Path) -> Result<()> {
    let discovery = load(config)?;
    let scan = discovery.registry.get(name).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown scanner: {}. Available: {}",
            name,
            discovery.registry.all_names().join(", ")
        )
    })?;

    info!(scanner = name, path = %path.display(), "Running scanner");
    let output =
        scan(path).with_context(|| format!("Scanner '{}' failed on {}", name, path.display()))?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
