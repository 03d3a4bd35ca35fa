//! Identity commands: key derivation, reconciliation and adjudication.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use vigil_identity::{
    adjudicate as adjudicate_record, load_database, load_inventory, mint_id, plan, read_registry,
    reconcile as reconcile_sources, CanonicalKey, IdentityStatus, Loaded, LockedRegistry,
    Reconciliation, RegistryFile, Resolution,
};

use crate::config::{BackendStatus, Backends, Config};

/// Print the canonical key and minted id for a URL or key.
pub fn key(input: &str) -> Result<()> {
    let key = CanonicalKey::detect(input)?;
    println!("{}\t{}", key, mint_id(&key));
    Ok(())
}

/// Options for `vigil identity reconcile`.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub inventory: Option<PathBuf>,
    pub registry: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub write: bool,
    pub plan: Option<PathBuf>,
    pub json: bool,
}

/// Reconcile inventory, registry and database; optionally persist.
pub fn reconcile(config: &Config, options: ReconcileOptions) -> Result<Reconciliation> {
    let mut config = config.clone();
    if options.database.is_some() {
        config.database_path = options.database.clone();
    }
    let backends = Backends::probe(&config);

    let inventory_path = options.inventory.or_else(|| config.inventory_path.clone());
    let registry_path = options
        .registry
        .unwrap_or_else(|| config.registry_path.clone());

    let inventory = match &inventory_path {
        Some(path) => load_inventory(path)
            .with_context(|| format!("Failed to load inventory {}", path.display()))?,
        None => {
            warn!("No inventory configured; reconciling registry and database only");
            Loaded::default()
        }
    };

    // A writing run holds the lock from this read through the commit.
    let locked = if options.write {
        Some(LockedRegistry::open(&registry_path)?)
    } else {
        None
    };
    let existing = match &locked {
        Some(locked) => locked.file().cloned().unwrap_or_default(),
        None => read_registry(&registry_path)?.unwrap_or_default(),
    };

    let database = match config.database_path.as_deref() {
        Some(path) if backends.database_available() => Some(
            load_database(path)
                .with_context(|| format!("Failed to load database snapshot {}", path.display()))?,
        ),
        _ => {
            if let BackendStatus::Unreadable(reason) = &backends.database {
                warn!(reason = %reason, "Database snapshot unreadable; skipping");
            }
            None
        }
    };

    let mut result = reconcile_sources(
        &inventory.entries,
        &existing.projects,
        database.as_ref().map(|d| d.entries.as_slice()),
    )?;
    result.summary.source_issues =
        inventory.issues.len() + database.as_ref().map(|d| d.issues.len()).unwrap_or(0);

    for issue in inventory
        .issues
        .iter()
        .chain(database.iter().flat_map(|d| d.issues.iter()))
    {
        warn!(source = %issue.source, index = issue.index, reason = %issue.reason, "Skipped source row");
    }

    if let Some(plan_path) = &options.plan {
        let patch_plan = plan(&result.identities);
        let json = serde_json::to_string_pretty(&patch_plan)?;
        std::fs::write(plan_path, json + "\n")
            .with_context(|| format!("Failed to write plan to {}", plan_path.display()))?;
        info!(path = %plan_path.display(), patches = patch_plan.patches.len(), "Wrote patch plan");
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, &backends, &registry_path);
    }

    if let Some(locked) = locked {
        locked.commit(&RegistryFile::from_identities(&result.identities))?;
        if !options.json {
            println!();
            println!("💾 Registry written to {}", registry_path.display());
        }
    }

    Ok(result)
}

fn print_summary(result: &Reconciliation, backends: &Backends, registry_path: &Path) {
    let s = &result.summary;
    println!("🪪 Identity Reconciliation");
    println!("{:─<50}", "");
    println!("📍 Registry:   {}", registry_path.display());
    println!("🗄️  Database:   {}", backends.database);
    println!();
    println!("Total:          {}", s.total);
    println!("Converged:      {}", s.converged);
    println!("Discovered:     {}", s.discovered);
    println!(
        "Conflicts:      {} ({} acknowledged)",
        s.conflicts, s.acknowledged
    );
    println!(
        "Sources:        inventory {}, registry {}, database {}",
        s.from_inventory, s.from_local_registry, s.from_database
    );
    if s.duplicates > 0 || s.source_issues > 0 {
        println!(
            "Skipped:        {} duplicate(s), {} unreadable row(s)",
            s.duplicates, s.source_issues
        );
    }

    let conflicts: Vec<_> = result.conflicts().collect();
    if !conflicts.is_empty() {
        println!();
        println!("🧊 Frozen (manual review required):");
        for identity in conflicts {
            println!(
                "   {}  existing {}  minted {}{}",
                identity.canonical_key,
                identity.existing_id,
                identity.minted_id,
                if identity.acknowledged {
                    "  [acknowledged]"
                } else {
                    ""
                }
            );
        }
    }
}

/// Resolve one frozen record in the registry file.
pub fn adjudicate(
    config: &Config,
    key: &str,
    resolution: Resolution,
    registry: Option<PathBuf>,
) -> Result<()> {
    let key = CanonicalKey::detect(key)?;
    let registry_path = registry.unwrap_or_else(|| config.registry_path.clone());

    let locked = LockedRegistry::open(&registry_path)?;
    let mut file: RegistryFile = locked
        .file()
        .cloned()
        .with_context(|| format!("No registry at {}", registry_path.display()))?;

    let outcome = adjudicate_record(&mut file, &key, resolution)?;
    locked.commit(&file)?;

    match outcome.status {
        IdentityStatus::Converged => println!(
            "✅ {} now uses {} (was {})",
            outcome.canonical_key, outcome.id, outcome.previous_id
        ),
        _ => println!(
            "📝 {} acknowledged; keeps {}",
            outcome.canonical_key, outcome.id
        ),
    }
    Ok(())
}
