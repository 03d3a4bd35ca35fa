//! Self-inspection: what is registered, what is declared, what drifted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::catalog::ScannerCatalog;
use crate::drift::{compute_drift, scan_live, DriftReport};
use crate::error::PluginResult;
use crate::manifest::discover_manifests;
use crate::registry::{build_registry, LoadIssue, PluginRegistry, ScannerMeta};

/// Summary of one category manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub description: String,
    pub declared: usize,
    pub registered: Vec<String>,
}

/// A manifest that could not be loaded at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestError {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything a caller needs to render the state of the scanner tree.
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionReport {
    pub root: PathBuf,
    pub names: Vec<String>,
    pub scanners: Vec<ScannerMeta>,
    pub categories: BTreeMap<String, CategorySummary>,
    pub issues: Vec<LoadIssue>,
    pub manifest_errors: Vec<ManifestError>,
    pub drift: DriftReport,
}

impl IntrospectionReport {
    /// Whether anything needs attention.
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty() && self.manifest_errors.is_empty() && self.drift.is_clean()
    }
}

/// A registry together with the report describing how it was built.
#[derive(Debug)]
pub struct Discovery {
    pub registry: PluginRegistry,
    pub report: IntrospectionReport,
}

/// Discover manifests under `root`, build the registry and compute drift.
pub fn discover(root: &Path, catalog: &ScannerCatalog) -> PluginResult<Discovery> {
    let set = discover_manifests(root)?;
    let (registry, issues) = build_registry(root, &set.manifests, catalog);
    let live = scan_live(root)?;
    let drift = compute_drift(&registry, &set.manifests, &live);

    let mut categories: BTreeMap<String, CategorySummary> = BTreeMap::new();
    for manifest in &set.manifests {
        let summary = categories
            .entry(manifest.category.clone())
            .or_insert_with(|| CategorySummary {
                description: manifest.description.clone(),
                declared: 0,
                registered: registry
                    .list_by_category(&manifest.category)
                    .keys()
                    .cloned()
                    .collect(),
            });
        summary.declared += manifest.entries.len() + manifest.issues.len();
    }

    let names = registry.all_names();
    let scanners = names
        .iter()
        .filter_map(|name| registry.meta(name).cloned())
        .collect();

    let manifest_errors = set
        .failures
        .iter()
        .map(|f| ManifestError {
            path: f.path.clone(),
            reason: f.error.to_string(),
        })
        .collect();

    let report = IntrospectionReport {
        root: root.to_path_buf(),
        names,
        scanners,
        categories,
        issues,
        manifest_errors,
        drift,
    };

    info!(
        root = %root.display(),
        scanners = report.names.len(),
        issues = report.issues.len(),
        drift_clean = report.drift.is_clean(),
        "Introspection complete"
    );

    Ok(Discovery { registry, report })
}
