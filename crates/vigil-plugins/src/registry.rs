//! The scanner registry built from category manifests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{ScanFn, ScannerCatalog};
use crate::manifest::{CategoryManifest, ScannerManifestEntry};

static EMPTY_CATEGORY: BTreeMap<String, ScanFn> = BTreeMap::new();

/// Metadata kept for every registered scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannerMeta {
    pub name: String,
    pub category: String,
    pub file: String,
    pub function: String,
    pub description: String,
}

impl ScannerMeta {
    fn from_entry(category: &str, entry: &ScannerManifestEntry) -> Self {
        Self {
            name: entry.name.clone(),
            category: category.to_string(),
            file: entry.file_name.clone(),
            function: entry.function_name.clone(),
            description: entry.description.clone(),
        }
    }
}

/// Why a declared scanner did not make it into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadIssueKind {
    /// The manifest entry itself was malformed.
    InvalidEntry { reason: String },
    /// The backing file does not exist.
    FileMissing { path: PathBuf },
    /// The file exists but the function is not registered for it.
    FunctionMissing,
    /// Another scanner already registered this name.
    Duplicate { registered_in: String },
}

/// A non-fatal problem found while building the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadIssue {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(flatten)]
    pub kind: LoadIssueKind,
}

impl LoadIssue {
    fn for_entry(category: &str, entry: &ScannerManifestEntry, kind: LoadIssueKind) -> Self {
        Self {
            category: category.to_string(),
            name: Some(entry.name.clone()),
            file: Some(entry.file_name.clone()),
            function: Some(entry.function_name.clone()),
            kind,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.kind, LoadIssueKind::Duplicate { .. })
    }
}

impl std::fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.name.as_deref().unwrap_or("<unnamed>");
        match &self.kind {
            LoadIssueKind::InvalidEntry { reason } => {
                write!(f, "{}/{}: invalid manifest entry ({})", self.category, name, reason)
            }
            LoadIssueKind::FileMissing { path } => {
                write!(f, "{}/{}: file {} not found", self.category, name, path.display())
            }
            LoadIssueKind::FunctionMissing => write!(
                f,
                "{}/{}: function '{}' not found in {}",
                self.category,
                name,
                self.function.as_deref().unwrap_or("?"),
                self.file.as_deref().unwrap_or("?")
            ),
            LoadIssueKind::Duplicate { registered_in } => write!(
                f,
                "{}/{}: name already registered by category '{}'",
                self.category, name, registered_in
            ),
        }
    }
}

/// Name → scanner lookup, flat and grouped by category.
///
/// Every name appears in exactly one category.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    by_name: BTreeMap<String, ScanFn>,
    by_category: BTreeMap<String, BTreeMap<String, ScanFn>>,
    meta: BTreeMap<String, ScannerMeta>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("scanners", &self.meta)
            .finish()
    }
}

impl PluginRegistry {
    /// Exact lookup by scanner name.
    pub fn get(&self, name: &str) -> Option<ScanFn> {
        self.by_name.get(name).copied()
    }

    /// Scanners of one category; empty when the category is unknown.
    pub fn list_by_category(&self, category: &str) -> &BTreeMap<String, ScanFn> {
        self.by_category.get(category).unwrap_or(&EMPTY_CATEGORY)
    }

    /// All registered names in sorted order.
    pub fn all_names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    /// Known categories in sorted order, including ones with no scanners.
    pub fn categories(&self) -> Vec<String> {
        self.by_category.keys().cloned().collect()
    }

    /// Metadata for a registered scanner.
    pub fn meta(&self, name: &str) -> Option<&ScannerMeta> {
        self.meta.get(name)
    }

    /// Whether `name` is registered under `category`.
    pub fn contains(&self, category: &str, name: &str) -> bool {
        self.list_by_category(category).contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn insert(&mut self, meta: ScannerMeta, scan: ScanFn) {
        self.by_name.insert(meta.name.clone(), scan);
        self.by_category
            .entry(meta.category.clone())
            .or_default()
            .insert(meta.name.clone(), scan);
        self.meta.insert(meta.name.clone(), meta);
    }
}

/// Build the registry from loaded manifests.
///
/// Manifests are processed in category order, entries in file order. Each
/// entry resolves against `root/<category>/<file>` on disk and against the
/// catalog by `(category, module, function)`. Entries that do not resolve
/// are reported as [`LoadIssue`]s and left out. On a name collision the
/// first registration wins.
pub fn build_registry(
    root: &Path,
    manifests: &[CategoryManifest],
    catalog: &ScannerCatalog,
) -> (PluginRegistry, Vec<LoadIssue>) {
    let mut registry = PluginRegistry::default();
    let mut issues = Vec::new();

    let mut ordered: Vec<&CategoryManifest> = manifests.iter().collect();
    ordered.sort_by(|a, b| a.category.cmp(&b.category));

    for manifest in ordered {
        let category = manifest.category.as_str();
        registry.by_category.entry(category.to_string()).or_default();

        for rejected in &manifest.issues {
            issues.push(LoadIssue {
                category: category.to_string(),
                name: rejected.name.clone(),
                file: None,
                function: None,
                kind: LoadIssueKind::InvalidEntry {
                    reason: rejected.reason.clone(),
                },
            });
        }

        for entry in &manifest.entries {
            match resolve_entry(root, category, entry, catalog, &registry) {
                Ok(scan) => {
                    debug!(category, name = %entry.name, "Registered scanner");
                    registry.insert(ScannerMeta::from_entry(category, entry), scan);
                }
                Err(kind) => {
                    let issue = LoadIssue::for_entry(category, entry, kind);
                    warn!(%issue, "Scanner not registered");
                    issues.push(issue);
                }
            }
        }
    }

    info!(
        scanners = registry.len(),
        categories = registry.by_category.len(),
        issues = issues.len(),
        "Built scanner registry"
    );

    (registry, issues)
}

fn resolve_entry(
    root: &Path,
    category: &str,
    entry: &ScannerManifestEntry,
    catalog: &ScannerCatalog,
    registry: &PluginRegistry,
) -> Result<ScanFn, LoadIssueKind> {
    let path = root.join(category).join(&entry.file_name);
    if !path.is_file() {
        return Err(LoadIssueKind::FileMissing { path });
    }

    let scan = catalog
        .resolve(category, entry.module(), &entry.function_name)
        .ok_or(LoadIssueKind::FunctionMissing)?;

    if let Some(existing) = registry.meta(&entry.name) {
        return Err(LoadIssueKind::Duplicate {
            registered_in: existing.category.clone(),
        });
    }

    Ok(scan)
}
