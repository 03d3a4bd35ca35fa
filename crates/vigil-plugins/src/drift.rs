//! Drift between declared manifests and the scanner files on disk.
//!
//! Nothing here is cached: every call walks the scanners root again so the
//! report always reflects the current tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::PluginResult;
use crate::manifest::{category_dirs, CategoryManifest};
use crate::registry::PluginRegistry;

/// Extensions of files that count as scanner sources.
const PLUGIN_EXTENSIONS: &[&str] = &["rs"];

/// Files inside a category directory that never hold a scanner.
const NON_PLUGIN_FILES: &[&str] = &["mod.rs", "lib.rs"];

/// Scanner-like files found on disk, grouped by category directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveScan {
    pub root: PathBuf,
    pub categories: BTreeMap<String, BTreeSet<String>>,
}

impl LiveScan {
    /// Whether `file` exists live under `category`.
    pub fn has(&self, category: &str, file: &str) -> bool {
        self.categories
            .get(category)
            .map(|files| files.contains(file))
            .unwrap_or(false)
    }

    /// Total number of scanner files found.
    pub fn total(&self) -> usize {
        self.categories.values().map(|f| f.len()).sum()
    }
}

/// Walk the category directories of `root` and list scanner-like files.
///
/// Only files directly inside a category directory are considered.
pub fn scan_live(root: &Path) -> PluginResult<LiveScan> {
    let mut live = LiveScan {
        root: root.to_path_buf(),
        categories: BTreeMap::new(),
    };

    for dir in category_dirs(root)? {
        let Some(category) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let mut files = BTreeSet::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_plugin_file(name) {
                    files.insert(name.to_string());
                }
            }
        }

        debug!(category, files = files.len(), "Scanned category directory");
        live.categories.insert(category.to_string(), files);
    }

    Ok(live)
}

fn is_plugin_file(name: &str) -> bool {
    if name.starts_with('_') || name.starts_with('.') || NON_PLUGIN_FILES.contains(&name) {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| PLUGIN_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Why a declared scanner is reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// The declared file is not on disk.
    FileAbsent,
    /// The file exists but the declared function did not resolve.
    Unresolved,
}

/// A manifest entry whose file or function could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFile {
    pub category: String,
    pub name: String,
    pub file: String,
    pub function: String,
    pub reason: MissingReason,
}

/// A manifest entry whose file lives under another category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryMismatch {
    pub name: String,
    pub file: String,
    pub declared_in: String,
    pub found_in: Vec<String>,
}

/// Discrepancies between manifests and the live tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// `category/file` paths found on disk but declared by no manifest.
    pub undocumented: Vec<String>,

    /// Declared scanners that could not be resolved.
    pub missing_files: Vec<MissingFile>,

    /// Declared files that exist only under a different category.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category_mismatches: Vec<CategoryMismatch>,
}

impl DriftReport {
    /// Whether manifests and disk agree.
    pub fn is_clean(&self) -> bool {
        self.undocumented.is_empty()
            && self.missing_files.is_empty()
            && self.category_mismatches.is_empty()
    }
}

/// Compare the registry and its manifests with a live scan.
pub fn compute_drift(
    registry: &PluginRegistry,
    manifests: &[CategoryManifest],
    live: &LiveScan,
) -> DriftReport {
    let mut report = DriftReport::default();
    let mut declared: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for manifest in manifests {
        let category = manifest.category.as_str();
        for entry in &manifest.entries {
            declared
                .entry(category)
                .or_default()
                .insert(entry.file_name.as_str());

            // Same presence test the registry applies when resolving.
            let on_disk = live.root.join(category).join(&entry.file_name).is_file();
            if !on_disk {
                let found_in: Vec<String> = live
                    .categories
                    .iter()
                    .filter(|(other, files)| {
                        other.as_str() != category && files.contains(&entry.file_name)
                    })
                    .map(|(other, _)| other.clone())
                    .collect();

                if !found_in.is_empty() {
                    report.category_mismatches.push(CategoryMismatch {
                        name: entry.name.clone(),
                        file: entry.file_name.clone(),
                        declared_in: category.to_string(),
                        found_in,
                    });
                }

                report.missing_files.push(MissingFile {
                    category: category.to_string(),
                    name: entry.name.clone(),
                    file: entry.file_name.clone(),
                    function: entry.function_name.clone(),
                    reason: MissingReason::FileAbsent,
                });
                continue;
            }

            // A name held by another category is a duplicate, not a missing file.
            let registered_elsewhere = registry
                .meta(&entry.name)
                .map(|meta| meta.category != category || meta.file != entry.file_name)
                .unwrap_or(false);

            if !registry.contains(category, &entry.name) && !registered_elsewhere {
                report.missing_files.push(MissingFile {
                    category: category.to_string(),
                    name: entry.name.clone(),
                    file: entry.file_name.clone(),
                    function: entry.function_name.clone(),
                    reason: MissingReason::Unresolved,
                });
            }
        }
    }

    for (category, files) in &live.categories {
        for file in files {
            let documented = declared
                .get(category.as_str())
                .map(|d| d.contains(file.as_str()))
                .unwrap_or(false);
            if !documented {
                report.undocumented.push(format!("{}/{}", category, file));
            }
        }
    }

    report.missing_files.sort_by(|a, b| {
        (a.category.as_str(), a.name.as_str()).cmp(&(b.category.as_str(), b.name.as_str()))
    });

    report
}
