//! Category manifest loading.
//!
//! Every category directory under the scanners root may hold a
//! `SCANNER_MANIFEST.yaml` declaring the scanners it provides:
//!
//! ```yaml
//! category: structure
//! description: Filesystem layout checks
//! scanners:
//!   - name: docs
//!     file: docs.rs
//!     function: scan
//!     description: Core documentation presence
//! ```
//!
//! A manifest with broken YAML fails as a whole. A single entry missing
//! `name`, `file` or `function` is rejected and recorded, and its siblings
//! still load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PluginError, PluginResult};

/// File name of a category manifest.
pub const MANIFEST_FILE: &str = "SCANNER_MANIFEST.yaml";

/// One scanner declared by a category manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerManifestEntry {
    /// Registry name of the scanner.
    pub name: String,

    /// File holding the scanner, relative to the category directory.
    #[serde(rename = "file")]
    pub file_name: String,

    /// Function implementing the scanner inside that file.
    #[serde(rename = "function")]
    pub function_name: String,

    /// Human readable description.
    #[serde(default)]
    pub description: String,
}

impl ScannerManifestEntry {
    /// Module name of the backing file (file name without extension).
    pub fn module(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}

/// An entry rejected while loading a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryIssue {
    /// Position of the entry in the manifest's scanner list.
    pub index: usize,

    /// Entry name, if it had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Why the entry was rejected.
    pub reason: String,
}

/// Scanners declared for a single category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryManifest {
    pub category: String,
    pub description: String,
    pub entries: Vec<ScannerManifestEntry>,

    /// Entries that could not be loaded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<EntryIssue>,

    /// Where the manifest was read from.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    category: Option<String>,
    description: Option<String>,
    #[serde(default, alias = "entries")]
    scanners: Vec<serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntry {
    name: Option<String>,
    file: Option<String>,
    function: Option<String>,
    description: Option<String>,
}

impl RawEntry {
    fn into_entry(self, index: usize) -> Result<ScannerManifestEntry, EntryIssue> {
        let mut missing = Vec::new();
        if is_blank(&self.name) {
            missing.push("name");
        }
        if is_blank(&self.file) {
            missing.push("file");
        }
        if is_blank(&self.function) {
            missing.push("function");
        }

        match (self.name, self.file, self.function) {
            (Some(name), Some(file), Some(function)) if missing.is_empty() => {
                Ok(ScannerManifestEntry {
                    name: name.trim().to_string(),
                    file_name: file.trim().to_string(),
                    function_name: function.trim().to_string(),
                    description: self.description.unwrap_or_default(),
                })
            }
            (name, _, _) => Err(EntryIssue {
                index,
                name: name.filter(|n| !n.trim().is_empty()),
                reason: format!("missing required field(s): {}", missing.join(", ")),
            }),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Load a single category manifest.
///
/// The category falls back to the name of the directory holding the
/// manifest when the file does not declare one.
pub fn load_category_manifest(path: &Path) -> PluginResult<CategoryManifest> {
    let contents = fs::read_to_string(path)?;
    parse_category_manifest(&contents, path)
}

/// Parse manifest text. `path` is used for the category fallback and for
/// error reporting only.
pub fn parse_category_manifest(contents: &str, path: &Path) -> PluginResult<CategoryManifest> {
    let raw: RawManifest =
        serde_yaml::from_str(contents).map_err(|e| PluginError::manifest(path, e))?;

    let category = raw
        .category
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.trim().to_string())
        .or_else(|| {
            path.parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(str::to_string)
        })
        .ok_or_else(|| PluginError::MissingCategory {
            path: path.to_path_buf(),
        })?;

    let mut entries = Vec::with_capacity(raw.scanners.len());
    let mut issues = Vec::new();

    for (index, value) in raw.scanners.into_iter().enumerate() {
        let parsed = serde_yaml::from_value::<RawEntry>(value)
            .map_err(|e| EntryIssue {
                index,
                name: None,
                reason: format!("entry is not a mapping of strings: {}", e),
            })
            .and_then(|raw| raw.into_entry(index));

        match parsed {
            Ok(entry) => entries.push(entry),
            Err(issue) => {
                warn!(
                    manifest = %path.display(),
                    index,
                    reason = %issue.reason,
                    "Rejected manifest entry"
                );
                issues.push(issue);
            }
        }
    }

    debug!(
        manifest = %path.display(),
        category = %category,
        entries = entries.len(),
        rejected = issues.len(),
        "Loaded category manifest"
    );

    Ok(CategoryManifest {
        category,
        description: raw.description.unwrap_or_default(),
        entries,
        issues,
        path: path.to_path_buf(),
    })
}

/// A manifest that failed to load during discovery.
#[derive(Debug)]
pub struct ManifestFailure {
    pub path: PathBuf,
    pub error: PluginError,
}

/// Result of discovering every manifest below a scanners root.
#[derive(Debug, Default)]
pub struct ManifestSet {
    /// Loaded manifests, sorted by category.
    pub manifests: Vec<CategoryManifest>,

    /// Manifests that could not be loaded at all.
    pub failures: Vec<ManifestFailure>,
}

/// List category directories under `root`, sorted by name.
///
/// Hidden and `_`-prefixed directories are skipped.
pub fn category_dirs(root: &Path) -> PluginResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PluginError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| !n.starts_with('.') && !n.starts_with('_'))
                .unwrap_or(false)
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Load every category manifest found below `root`.
///
/// A broken manifest is recorded in [`ManifestSet::failures`] and does not
/// stop discovery of the others.
pub fn discover_manifests(root: &Path) -> PluginResult<ManifestSet> {
    let mut set = ManifestSet::default();

    for dir in category_dirs(root)? {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            continue;
        }

        match load_category_manifest(&manifest_path) {
            Ok(manifest) => set.manifests.push(manifest),
            Err(error) => {
                warn!(path = %manifest_path.display(), %error, "Failed to load manifest");
                set.failures.push(ManifestFailure {
                    path: manifest_path,
                    error,
                });
            }
        }
    }

    set.manifests.sort_by(|a, b| a.category.cmp(&b.category));
    Ok(set)
}
