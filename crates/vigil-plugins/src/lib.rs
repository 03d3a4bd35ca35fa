//! Vigil scanner plugins.
//!
//! Scanners are plain functions registered in a [`ScannerCatalog`]. Which
//! of them are active is declared by per-category `SCANNER_MANIFEST.yaml`
//! files under a scanners root:
//!
//! ```text
//! scanners/
//! ├── structure/
//! │   ├── SCANNER_MANIFEST.yaml
//! │   ├── docs.rs
//! │   └── deps.rs
//! └── library/
//!     ├── SCANNER_MANIFEST.yaml
//!     └── empty_folders.rs
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vigil_plugins::{discover, ScannerCatalog, BUILTIN_SCANNERS_ROOT};
//!
//! # fn main() -> anyhow::Result<()> {
//! let discovery = discover(Path::new(BUILTIN_SCANNERS_ROOT), &ScannerCatalog::builtin())?;
//! if let Some(scan) = discovery.registry.get("docs") {
//!     let output = scan(Path::new("."))?;
//!     println!("{} findings", output.count);
//! }
//! # Ok(())
//! # }
//! ```

mod catalog;
mod drift;
mod error;
mod introspect;
mod manifest;
mod registry;
pub mod scanners;

pub use catalog::{CatalogKey, ScanFn, ScanOutput, ScannerCatalog};
pub use drift::{
    compute_drift, scan_live, CategoryMismatch, DriftReport, LiveScan, MissingFile, MissingReason,
};
pub use error::{PluginError, PluginResult};
pub use introspect::{discover, CategorySummary, Discovery, IntrospectionReport, ManifestError};
pub use manifest::{
    discover_manifests, load_category_manifest, parse_category_manifest, CategoryManifest,
    EntryIssue, ManifestFailure, ManifestSet, ScannerManifestEntry, MANIFEST_FILE,
};
pub use registry::{build_registry, LoadIssue, LoadIssueKind, PluginRegistry, ScannerMeta};
pub use scanners::BUILTIN_SCANNERS_ROOT;
