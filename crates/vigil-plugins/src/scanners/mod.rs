//! Scanners shipped with vigil.
//!
//! Each category directory holds the scanner sources and a
//! `SCANNER_MANIFEST.yaml` describing them; the directory doubles as the
//! default scanners root so `vigil introspect` can check itself.

use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use crate::catalog::ScannerCatalog;

pub mod library;
pub mod structure;

/// Scanners root of the built-in scanners, as laid out in the source tree.
pub const BUILTIN_SCANNERS_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/scanners");

/// Register every built-in scanner.
pub fn register_builtin(catalog: &mut ScannerCatalog) {
    structure::register(catalog);
    library::register(catalog);
}

/// Walk `target`, skipping hidden entries and build/vendor directories.
pub(crate) fn walk(target: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(target)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || (!is_hidden(e) && !is_blacklisted(e)))
        .filter_map(|e| e.ok())
}

/// Path of `entry` relative to `target`, with `/` separators.
pub(crate) fn relative(target: &Path, path: &Path) -> String {
    path.strip_prefix(target)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_blacklisted(entry: &DirEntry) -> bool {
    const BLACKLIST: &[&str] = &[
        "node_modules",
        "target",
        "dist",
        "build",
        "__pycache__",
        "venv",
        "vendor",
        "coverage",
    ];

    entry
        .file_name()
        .to_str()
        .map(|s| BLACKLIST.contains(&s))
        .unwrap_or(false)
}
