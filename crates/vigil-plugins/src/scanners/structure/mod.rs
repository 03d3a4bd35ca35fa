//! Checks on a project's top-level layout.

use crate::catalog::ScannerCatalog;

pub mod deps;
pub mod docs;

pub const CATEGORY: &str = "structure";

pub fn register(catalog: &mut ScannerCatalog) {
    catalog.register(CATEGORY, "docs", "scan", docs::scan);
    catalog.register(CATEGORY, "deps", "scan", deps::scan);
}
