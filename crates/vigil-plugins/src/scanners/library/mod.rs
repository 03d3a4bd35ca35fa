//! Content organisation checks.

use crate::catalog::ScannerCatalog;

pub mod empty_folders;

pub const CATEGORY: &str = "library";

pub fn register(catalog: &mut ScannerCatalog) {
    catalog.register(CATEGORY, "empty_folders", "scan", empty_folders::scan);
}
