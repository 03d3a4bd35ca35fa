//! Scanner callables and the table they are registered in.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Structured result returned by every scanner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanOutput {
    /// Number of findings.
    pub count: usize,

    /// Findings, one JSON value each.
    pub items: Vec<serde_json::Value>,
}

impl ScanOutput {
    /// Build an output from a list of items, deriving the count.
    pub fn from_items(items: Vec<serde_json::Value>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// The plugin contract: scan a filesystem target and report findings.
///
/// Errors raised by a scanner belong to the caller; the registry only
/// resolves callables.
pub type ScanFn = fn(&Path) -> anyhow::Result<ScanOutput>;

/// Key of a registered scanner function: category, module, function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CatalogKey {
    pub category: String,
    pub module: String,
    pub function: String,
}

impl CatalogKey {
    pub fn new(
        category: impl Into<String>,
        module: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            module: module.into(),
            function: function.into(),
        }
    }
}

impl std::fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}::{}", self.category, self.module, self.function)
    }
}

/// Table of scanner functions compiled into the binary.
///
/// Scanners are added with explicit [`ScannerCatalog::register`] calls at
/// startup. Manifests then select from this table by
/// `(category, module, function)`.
#[derive(Clone, Default)]
pub struct ScannerCatalog {
    functions: BTreeMap<CatalogKey, ScanFn>,
}

impl std::fmt::Debug for ScannerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

impl ScannerCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding every scanner shipped with vigil.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        crate::scanners::register_builtin(&mut catalog);
        catalog
    }

    /// Register a function. Returns the previously registered function for
    /// the same key, if any.
    pub fn register(
        &mut self,
        category: &str,
        module: &str,
        function: &str,
        scan: ScanFn,
    ) -> Option<ScanFn> {
        self.functions
            .insert(CatalogKey::new(category, module, function), scan)
    }

    /// Look up a function.
    pub fn resolve(&self, category: &str, module: &str, function: &str) -> Option<ScanFn> {
        self.functions
            .get(&CatalogKey::new(category, module, function))
            .copied()
    }

    /// Whether any function is registered for the module.
    pub fn has_module(&self, category: &str, module: &str) -> bool {
        self.functions
            .keys()
            .any(|k| k.category == category && k.module == module)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &CatalogKey> {
        self.functions.keys()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
