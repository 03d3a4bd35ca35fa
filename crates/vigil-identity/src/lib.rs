//! Deterministic project identity for vigil.
//!
//! Projects are named by a [`CanonicalKey`] (`host:owner/repo`) and
//! identified by a UUIDv5 minted from that key under a fixed namespace.
//! [`reconcile`] merges three sources of identity (an inventory, the local
//! registry file and an optional database snapshot) into one record per
//! project and freezes every disagreement instead of resolving it.
//!
//! ```no_run
//! use std::path::Path;
//! use vigil_identity::{load_inventory, read_registry, reconcile, write_registry};
//!
//! # fn main() -> Result<(), vigil_identity::IdentityError> {
//! let inventory = load_inventory(Path::new("inventory.json"))?;
//! let registry = read_registry(Path::new("registry.json"))?.unwrap_or_default();
//!
//! let result = reconcile(&inventory.entries, &registry.projects, None)?;
//! println!("{} conflicts", result.summary.conflicts);
//!
//! write_registry(&result.identities, Path::new("registry.json"))?;
//! # Ok(())
//! # }
//! ```

mod adjudicate;
mod engine;
mod error;
mod key;
mod plan;
mod reconcile;
mod sources;
mod store;

pub use adjudicate::{adjudicate, Adjudication, Resolution};
pub use engine::{mint_id, IDENTITY_NAMESPACE};
pub use error::{IdentityError, IdentityResult};
pub use key::{CanonicalKey, GITHUB_HOST};
pub use plan::{plan, IdentityPatch, PatchAction, PatchPlan, Severity};
pub use reconcile::{
    reconcile, IdentityStatus, PriorId, ProjectIdentity, Reconciliation, ReconciliationSummary,
};
pub use sources::{
    load_database, load_inventory, parse_database, parse_inventory, Loaded, Source, SourceEntry,
    SourceFlags, SourceIssue,
};
pub use store::{
    lock_path, read_registry, save_registry, stage, write_registry, LockedRegistry, RegistryFile,
    RegistryRecord, StagedRegistry, WriteLock, REGISTRY_VERSION,
};
