//! Registry reconciliation.
//!
//! Every canonical key mentioned by the inventory, the local registry or the
//! database is classified once per run:
//!
//! - `DISCOVERED`: no source holds an identifier yet; the minted id is used.
//! - `CONVERGED`: the authoritative prior id equals the minted id.
//! - `CONFLICT_FREEZE`: the prior ids disagree with the minted id or with
//!   each other. The authoritative prior id is kept as is.
//!
//! Authority order for prior ids is database, then local registry, then
//! inventory. Conflicts are never resolved here; see [`crate::adjudicate`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::mint_id;
use crate::error::{IdentityError, IdentityResult};
use crate::key::CanonicalKey;
use crate::sources::{Source, SourceEntry, SourceFlags};
use crate::store::RegistryRecord;

/// Outcome of reconciling one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityStatus {
    Converged,
    Discovered,
    ConflictFreeze,
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityStatus::Converged => write!(f, "CONVERGED"),
            IdentityStatus::Discovered => write!(f, "DISCOVERED"),
            IdentityStatus::ConflictFreeze => write!(f, "CONFLICT_FREEZE"),
        }
    }
}

/// An identifier some source already holds for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorId {
    pub source: Source,
    pub id: Uuid,
}

/// Reconciled identity of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectIdentity {
    pub canonical_key: CanonicalKey,

    /// Identifier derived from the canonical key.
    pub minted_id: Uuid,

    pub status: IdentityStatus,

    /// Identifier of record: the authoritative prior id, or the minted id
    /// for a newly discovered project.
    pub existing_id: Uuid,

    /// Sources that mentioned the project.
    pub sources: SourceFlags,

    /// Every prior id seen, in authority order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prior_ids: Vec<PriorId>,

    /// Explanation for a frozen record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<String>,

    /// A frozen record an administrator has reviewed and left frozen.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub acknowledged: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProjectIdentity {
    pub fn is_conflict(&self) -> bool {
        self.status == IdentityStatus::ConflictFreeze
    }

    /// Identifier to persist for this project.
    pub fn id(&self) -> Uuid {
        self.existing_id
    }

    /// Prior id held by `source`, if it mentioned one.
    pub fn prior_id(&self, source: Source) -> Option<Uuid> {
        self.prior_ids
            .iter()
            .find(|p| p.source == source)
            .map(|p| p.id)
    }
}

/// Counts describing a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    pub converged: usize,
    pub discovered: usize,
    pub conflicts: usize,
    /// Conflicts an administrator has acknowledged.
    pub acknowledged: usize,
    /// Conflicts where the prior sources disagree with each other.
    pub divergent_sources: usize,
    pub from_inventory: usize,
    pub from_local_registry: usize,
    pub from_database: usize,
    /// Repeated keys within a single source (first occurrence wins).
    pub duplicates: usize,
    /// Source rows skipped before reconciliation; filled in by the caller.
    pub source_issues: usize,
}

/// Result of a reconciliation run, sorted by canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub identities: Vec<ProjectIdentity>,
    pub summary: ReconciliationSummary,
}

impl Reconciliation {
    /// Identities in `CONFLICT_FREEZE`.
    pub fn conflicts(&self) -> impl Iterator<Item = &ProjectIdentity> {
        self.identities.iter().filter(|i| i.is_conflict())
    }

    /// Look up the identity for a key.
    pub fn get(&self, key: &CanonicalKey) -> Option<&ProjectIdentity> {
        self.identities
            .binary_search_by(|i| i.canonical_key.cmp(key))
            .ok()
            .map(|idx| &self.identities[idx])
    }
}

#[derive(Default)]
struct Group<'a> {
    sources: SourceFlags,
    inventory: Option<&'a SourceEntry>,
    registry: Option<&'a RegistryRecord>,
    database: Vec<&'a SourceEntry>,
}

/// Reconcile the three identity sources.
///
/// `database` is `None` when no database snapshot is available, which is
/// different from an empty snapshot only in the log output.
pub fn reconcile(
    inventory: &[SourceEntry],
    existing: &[RegistryRecord],
    database: Option<&[SourceEntry]>,
) -> IdentityResult<Reconciliation> {
    reconcile_with(inventory, existing, database, mint_id)
}

pub(crate) fn reconcile_with<F>(
    inventory: &[SourceEntry],
    existing: &[RegistryRecord],
    database: Option<&[SourceEntry]>,
    mint: F,
) -> IdentityResult<Reconciliation>
where
    F: Fn(&CanonicalKey) -> Uuid,
{
    let mut groups: BTreeMap<&CanonicalKey, Group<'_>> = BTreeMap::new();
    let mut summary = ReconciliationSummary::default();

    for entry in inventory {
        let group = groups.entry(&entry.key).or_default();
        if group.inventory.is_some() {
            debug!(key = %entry.key, "Duplicate inventory entry skipped");
            summary.duplicates += 1;
            continue;
        }
        group.sources.set(Source::Inventory);
        group.inventory = Some(entry);
    }

    for record in existing {
        let group = groups.entry(&record.canonical_key).or_default();
        if group.registry.is_some() {
            summary.duplicates += 1;
            continue;
        }
        group.sources.set(Source::LocalRegistry);
        group.registry = Some(record);
    }

    match database {
        Some(rows) => {
            for row in rows {
                let group = groups.entry(&row.key).or_default();
                if !group.database.is_empty() {
                    summary.duplicates += 1;
                }
                group.sources.set(Source::Database);
                group.database.push(row);
            }
        }
        None => debug!("No database snapshot; reconciling against inventory and registry only"),
    }

    let mut minted_by: BTreeMap<Uuid, &CanonicalKey> = BTreeMap::new();
    let mut identities = Vec::with_capacity(groups.len());

    for (key, group) in groups {
        let minted_id = mint(key);
        if let Some(first) = minted_by.insert(minted_id, key) {
            return Err(IdentityError::Integrity {
                id: minted_id,
                first: first.clone(),
                second: key.clone(),
            });
        }

        let identity = classify(key, minted_id, &group);
        match identity.status {
            IdentityStatus::Converged => summary.converged += 1,
            IdentityStatus::Discovered => summary.discovered += 1,
            IdentityStatus::ConflictFreeze => {
                summary.conflicts += 1;
                if identity.acknowledged {
                    summary.acknowledged += 1;
                }
                if identity.prior_ids.iter().any(|p| p.id != identity.existing_id) {
                    summary.divergent_sources += 1;
                }
                warn!(
                    key = %identity.canonical_key,
                    existing = %identity.existing_id,
                    minted = %identity.minted_id,
                    "Identity conflict frozen"
                );
            }
        }
        if group.sources.inventory {
            summary.from_inventory += 1;
        }
        if group.sources.local_registry {
            summary.from_local_registry += 1;
        }
        if group.sources.database {
            summary.from_database += 1;
        }

        identities.push(identity);
    }

    summary.total = identities.len();
    info!(
        total = summary.total,
        converged = summary.converged,
        discovered = summary.discovered,
        conflicts = summary.conflicts,
        "Reconciliation complete"
    );

    Ok(Reconciliation {
        identities,
        summary,
    })
}

fn classify(key: &CanonicalKey, minted_id: Uuid, group: &Group<'_>) -> ProjectIdentity {
    let mut prior_ids = Vec::new();
    for row in &group.database {
        if let Some(id) = row.id {
            push_prior(&mut prior_ids, Source::Database, id);
        }
    }
    if let Some(record) = group.registry {
        push_prior(&mut prior_ids, Source::LocalRegistry, record.id);
    }
    if let Some(id) = group.inventory.and_then(|e| e.id) {
        push_prior(&mut prior_ids, Source::Inventory, id);
    }

    let (status, existing_id, conflict) = match prior_ids.first().copied() {
        None => (IdentityStatus::Discovered, minted_id, None),
        Some(authority) => {
            if let Some(other) = prior_ids.iter().find(|p| p.id != authority.id) {
                let detail = format!(
                    "{} holds {} but {} holds {}; minted {}",
                    authority.source, authority.id, other.source, other.id, minted_id
                );
                (IdentityStatus::ConflictFreeze, authority.id, Some(detail))
            } else if authority.id == minted_id {
                (IdentityStatus::Converged, authority.id, None)
            } else {
                let detail = format!(
                    "{} holds {}, minted {}",
                    authority.source, authority.id, minted_id
                );
                (IdentityStatus::ConflictFreeze, authority.id, Some(detail))
            }
        }
    };

    let acknowledged = status == IdentityStatus::ConflictFreeze
        && group
            .registry
            .map(|r| r.acknowledged)
            .unwrap_or(false);

    let name = group
        .inventory
        .and_then(|e| e.name.clone())
        .or_else(|| group.database.iter().find_map(|e| e.name.clone()))
        .or_else(|| group.registry.and_then(|r| r.name.clone()));
    let url = group
        .inventory
        .and_then(|e| e.url.clone())
        .or_else(|| group.database.iter().find_map(|e| e.url.clone()));

    ProjectIdentity {
        canonical_key: key.clone(),
        minted_id,
        status,
        existing_id,
        sources: group.sources,
        prior_ids,
        conflict,
        acknowledged,
        name,
        url,
    }
}

fn push_prior(priors: &mut Vec<PriorId>, source: Source, id: Uuid) {
    if !priors.iter().any(|p| p.source == source && p.id == id) {
        priors.push(PriorId { source, id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CanonicalKey {
        CanonicalKey::parse(s).unwrap()
    }

    fn record(k: &str, id: Uuid) -> RegistryRecord {
        RegistryRecord::new(key(k), id, IdentityStatus::Converged)
    }

    #[test]
    fn test_discovered_from_inventory_only() {
        let inventory = vec![SourceEntry::new(key("github:acme/new")).with_name("new")];
        let result = reconcile(&inventory, &[], None).unwrap();

        let identity = &result.identities[0];
        assert_eq!(identity.status, IdentityStatus::Discovered);
        assert_eq!(identity.existing_id, identity.minted_id);
        assert_eq!(identity.minted_id, mint_id(&key("github:acme/new")));
        assert!(identity.sources.inventory);
        assert!(!identity.sources.local_registry);
        assert_eq!(identity.name.as_deref(), Some("new"));
        assert_eq!(result.summary.discovered, 1);
    }

    #[test]
    fn test_converged_when_stored_id_matches() {
        let k = key("github:acme/widget");
        let existing = vec![record("github:acme/widget", mint_id(&k))];
        let inventory = vec![SourceEntry::new(k.clone())];

        let result = reconcile(&inventory, &existing, None).unwrap();
        assert_eq!(result.identities[0].status, IdentityStatus::Converged);
        assert_eq!(result.summary.converged, 1);
        assert!(result.identities[0].sources.inventory);
        assert!(result.identities[0].sources.local_registry);
    }

    #[test]
    fn test_conflict_preserves_existing_id() {
        let a = Uuid::from_u128(0xA);
        let existing = vec![record("github:acme/widget", a)];
        let inventory = vec![SourceEntry::new(key("github:acme/widget"))];

        let result = reconcile(&inventory, &existing, None).unwrap();
        let identity = &result.identities[0];

        assert_eq!(identity.status, IdentityStatus::ConflictFreeze);
        assert_eq!(identity.existing_id, a);
        assert_eq!(identity.minted_id, mint_id(&key("github:acme/widget")));
        assert_ne!(identity.minted_id, a);
        assert!(identity.conflict.as_deref().unwrap().contains("local_registry"));
        assert_eq!(result.summary.conflicts, 1);
    }

    #[test]
    fn test_database_outranks_local_registry() {
        let k = key("github:acme/widget");
        let minted = mint_id(&k);
        let stale = Uuid::from_u128(1);

        // Registry agrees with the minted id, the database does not.
        let existing = vec![record("github:acme/widget", minted)];
        let database = vec![SourceEntry::new(k.clone()).with_id(stale)];

        let result = reconcile(&[], &existing, Some(&database)).unwrap();
        let identity = &result.identities[0];
        assert_eq!(identity.status, IdentityStatus::ConflictFreeze);
        assert_eq!(identity.existing_id, stale);
        assert_eq!(identity.prior_ids[0].source, Source::Database);
        assert_eq!(identity.prior_ids[1].source, Source::LocalRegistry);
        assert_eq!(result.summary.divergent_sources, 1);
    }

    #[test]
    fn test_database_converges_with_registry() {
        let k = key("github:acme/widget");
        let minted = mint_id(&k);
        let existing = vec![record("github:acme/widget", minted)];
        let database = vec![SourceEntry::new(k.clone()).with_id(minted)];

        let result = reconcile(&[], &existing, Some(&database)).unwrap();
        assert_eq!(result.identities[0].status, IdentityStatus::Converged);
        assert!(result.identities[0].sources.database);
    }

    #[test]
    fn test_output_sorted_and_idempotent() {
        let inventory = vec![
            SourceEntry::new(key("github:zeta/z")),
            SourceEntry::new(key("github:alpha/a")),
            SourceEntry::new(key("github:mid/m")),
        ];
        let existing = vec![record("github:beta/b", Uuid::from_u128(3))];

        let first = reconcile(&inventory, &existing, None).unwrap();
        let second = reconcile(&inventory, &existing, None).unwrap();

        let keys: Vec<_> = first
            .identities
            .iter()
            .map(|i| i.canonical_key.as_str())
            .collect();
        assert_eq!(
            keys,
            vec!["github:alpha/a", "github:beta/b", "github:mid/m", "github:zeta/z"]
        );
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert!(first.get(&key("github:mid/m")).is_some());
    }

    #[test]
    fn test_inventory_duplicates_first_wins() {
        let inventory = vec![
            SourceEntry::new(key("github:acme/w")).with_name("first"),
            SourceEntry::new(key("github:ACME/W")).with_name("second"),
        ];
        let result = reconcile(&inventory, &[], None).unwrap();
        assert_eq!(result.identities.len(), 1);
        assert_eq!(result.identities[0].name.as_deref(), Some("first"));
        assert_eq!(result.summary.duplicates, 1);
    }

    #[test]
    fn test_mint_collision_is_fatal() {
        let inventory = vec![
            SourceEntry::new(key("github:acme/one")),
            SourceEntry::new(key("github:acme/two")),
        ];
        let result = reconcile_with(&inventory, &[], None, |_| Uuid::from_u128(42));
        match result {
            Err(IdentityError::Integrity { id, first, second }) => {
                assert_eq!(id, Uuid::from_u128(42));
                assert_eq!(first.as_str(), "github:acme/one");
                assert_eq!(second.as_str(), "github:acme/two");
            }
            other => panic!("Expected integrity error, got {:?}", other),
        }
    }

    #[test]
    fn test_every_record_frozen_still_completes() {
        let existing = vec![
            record("github:acme/a", Uuid::from_u128(1)),
            record("github:acme/b", Uuid::from_u128(2)),
        ];
        let result = reconcile(&[], &existing, None).unwrap();
        assert_eq!(result.summary.conflicts, 2);
        assert_eq!(result.conflicts().count(), 2);
    }

    #[test]
    fn test_acknowledged_conflict_is_carried_forward() {
        let mut rec = record("github:acme/a", Uuid::from_u128(1));
        rec.status = IdentityStatus::ConflictFreeze;
        rec.acknowledged = true;

        let result = reconcile(&[], &[rec], None).unwrap();
        assert!(result.identities[0].acknowledged);
        assert_eq!(result.summary.acknowledged, 1);
    }
}
