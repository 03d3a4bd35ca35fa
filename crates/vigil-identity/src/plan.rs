//! Patch plan: what a reconciliation run would do to downstream stores.

use serde::Serialize;
use uuid::Uuid;

use crate::key::CanonicalKey;
use crate::reconcile::{IdentityStatus, ProjectIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchAction {
    /// Register a newly discovered project under its minted id.
    Register,
    NoOp,
    /// Leave the record untouched pending human review.
    ConflictFreeze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

/// One planned action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityPatch {
    pub canonical_key: CanonicalKey,
    pub action: PatchAction,
    pub severity: Severity,
    pub id: Uuid,
    pub minted_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Ordered list of patches, one per reconciled project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchPlan {
    pub patches: Vec<IdentityPatch>,
}

impl PatchPlan {
    /// Whether anything would be registered.
    pub fn has_work(&self) -> bool {
        self.patches
            .iter()
            .any(|p| p.action == PatchAction::Register)
    }

    /// Whether any record is frozen, acknowledged or not.
    pub fn has_conflicts(&self) -> bool {
        self.patches
            .iter()
            .any(|p| p.action == PatchAction::ConflictFreeze)
    }

    /// Number of conflicts nobody has reviewed yet.
    pub fn critical(&self) -> usize {
        self.patches
            .iter()
            .filter(|p| p.severity == Severity::Critical)
            .count()
    }
}

/// Build the patch plan for a reconciled set.
pub fn plan(identities: &[ProjectIdentity]) -> PatchPlan {
    let patches = identities
        .iter()
        .map(|identity| {
            let (action, severity) = match identity.status {
                IdentityStatus::Discovered => (PatchAction::Register, Severity::Info),
                IdentityStatus::Converged => (PatchAction::NoOp, Severity::Info),
                IdentityStatus::ConflictFreeze if identity.acknowledged => {
                    (PatchAction::ConflictFreeze, Severity::Warn)
                }
                IdentityStatus::ConflictFreeze => (PatchAction::ConflictFreeze, Severity::Critical),
            };
            IdentityPatch {
                canonical_key: identity.canonical_key.clone(),
                action,
                severity,
                id: identity.id(),
                minted_id: identity.minted_id,
                detail: identity.conflict.clone(),
            }
        })
        .collect();

    PatchPlan { patches }
}
