//! Explicit administrative resolution of frozen identities.
//!
//! Reconciliation never changes a stored identifier. This is the only code
//! path that does, and only for one named record at a time.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::mint_id;
use crate::error::{IdentityError, IdentityResult};
use crate::key::CanonicalKey;
use crate::reconcile::IdentityStatus;
use crate::store::RegistryFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Replace the stored id with the minted one.
    AcceptMinted,
    /// Keep the stored id and mark the conflict as reviewed.
    Acknowledge,
}

/// What an adjudication changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjudication {
    pub canonical_key: CanonicalKey,
    pub resolution: Resolution,
    pub previous_id: Uuid,
    pub id: Uuid,
    pub status: IdentityStatus,
}

/// Resolve one `CONFLICT_FREEZE` record in a loaded registry.
///
/// The registry is modified in memory only; persisting it is up to the
/// caller. A database that still holds the old id will freeze the record
/// again on the next reconciliation.
pub fn adjudicate(
    registry: &mut RegistryFile,
    key: &CanonicalKey,
    resolution: Resolution,
) -> IdentityResult<Adjudication> {
    let minted = mint_id(key);

    if resolution == Resolution::AcceptMinted {
        if let Some(holder) = registry.holder_of(minted) {
            if &holder.canonical_key != key {
                return Err(IdentityError::IdInUse {
                    id: minted,
                    holder: holder.canonical_key.clone(),
                });
            }
        }
    }

    let record = registry
        .get_mut(key)
        .ok_or_else(|| IdentityError::UnknownKey(key.clone()))?;
    if record.status != IdentityStatus::ConflictFreeze {
        return Err(IdentityError::NotFrozen(key.clone()));
    }

    let previous_id = record.id;
    match resolution {
        Resolution::AcceptMinted => {
            record.id = minted;
            record.status = IdentityStatus::Converged;
            record.acknowledged = false;
        }
        Resolution::Acknowledge => {
            record.acknowledged = true;
        }
    }
    record.minted_id = Some(minted);

    let outcome = Adjudication {
        canonical_key: key.clone(),
        resolution,
        previous_id,
        id: record.id,
        status: record.status,
    };
    registry.normalize();

    info!(
        key = %key,
        previous = %previous_id,
        id = %outcome.id,
        ?resolution,
        "Adjudicated identity conflict"
    );
    Ok(outcome)
}
