//! Error types for identity reconciliation.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::key::CanonicalKey;

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors that abort an identity operation.
///
/// Identity conflicts are not errors: they are a reconciliation outcome
/// (`CONFLICT_FREEZE`) and show up in the results.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A string could not be normalized into a canonical key.
    #[error("Invalid canonical key '{input}': {reason}")]
    InvalidKey { input: String, reason: String },

    /// Two different canonical keys minted the same identifier.
    #[error("Integrity violation: {first} and {second} both mint {id}; manual intervention required")]
    Integrity {
        id: Uuid,
        first: CanonicalKey,
        second: CanonicalKey,
    },

    /// The registry file lists the same key twice.
    #[error("Registry {path} contains {key} more than once")]
    DuplicateRecord { path: PathBuf, key: CanonicalKey },

    /// Another writer holds the registry lock.
    #[error("Registry {path} is locked by another writer (remove {lock} if stale)")]
    Locked { path: PathBuf, lock: PathBuf },

    /// Writing or renaming the registry failed; the previous file is intact.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file is not valid JSON or has the wrong shape.
    #[error("Malformed {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Adjudication target is not in the registry.
    #[error("No registry record for {0}")]
    UnknownKey(CanonicalKey),

    /// Adjudication target is not frozen.
    #[error("{0} is not in CONFLICT_FREEZE; nothing to adjudicate")]
    NotFrozen(CanonicalKey),

    /// Adjudication would give an id to a second key.
    #[error("Identifier {id} is already held by {holder}")]
    IdInUse { id: Uuid, holder: CanonicalKey },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IdentityError {
    pub(crate) fn invalid_key(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}
