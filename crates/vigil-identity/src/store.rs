//! The canonical registry file.
//!
//! The registry is the one file this crate writes. Writes go to a temporary
//! file in the target directory and are renamed over the old registry, so
//! an interrupted run leaves the previous registry in place. A sibling
//! `<file>.lock` keeps two writers off the same path.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{mint_id, IDENTITY_NAMESPACE};
use crate::error::{IdentityError, IdentityResult};
use crate::key::CanonicalKey;
use crate::reconcile::{IdentityStatus, ProjectIdentity};
use crate::sources::{Source, SourceFlags};

/// Version of the registry file format.
pub const REGISTRY_VERSION: u32 = 1;

const LOCK_SUFFIX: &str = ".lock";

/// One persisted project identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub canonical_key: CanonicalKey,

    /// Identifier of record.
    pub id: Uuid,

    /// Status at the time of the write.
    pub status: IdentityStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minted_id: Option<Uuid>,

    #[serde(default)]
    pub sources: SourceFlags,

    #[serde(default)]
    pub acknowledged: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RegistryRecord {
    pub fn new(canonical_key: CanonicalKey, id: Uuid, status: IdentityStatus) -> Self {
        let minted_id = Some(mint_id(&canonical_key));
        Self {
            canonical_key,
            id,
            status,
            minted_id,
            sources: SourceFlags::default(),
            acknowledged: false,
            name: None,
        }
    }

    fn from_identity(identity: &ProjectIdentity) -> Self {
        // A frozen record keeps the id the local registry already held; only
        // adjudication may replace it.
        let id = match identity.status {
            IdentityStatus::ConflictFreeze => identity
                .prior_id(Source::LocalRegistry)
                .unwrap_or_else(|| identity.id()),
            _ => identity.id(),
        };
        Self {
            canonical_key: identity.canonical_key.clone(),
            id,
            status: identity.status,
            minted_id: Some(identity.minted_id),
            sources: identity.sources,
            acknowledged: identity.acknowledged,
            name: identity.name.clone(),
        }
    }
}

/// Contents of the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    pub version: u32,

    /// Namespace the ids were minted under.
    pub namespace: Uuid,

    pub count: usize,

    /// Records sorted by canonical key.
    pub projects: Vec<RegistryRecord>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            namespace: IDENTITY_NAMESPACE,
            count: 0,
            projects: Vec::new(),
        }
    }
}

impl RegistryFile {
    /// Build the file contents for a reconciled set.
    pub fn from_identities(identities: &[ProjectIdentity]) -> Self {
        let mut file = Self {
            projects: identities.iter().map(RegistryRecord::from_identity).collect(),
            ..Self::default()
        };
        file.normalize();
        file
    }

    /// Sort records by key and refresh the count.
    pub fn normalize(&mut self) {
        self.projects
            .sort_by(|a, b| a.canonical_key.cmp(&b.canonical_key));
        self.count = self.projects.len();
    }

    pub fn get(&self, key: &CanonicalKey) -> Option<&RegistryRecord> {
        self.projects.iter().find(|r| &r.canonical_key == key)
    }

    pub fn get_mut(&mut self, key: &CanonicalKey) -> Option<&mut RegistryRecord> {
        self.projects.iter_mut().find(|r| &r.canonical_key == key)
    }

    /// Record currently holding `id`, if any.
    pub fn holder_of(&self, id: Uuid) -> Option<&RegistryRecord> {
        self.projects.iter().find(|r| r.id == id)
    }

    /// Serialized form: pretty JSON with a trailing newline.
    pub fn to_bytes(&self) -> IdentityResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Read a registry file. Returns `None` when the file does not exist.
pub fn read_registry(path: &Path) -> IdentityResult<Option<RegistryFile>> {
    if !path.exists() {
        debug!(path = %path.display(), "No registry file yet");
        return Ok(None);
    }

    let json = fs::read_to_string(path)?;
    let mut file: RegistryFile =
        serde_json::from_str(&json).map_err(|e| IdentityError::parse(path, e))?;

    let mut seen = std::collections::BTreeSet::new();
    for record in &file.projects {
        if !seen.insert(&record.canonical_key) {
            return Err(IdentityError::DuplicateRecord {
                path: path.to_path_buf(),
                key: record.canonical_key.clone(),
            });
        }
    }

    if file.namespace != IDENTITY_NAMESPACE {
        warn!(
            path = %path.display(),
            namespace = %file.namespace,
            "Registry was written under a different namespace; expect conflicts"
        );
    }
    if file.count != file.projects.len() {
        warn!(
            path = %path.display(),
            count = file.count,
            actual = file.projects.len(),
            "Registry count does not match its records"
        );
    }
    file.normalize();

    debug!(path = %path.display(), records = file.count, "Loaded registry");
    Ok(Some(file))
}

/// Write a reconciled set to `path` atomically.
pub fn write_registry(identities: &[ProjectIdentity], path: &Path) -> IdentityResult<RegistryFile> {
    let file = RegistryFile::from_identities(identities);
    save_registry(&file, path)?;
    Ok(file)
}

/// Write registry contents to `path` atomically.
pub fn save_registry(file: &RegistryFile, path: &Path) -> IdentityResult<()> {
    stage(file, path)?.commit()?;
    Ok(())
}

/// Write the contents to a temporary file next to `path` without
/// replacing it yet. The lock is held until the staged file is committed
/// or dropped; dropping it discards the temporary file.
pub fn stage(file: &RegistryFile, path: &Path) -> IdentityResult<StagedRegistry> {
    create_parent(path)?;
    let lock = WriteLock::acquire(path)?;
    stage_locked(file, path, lock)
}

fn create_parent(path: &Path) -> IdentityResult<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| IdentityError::write(&parent, e))?;
    Ok(parent)
}

fn stage_locked(file: &RegistryFile, path: &Path, lock: WriteLock) -> IdentityResult<StagedRegistry> {
    let parent = create_parent(path)?;

    let mut temp = NamedTempFile::new_in(&parent).map_err(|e| IdentityError::write(path, e))?;
    let bytes = file.to_bytes()?;
    temp.write_all(&bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| IdentityError::write(path, e))?;

    debug!(path = %path.display(), bytes = bytes.len(), "Staged registry");
    Ok(StagedRegistry {
        temp,
        target: path.to_path_buf(),
        count: file.count,
        lock,
    })
}

/// Registry contents written to disk but not yet renamed into place.
#[derive(Debug)]
pub struct StagedRegistry {
    temp: NamedTempFile,
    target: PathBuf,
    count: usize,
    lock: WriteLock,
}

impl StagedRegistry {
    /// Path of the temporary file.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Rename the staged file over the target.
    pub fn commit(self) -> IdentityResult<PathBuf> {
        let StagedRegistry {
            temp,
            target,
            count,
            lock,
        } = self;

        temp.persist(&target)
            .map_err(|e| IdentityError::write(&target, e.error))?;
        drop(lock);

        info!(path = %target.display(), records = count, "Wrote registry");
        Ok(target)
    }
}

/// A registry read under its write lock.
///
/// The lock is taken before the file is read and held until [`commit`]
/// replaces it, so a read-modify-write cycle cannot interleave with
/// another writer.
///
/// [`commit`]: LockedRegistry::commit
#[derive(Debug)]
pub struct LockedRegistry {
    path: PathBuf,
    lock: WriteLock,
    file: Option<RegistryFile>,
}

impl LockedRegistry {
    /// Lock `path`, then read it. Fails with `Locked` before reading when
    /// another writer holds the lock.
    pub fn open(path: &Path) -> IdentityResult<Self> {
        create_parent(path)?;
        let lock = WriteLock::acquire(path)?;
        let file = read_registry(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            lock,
            file,
        })
    }

    /// Contents at the time the lock was taken; `None` if there was no file.
    pub fn file(&self) -> Option<&RegistryFile> {
        self.file.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the registry with `file` and release the lock.
    pub fn commit(self, file: &RegistryFile) -> IdentityResult<PathBuf> {
        stage_locked(file, &self.path, self.lock)?.commit()
    }
}

/// Exclusive claim on a registry path, released on drop.
#[derive(Debug)]
pub struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    /// Claim `target` by creating `<target>.lock`.
    pub fn acquire(target: &Path) -> IdentityResult<Self> {
        let lock = lock_path(target);
        match OpenOptions::new().write(true).create_new(true).open(&lock) {
            Ok(mut handle) => {
                // Owner pid, for whoever finds a stale lock.
                let _ = writeln!(handle, "{}", std::process::id());
                Ok(Self { path: lock })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(IdentityError::Locked {
                path: target.to_path_buf(),
                lock,
            }),
            Err(e) => Err(IdentityError::write(lock, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release registry lock");
        }
    }
}

/// Lock file path for a registry path.
pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(LOCK_SUFFIX);
    target.with_file_name(name)
}
