//! Identity sources: the project inventory and the database snapshot.
//!
//! Both are reduced to [`SourceEntry`] values before reconciliation, so the
//! reconciler does not care whether they came from a file, an API or SQL.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{IdentityError, IdentityResult};
use crate::key::{CanonicalKey, GITHUB_HOST};

/// Where a piece of identity information came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Inventory,
    LocalRegistry,
    Database,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Inventory => write!(f, "inventory"),
            Source::LocalRegistry => write!(f, "local_registry"),
            Source::Database => write!(f, "database"),
        }
    }
}

/// Which sources mentioned a project.
///
/// Serialized as a sorted list such as `["inventory", "database"]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Source>", into = "Vec<Source>")]
pub struct SourceFlags {
    pub inventory: bool,
    pub local_registry: bool,
    pub database: bool,
}

impl SourceFlags {
    pub fn set(&mut self, source: Source) {
        match source {
            Source::Inventory => self.inventory = true,
            Source::LocalRegistry => self.local_registry = true,
            Source::Database => self.database = true,
        }
    }

    pub fn contains(&self, source: Source) -> bool {
        match source {
            Source::Inventory => self.inventory,
            Source::LocalRegistry => self.local_registry,
            Source::Database => self.database,
        }
    }

    pub fn to_vec(self) -> Vec<Source> {
        [Source::Inventory, Source::LocalRegistry, Source::Database]
            .into_iter()
            .filter(|s| self.contains(*s))
            .collect()
    }
}

impl From<Vec<Source>> for SourceFlags {
    fn from(sources: Vec<Source>) -> Self {
        let mut flags = Self::default();
        for source in sources {
            flags.set(source);
        }
        flags
    }
}

impl From<SourceFlags> for Vec<Source> {
    fn from(flags: SourceFlags) -> Self {
        flags.to_vec()
    }
}

/// One project as reported by the inventory or the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceEntry {
    pub key: CanonicalKey,

    /// Identifier this source already holds for the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SourceEntry {
    pub fn new(key: CanonicalKey) -> Self {
        Self {
            key,
            id: None,
            name: None,
            url: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A source row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceIssue {
    pub source: Source,
    pub index: usize,
    pub reason: String,
}

/// Entries read from one source, plus the rows that were skipped.
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub entries: Vec<SourceEntry>,
    pub issues: Vec<SourceIssue>,
}

/// Repository owner, either a plain login or an object carrying one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Owner {
    Login(String),
    Object { login: String },
}

impl Owner {
    fn login(&self) -> &str {
        match self {
            Owner::Login(login) => login,
            Owner::Object { login } => login,
        }
    }
}

/// A repository as listed by a GitHub inventory export.
#[derive(Debug, Clone, Deserialize)]
struct InventoryItem {
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    owner: Option<Owner>,
    /// Exports carry GitHub node ids (`R_kgDO...`) here; only UUIDs count.
    #[serde(default, deserialize_with = "lenient_uuid")]
    id: Option<Uuid>,
}

fn lenient_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => match Uuid::parse_str(&s) {
            Ok(id) => Some(id),
            Err(_) => {
                debug!(id = %s, "Ignoring non-UUID inventory id");
                None
            }
        },
        Some(serde_json::Value::Null) | None => None,
        Some(other) => {
            debug!(id = %other, "Ignoring non-UUID inventory id");
            None
        }
    })
}

impl InventoryItem {
    fn key(&self) -> IdentityResult<CanonicalKey> {
        if let Some(owner) = &self.owner {
            let host = match &self.url {
                Some(url) => CanonicalKey::from_url(url)
                    .map(|k| k.host().to_string())
                    .unwrap_or_else(|_| GITHUB_HOST.to_string()),
                None => GITHUB_HOST.to_string(),
            };
            return CanonicalKey::new(&host, owner.login(), &self.name);
        }

        match &self.url {
            Some(url) => {
                let from_url = CanonicalKey::from_url(url)?;
                CanonicalKey::new(from_url.host(), from_url.owner(), &self.name)
            }
            None => Err(IdentityError::invalid_key(
                &self.name,
                "inventory item has neither owner nor url",
            )),
        }
    }
}

/// A project row from a database snapshot.
#[derive(Debug, Clone, Deserialize)]
struct DatabaseRow {
    #[serde(default)]
    canonical_key: Option<String>,
    #[serde(default, alias = "github_url")]
    url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    id: Uuid,
}

impl DatabaseRow {
    fn key(&self) -> IdentityResult<CanonicalKey> {
        match (&self.canonical_key, &self.url) {
            (Some(key), _) => CanonicalKey::parse(key),
            (None, Some(url)) => CanonicalKey::from_url(url),
            (None, None) => Err(IdentityError::invalid_key(
                self.name.as_deref().unwrap_or(""),
                "database row has neither canonical_key nor url",
            )),
        }
    }
}

/// Read a JSON file holding either a list or an object wrapping one under
/// any of `wrappers`.
fn read_rows(path: &Path, wrappers: &[&str]) -> IdentityResult<Vec<serde_json::Value>> {
    let contents = fs::read_to_string(path)?;
    let value: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| IdentityError::parse(path, e))?;

    match value {
        serde_json::Value::Array(rows) => Ok(rows),
        serde_json::Value::Object(mut map) => {
            for wrapper in wrappers {
                if let Some(serde_json::Value::Array(rows)) = map.remove(*wrapper) {
                    return Ok(rows);
                }
            }
            Err(IdentityError::parse(
                path,
                serde::de::Error::custom(format!(
                    "expected a list or an object with one of: {}",
                    wrappers.join(", ")
                )),
            ))
        }
        _ => Err(IdentityError::parse(
            path,
            serde::de::Error::custom("expected a list of rows"),
        )),
    }
}

fn parse_rows<T, F>(rows: Vec<serde_json::Value>, source: Source, convert: F) -> Loaded
where
    T: serde::de::DeserializeOwned,
    F: Fn(T) -> IdentityResult<SourceEntry>,
{
    let mut loaded = Loaded::default();

    for (index, row) in rows.into_iter().enumerate() {
        let result = serde_json::from_value::<T>(row)
            .map_err(|e| e.to_string())
            .and_then(|item| convert(item).map_err(|e| e.to_string()));

        match result {
            Ok(entry) => loaded.entries.push(entry),
            Err(reason) => {
                warn!(%source, index, %reason, "Skipped source row");
                loaded.issues.push(SourceIssue {
                    source,
                    index,
                    reason,
                });
            }
        }
    }

    loaded
}

/// Parse inventory rows.
pub fn parse_inventory(rows: Vec<serde_json::Value>) -> Loaded {
    parse_rows(rows, Source::Inventory, |item: InventoryItem| {
        let key = item.key()?;
        Ok(SourceEntry {
            key,
            id: item.id,
            name: Some(item.name),
            url: item.url,
        })
    })
}

/// Parse database snapshot rows.
pub fn parse_database(rows: Vec<serde_json::Value>) -> Loaded {
    parse_rows(rows, Source::Database, |row: DatabaseRow| {
        let key = row.key()?;
        Ok(SourceEntry {
            key,
            id: Some(row.id),
            name: row.name,
            url: row.url,
        })
    })
}

/// Load a repository inventory export.
///
/// Accepts a JSON list or an object with `repos` or `items`.
pub fn load_inventory(path: &Path) -> IdentityResult<Loaded> {
    let loaded = parse_inventory(read_rows(path, &["repos", "items"])?);
    debug!(
        path = %path.display(),
        entries = loaded.entries.len(),
        skipped = loaded.issues.len(),
        "Loaded inventory"
    );
    Ok(loaded)
}

/// Load a database snapshot.
///
/// Accepts a JSON list or an object with `projects` or `items`.
pub fn load_database(path: &Path) -> IdentityResult<Loaded> {
    let loaded = parse_database(read_rows(path, &["projects", "items"])?);
    debug!(
        path = %path.display(),
        entries = loaded.entries.len(),
        skipped = loaded.issues.len(),
        "Loaded database snapshot"
    );
    Ok(loaded)
}
