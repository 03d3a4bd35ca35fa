//! Error types for plugin discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for plugin discovery.
pub type PluginResult<T> = Result<T, PluginError>;

/// Fatal errors for a single manifest or scan root.
///
/// Problems with individual manifest entries or plugins are not errors;
/// they are collected as [`crate::LoadIssue`] values next to the results.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The scanners root directory does not exist.
    #[error("No scanners root found at {path}")]
    RootNotFound { path: PathBuf },

    /// The manifest file has malformed YAML syntax or shape.
    #[error("Malformed manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Neither the manifest nor its directory name provide a category.
    #[error("Manifest {path} declares no category")]
    MissingCategory { path: PathBuf },

    /// IO error while reading manifests or walking directories.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while walking a directory tree.
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl PluginError {
    /// Create a malformed-manifest error.
    pub fn manifest(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Manifest {
            path: path.into(),
            source,
        }
    }
}
