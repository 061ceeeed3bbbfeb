//! Byte-oriented object storage.
//!
//! Everything the index and the optimizer persist or read goes through the
//! [`Storage`] trait: originals, metadata files, generated variants, the
//! cached index document and the progress counter. The trait is a thin CRUD
//! surface over a `/`-separated key namespace, shaped after S3-style object
//! stores rather than a filesystem: there are no directories, only keys that
//! share prefixes.
//!
//! # Not-found is not an error
//!
//! Reads of missing keys return `Ok(None)`, [`exists`](Storage::exists)
//! returns `Ok(false)`, and deleting a missing key is a no-op. Errors are
//! reserved for the store itself misbehaving (I/O, permissions, bad keys).
//!
//! # Permissions
//!
//! Some deployments hand out tokens that can read but not list, or write but
//! not delete. [`check_permission`](Storage::check_permission) answers that
//! question from configuration alone, without issuing a request against the
//! store.

mod local;
mod memory;
mod path;

pub use self::local::LocalStorage;
pub use self::memory::MemoryStorage;
pub use self::path::normalize as normalize_key;
pub use self::path::{file_name, is_under, join, normalize_prefix, parent};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Shared handle used by the index cache and the optimizer.
pub type StorageHandle = Arc<dyn Storage>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid storage path: {0:?}")]
    InvalidPath(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object is not valid UTF-8: {0}")]
    NotUtf8(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io {
                path: path.into(),
                source,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// One object returned by [`Storage::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Full normalized key.
    pub path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Capability that a caller may need before attempting an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
    Delete,
    List,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Read,
        Permission::Write,
        Permission::Delete,
        Permission::List,
    ];
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
            Permission::List => "list",
        };
        f.write_str(name)
    }
}

/// Answer from [`Storage::check_permission`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck {
    Granted,
    Denied { reason: String },
}

impl PermissionCheck {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionCheck::Granted)
    }
}

/// Content types used when persisting objects.
pub mod content_type {
    pub const JSON: &str = "application/json";
    pub const TEXT: &str = "text/plain; charset=utf-8";
    pub const WEBP: &str = "image/webp";
}

/// Unified interface over object stores.
///
/// All keys are normalized by the implementation (see
/// [`normalize_key`]); callers may pass keys with redundant separators.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Backend name, used for logging only.
    fn name(&self) -> &str;

    /// Read an object. `Ok(None)` if it does not exist.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Read an object as UTF-8 text. `Ok(None)` if it does not exist.
    async fn get_text(&self, path: &str) -> Result<Option<String>> {
        match self.get(path).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::NotUtf8(path.to_string())),
            None => Ok(None),
        }
    }

    /// Create or overwrite an object.
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Recursively list every object under `prefix`, sorted by key.
    ///
    /// The prefix matches on segment boundaries: `galleries/a` does not
    /// list `galleries/ab/…`. An empty prefix lists the whole store.
    async fn list(&self, prefix: &str) -> Result<Vec<StorageEntry>>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Move an object, overwriting the destination.
    ///
    /// Returns [`StorageError::NotFound`] if the source is missing.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Side-effect-free capability check, answered from backend configuration.
    fn check_permission(&self, permission: Permission) -> PermissionCheck;
}
