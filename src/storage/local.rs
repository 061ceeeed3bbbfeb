//! Filesystem-backed storage.
//!
//! Keys map onto paths under a root directory. Object reads and writes use
//! `tokio::fs`; recursive listing walks the tree with `walkdir` on the
//! blocking pool.

use super::path::{normalize, normalize_prefix};
use super::{Permission, PermissionCheck, Result, Storage, StorageEntry, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Storage rooted at a local directory.
///
/// ```no_run
/// use gallery_index::storage::LocalStorage;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalStorage::new("site", "/srv/gallery")?.read_only(true);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    name: String,
    root: PathBuf,
    read_only: bool,
}

impl LocalStorage {
    /// Open (creating if needed) a storage root.
    ///
    /// Errors if the root exists and is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if root.exists() {
            if !root.is_dir() {
                return Err(StorageError::InvalidPath(root.display().to_string()));
            }
        } else {
            // One-off at startup; not worth an async constructor.
            std::fs::create_dir_all(&root)
                .map_err(|e| StorageError::io(root.display().to_string(), e))?;
        }
        Ok(Self {
            name: name.into(),
            root,
            read_only: false,
        })
    }

    /// Refuse writes, deletes and moves.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute(&self, key: &str) -> Result<(String, PathBuf)> {
        let key = normalize(key)?;
        let path = key.split('/').fold(self.root.clone(), |acc, s| acc.join(s));
        Ok((key, path))
    }

    fn ensure_writable(&self, key: &str) -> Result<()> {
        if self.read_only {
            return Err(StorageError::PermissionDenied(format!(
                "store '{}' is read-only ({key})",
                self.name
            )));
        }
        Ok(())
    }
}

fn to_utc(modified: std::io::Result<std::time::SystemTime>) -> DateTime<Utc> {
    modified
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[async_trait]
impl Storage for LocalStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let (key, abs) = self.absolute(path)?;
        match fs::read(&abs).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            // A "file" that is actually a directory is not an object.
            Err(_) if abs.is_dir() => Ok(None),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    async fn put(&self, path: &str, data: &[u8], _content_type: &str) -> Result<()> {
        let (key, abs) = self.absolute(path)?;
        self.ensure_writable(&key)?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(key.clone(), e))?;
        }
        fs::write(&abs, data)
            .await
            .map_err(|e| StorageError::io(key, e))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let (key, abs) = self.absolute(path)?;
        self.ensure_writable(&key)?;
        match fs::remove_file(&abs).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StorageEntry>> {
        let prefix = normalize_prefix(prefix)?;
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            prefix.split('/').fold(self.root.clone(), |acc, s| acc.join(s))
        };
        let root = self.root.clone();

        let walked = tokio::task::spawn_blocking(move || -> Result<Vec<StorageEntry>> {
            // Listing a prefix that does not exist yields nothing, the same
            // as an object store would.
            if !start.exists() {
                return Ok(Vec::new());
            }
            let mut entries = Vec::new();
            for entry in WalkDir::new(&start).follow_links(false) {
                let entry = entry.map_err(|e| {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    match e.into_io_error() {
                        Some(io) => StorageError::io(path, io),
                        None => StorageError::Backend(format!("filesystem loop at {path}")),
                    }
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let metadata = entry
                    .metadata()
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                entries.push(StorageEntry {
                    path: key,
                    size: metadata.len(),
                    modified: to_utc(metadata.modified()),
                });
            }
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(entries)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("listing task failed: {e}")))??;

        Ok(walked)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let (key, abs) = self.absolute(path)?;
        match fs::metadata(&abs).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let (from_key, from_abs) = self.absolute(from)?;
        let (to_key, to_abs) = self.absolute(to)?;
        self.ensure_writable(&to_key)?;
        if !fs::try_exists(&from_abs).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from_key));
        }
        if let Some(parent) = to_abs.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(to_key.clone(), e))?;
        }
        fs::rename(&from_abs, &to_abs)
            .await
            .map_err(|e| StorageError::io(from_key, e))
    }

    fn check_permission(&self, permission: Permission) -> PermissionCheck {
        let metadata = match std::fs::metadata(&self.root) {
            Ok(metadata) => metadata,
            Err(e) => {
                return PermissionCheck::Denied {
                    reason: format!("root {} is not accessible: {e}", self.root.display()),
                };
            }
        };
        match permission {
            Permission::Read | Permission::List => PermissionCheck::Granted,
            Permission::Write | Permission::Delete if self.read_only => PermissionCheck::Denied {
                reason: format!("store '{}' is configured read-only", self.name),
            },
            Permission::Write | Permission::Delete if metadata.permissions().readonly() => {
                PermissionCheck::Denied {
                    reason: format!("root {} is not writable", self.root.display()),
                }
            }
            Permission::Write | Permission::Delete => PermissionCheck::Granted,
        }
    }
}
