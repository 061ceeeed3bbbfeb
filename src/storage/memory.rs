//! In-memory storage backend.

use super::path::{is_under, normalize, normalize_prefix};
use super::{Permission, PermissionCheck, Result, Storage, StorageEntry, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    modified: DateTime<Utc>,
}

/// In-memory object store.
///
/// Objects live in a `BTreeMap` behind a [`RwLock`], so listing order is
/// deterministic and every method works on `&self`. Used by the test suite
/// and handy for dry runs.
///
/// ```
/// use gallery_index::storage::{MemoryStorage, Storage};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStorage::with_files([("galleries/a/one.jpg", b"bytes".to_vec())]);
/// assert!(store.exists("galleries/a/one.jpg").await?);
/// assert_eq!(store.get("missing.jpg").await?, None);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStorage {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    denied: HashSet<Permission>,
    list_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            objects: RwLock::new(BTreeMap::new()),
            denied: HashSet::new(),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-populated with objects.
    ///
    /// Panics on keys that fail normalization: bad fixture keys are a bug
    /// in the test, not a runtime condition.
    pub fn with_files(
        files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let now = Utc::now();
        let mut objects = BTreeMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(key) = normalize(&path) else {
                panic!("MemoryStorage::with_files: invalid path {path:?}");
            };
            objects.insert(
                key,
                StoredObject {
                    data: data.into(),
                    content_type: "application/octet-stream".to_string(),
                    modified: now,
                },
            );
        }
        Self {
            objects: RwLock::new(objects),
            ..Self::new()
        }
    }

    /// Deny a capability in [`check_permission`](Storage::check_permission)
    /// and reject the matching operations with `PermissionDenied`.
    pub fn deny(mut self, permission: Permission) -> Self {
        self.denied.insert(permission);
        self
    }

    /// Override an object's modification time.
    pub async fn set_modified(&self, path: &str, modified: DateTime<Utc>) -> Result<()> {
        let key = normalize(path)?;
        let mut guard = self.objects.write().await;
        let object = guard
            .get_mut(&key)
            .ok_or_else(|| StorageError::NotFound(key.clone()))?;
        object.modified = modified;
        Ok(())
    }

    /// Content type recorded by the last `put` for this key.
    pub async fn content_type_of(&self, path: &str) -> Option<String> {
        let key = normalize(path).ok()?;
        self.objects
            .read()
            .await
            .get(&key)
            .map(|o| o.content_type.clone())
    }

    /// Every key currently stored, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Number of `list` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn guard(&self, permission: Permission, path: &str) -> Result<()> {
        if self.denied.contains(&permission) {
            return Err(StorageError::PermissionDenied(format!("{permission} {path}")));
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.guard(Permission::Read, path)?;
        let key = normalize(path)?;
        Ok(self.objects.read().await.get(&key).map(|o| o.data.clone()))
    }

    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<()> {
        self.guard(Permission::Write, path)?;
        let key = normalize(path)?;
        self.objects.write().await.insert(
            key,
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.guard(Permission::Delete, path)?;
        let key = normalize(path)?;
        self.objects.write().await.remove(&key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StorageEntry>> {
        self.guard(Permission::List, prefix)?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let prefix = normalize_prefix(prefix)?;
        let guard = self.objects.read().await;
        Ok(guard
            .iter()
            .filter(|(key, _)| is_under(key, &prefix))
            .map(|(key, object)| StorageEntry {
                path: key.clone(),
                size: object.data.len() as u64,
                modified: object.modified,
            })
            .collect())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.guard(Permission::Read, path)?;
        let key = normalize(path)?;
        Ok(self.objects.read().await.contains_key(&key))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.guard(Permission::Write, to)?;
        self.guard(Permission::Delete, from)?;
        let from = normalize(from)?;
        let to = normalize(to)?;
        let mut guard = self.objects.write().await;
        let object = guard
            .remove(&from)
            .ok_or_else(|| StorageError::NotFound(from.clone()))?;
        guard.insert(to, object);
        Ok(())
    }

    fn check_permission(&self, permission: Permission) -> PermissionCheck {
        if self.denied.contains(&permission) {
            PermissionCheck::Denied {
                reason: format!("{permission} is disabled on store '{}'", self.name),
            }
        } else {
            PermissionCheck::Granted
        }
    }
}
