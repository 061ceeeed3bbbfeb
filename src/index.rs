//! Content index builder and cache.
//!
//! The whole site is described by one [`ContentIndex`] document persisted at
//! a fixed key. Readers call [`ContentIndexCache::get`]; a miss runs the
//! scanner, assembles a fresh snapshot and persists it.
//!
//! ## Coherency
//!
//! - [`build`](ContentIndexCache::build) replaces the document wholesale.
//!   A failed scan surfaces an error; no partial snapshot is ever written.
//! - [`invalidate`](ContentIndexCache::invalidate) deletes the document so the
//!   next `get` rebuilds.
//! - Partial patches ([`update_gallery_photos`](ContentIndexCache::update_gallery_photos),
//!   [`add_photos`](ContentIndexCache::add_photos),
//!   [`remove_photos`](ContentIndexCache::remove_photos)) load the cached
//!   document, rewrite one gallery's photo list, re-stamp stats and version,
//!   and write it back without listing the store.
//!
//! Patches are plain read-modify-write with no locking. Two concurrent
//! writers can lose one update; the next full build repairs it.
//!
//! A cached document that fails to parse, or that carries another
//! [`SCHEMA_VERSION`], is a miss.

use crate::config::{ContentConfig, IndexConfig};
use crate::naming;
use crate::scan::{self, ScanError, ScanOutput};
use crate::storage::{self, StorageError, StorageHandle, content_type};
use crate::types::{ContentIndex, IndexStats, PhotoEntry, SCHEMA_VERSION};
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index rebuild failed: {0}")]
    Rebuild(#[from] ScanError),
    #[error("index storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("index serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gallery not found in index: {0}")]
    GalleryNotFound(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Result of a partial patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The gallery was rewritten and now holds `photos` entries.
    Updated { photos: usize },
    /// No cached document exists; nothing was written. The next `get`
    /// rebuilds from storage and will see the change anyway.
    NotCached,
}

/// Assemble a snapshot from scanner output and stamp it.
pub fn assemble(output: ScanOutput) -> Result<ContentIndex> {
    let mut index = ContentIndex {
        schema_version: SCHEMA_VERSION,
        version: String::new(),
        generated_at: Utc::now(),
        galleries: output.galleries,
        posts: output.posts,
        pages: output.pages,
        stats: IndexStats::default(),
    };
    restamp(&mut index)?;
    Ok(index)
}

/// Recompute stats, version and generation time after a change.
pub fn restamp(index: &mut ContentIndex) -> Result<()> {
    index.stats = IndexStats::compute(&index.galleries, &index.posts, &index.pages);
    index.version = content_version(index)?;
    index.generated_at = Utc::now();
    Ok(())
}

/// First 16 hex chars of SHA-256 over the serialized entries.
fn content_version(index: &ContentIndex) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&index.galleries)?);
    hasher.update(serde_json::to_vec(&index.posts)?);
    hasher.update(serde_json::to_vec(&index.pages)?);
    let digest = hasher.finalize();
    Ok(digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaProbe {
    schema_version: u32,
}

/// Persisted content index with rebuild-on-miss.
pub struct ContentIndexCache {
    storage: StorageHandle,
    content: ContentConfig,
    key: String,
}

impl ContentIndexCache {
    pub fn new(storage: StorageHandle, content: ContentConfig, index: &IndexConfig) -> Self {
        Self {
            storage,
            content,
            key: index.key.clone(),
        }
    }

    /// Storage key of the cached document.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> &ContentConfig {
        &self.content
    }

    /// The cached snapshot, building and persisting one on a miss.
    pub async fn get(&self) -> Result<ContentIndex> {
        match self.load_cached().await? {
            Some(index) => Ok(index),
            None => self.build().await,
        }
    }

    /// The cached snapshot, if a usable one exists. Never rebuilds.
    pub async fn load_cached(&self) -> Result<Option<ContentIndex>> {
        let Some(bytes) = self.storage.get(&self.key).await? else {
            debug!(key = %self.key, "content index cache miss");
            return Ok(None);
        };

        match serde_json::from_slice::<SchemaProbe>(&bytes) {
            Ok(probe) if probe.schema_version == SCHEMA_VERSION => {}
            Ok(probe) => {
                info!(
                    key = %self.key,
                    found = probe.schema_version,
                    expected = SCHEMA_VERSION,
                    "cached index has another schema, rebuilding"
                );
                return Ok(None);
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "cached index unreadable, rebuilding");
                return Ok(None);
            }
        }

        match serde_json::from_slice::<ContentIndex>(&bytes) {
            Ok(index) => Ok(Some(index)),
            Err(e) => {
                warn!(key = %self.key, error = %e, "cached index unreadable, rebuilding");
                Ok(None)
            }
        }
    }

    /// Rescan the store, persist and return a fresh snapshot.
    pub async fn build(&self) -> Result<ContentIndex> {
        let output = scan::scan_content(self.storage.as_ref(), &self.content).await?;
        let index = assemble(output)?;
        self.persist(&index).await?;
        info!(
            version = %index.version,
            galleries = index.stats.galleries,
            photos = index.stats.photos,
            posts = index.stats.posts,
            pages = index.stats.pages,
            "content index rebuilt"
        );
        Ok(index)
    }

    /// Drop the cached document so the next `get` rebuilds.
    pub async fn invalidate(&self) -> Result<()> {
        self.storage.delete(&self.key).await?;
        info!(key = %self.key, "content index invalidated");
        Ok(())
    }

    /// Replace one gallery's photo list with `f(current)`.
    ///
    /// Every other gallery, post and page is written back unchanged. The
    /// store is not listed. The cover is re-resolved only when it pointed at
    /// a photo that is gone (or was unset).
    pub async fn update_gallery_photos<F>(&self, gallery: &str, f: F) -> Result<PatchOutcome>
    where
        F: FnOnce(Vec<PhotoEntry>) -> Vec<PhotoEntry>,
    {
        let Some(mut index) = self.load_cached().await? else {
            debug!(gallery, "no cached index, patch skipped");
            return Ok(PatchOutcome::NotCached);
        };

        let entry = index
            .gallery_mut(gallery)
            .ok_or_else(|| IndexError::GalleryNotFound(gallery.to_string()))?;

        let before: HashSet<String> = entry.photos.iter().map(|p| p.path.clone()).collect();
        let current = std::mem::take(&mut entry.photos);
        let mut photos = f(current);
        photos.sort_by_key(|p| p.order);
        entry.photos = photos;

        let still_there = |path: &str| entry.photos.iter().any(|p| p.path == path);
        let cover_lost = match entry.cover.as_deref() {
            Some(cover) => before.contains(cover) && !still_there(cover),
            None => true,
        };
        if cover_lost {
            let cover = entry.visible_photos().next().map(|p| p.path.clone());
            entry.cover = cover;
        }
        let count = entry.photos.len();

        restamp(&mut index)?;
        self.persist(&index).await?;
        info!(gallery, photos = count, version = %index.version, "gallery photos patched");
        Ok(PatchOutcome::Updated { photos: count })
    }

    /// Append newly uploaded originals to a gallery.
    ///
    /// Paths may be full keys or bare filenames inside the gallery folder.
    /// Keys outside the folder, variants, non-images and filenames already
    /// present are ignored.
    pub async fn add_photos(&self, gallery: &str, new_paths: &[String]) -> Result<PatchOutcome> {
        let dir = storage::join(
            &storage::normalize_prefix(&self.content.galleries_prefix)?,
            gallery,
        );
        let mut keys = Vec::with_capacity(new_paths.len());
        for path in new_paths {
            let key = if path.contains('/') {
                storage::normalize_key(path)?
            } else {
                storage::join(&dir, path)
            };
            if !storage::is_under(&key, &dir) {
                debug!(path = %key, gallery, "outside the gallery folder, not added");
                continue;
            }
            if naming::is_original_image(&key) {
                keys.push(key);
            } else {
                debug!(path = %key, "not an original image, not added");
            }
        }

        self.update_gallery_photos(gallery, move |mut photos| {
            let mut next_order = photos.iter().map(|p| p.order + 1).max().unwrap_or(0);
            for key in keys {
                let name = storage::file_name(&key);
                if photos.iter().any(|p| p.filename == name) {
                    continue;
                }
                photos.push(PhotoEntry::discovered(&key, next_order));
                next_order += 1;
            }
            photos
        })
        .await
    }

    /// Remove photos from a gallery by filename.
    pub async fn remove_photos(&self, gallery: &str, filenames: &[String]) -> Result<PatchOutcome> {
        let remove: HashSet<&str> = filenames.iter().map(String::as_str).collect();
        self.update_gallery_photos(gallery, |photos| {
            photos
                .into_iter()
                .filter(|p| !remove.contains(p.filename.as_str()))
                .collect()
        })
        .await
    }

    async fn persist(&self, index: &ContentIndex) -> Result<()> {
        let bytes = serde_json::to_vec(index)?;
        self.storage
            .put(&self.key, &bytes, content_type::JSON)
            .await?;
        Ok(())
    }
}
