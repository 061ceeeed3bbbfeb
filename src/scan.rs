//! Content scanning.
//!
//! Walks the store and turns loosely structured files into normalized
//! [`GalleryEntry`], [`PostEntry`] and [`PageEntry`] lists for the index
//! builder.
//!
//! ## Store layout
//!
//! ```text
//! galleries/                       # content.galleries_prefix
//! ├── family/
//! │   ├── gallery.yaml             # Gallery fields (optional)
//! │   ├── photos.yaml              # Ordered photo metadata (optional)
//! │   ├── beach.jpg                # Original
//! │   └── beach_800w.webp          # Variant, never indexed as a photo
//! └── trips/                       # Virtual parent: no files of its own
//!     ├── japan/
//!     │   └── tokyo.jpg
//!     └── italy/
//!         └── rome.jpg
//! posts/
//! └── hello-world.md               # YAML front matter + Markdown
//! pages/
//! └── about.md
//! ```
//!
//! ## Merge rules
//!
//! - Photos declared in `photos.yaml` keep their metadata and declared order.
//!   Image files that are not declared are appended with `order` = their
//!   insertion index and `hidden = false`. Declared entries whose file is
//!   missing are dropped with a warning.
//! - Variant files and dotfiles are never photos, so re-scanning after an
//!   optimizer run yields the same galleries.
//! - Malformed YAML is logged and replaced by defaults. Only storage failures
//!   abort a scan.
//! - Every `a/b` gallery has an `a` gallery; missing ones are synthesized as
//!   virtual folders.
//! - Cover: declared `cover`, else the first visible photo, else the first
//!   child gallery's cover.
//!
//! Each prefix is listed exactly once.

use crate::config::ContentConfig;
use crate::metadata::{self, PageMeta, PhotoMeta, PostMeta};
use crate::naming;
use crate::storage::{self, Storage, StorageEntry, StorageError};
use crate::tree::{GalleryTree, ancestor_slugs};
use crate::types::{GalleryEntry, PageEntry, PhotoEntry, PostEntry};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("storage error during scan: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Everything one scan found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutput {
    pub galleries: Vec<GalleryEntry>,
    pub posts: Vec<PostEntry>,
    pub pages: Vec<PageEntry>,
}

/// Scan galleries, posts and pages.
pub async fn scan_content(storage: &dyn Storage, content: &ContentConfig) -> Result<ScanOutput> {
    let galleries = scan_galleries(storage, content).await?;
    let posts = scan_posts(storage, content).await?;
    let pages = scan_pages(storage, content).await?;
    info!(
        store = storage.name(),
        galleries = galleries.len(),
        posts = posts.len(),
        pages = pages.len(),
        "content scanned"
    );
    Ok(ScanOutput {
        galleries,
        posts,
        pages,
    })
}

// =============================================================================
// Galleries
// =============================================================================

#[derive(Debug, Default)]
struct Folder {
    /// Original image keys, in listing order.
    images: Vec<String>,
    has_gallery_meta: bool,
    has_photos_meta: bool,
    last_modified: Option<DateTime<Utc>>,
}

/// Scan every gallery folder under the galleries prefix.
///
/// Returned galleries are sorted by slug.
pub async fn scan_galleries(
    storage: &dyn Storage,
    content: &ContentConfig,
) -> Result<Vec<GalleryEntry>> {
    let prefix = storage::normalize_prefix(&content.galleries_prefix)?;
    let entries = storage.list(&prefix).await?;
    let listed: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();

    let mut folders: BTreeMap<String, Folder> = BTreeMap::new();
    for entry in &entries {
        let Some(rel) = relative_to(&entry.path, &prefix) else {
            continue;
        };
        if has_hidden_segment(rel) {
            continue;
        }
        let slug = storage::parent(rel);
        if slug.is_empty() {
            debug!(path = %entry.path, "file outside any gallery folder, ignored");
            continue;
        }
        let name = storage::file_name(rel);
        let folder = folders.entry(slug.to_string()).or_default();
        folder.last_modified = folder.last_modified.max(Some(entry.modified));
        if name == content.gallery_meta_file {
            folder.has_gallery_meta = true;
        } else if name == content.photos_meta_file {
            folder.has_photos_meta = true;
        } else if naming::is_original_image(name) {
            folder.images.push(entry.path.clone());
        }
    }

    let mut galleries = Vec::with_capacity(folders.len());
    for (slug, folder) in &folders {
        galleries.push(build_gallery(storage, content, &prefix, slug, folder, &listed).await?);
    }

    add_virtual_ancestors(&mut galleries);
    galleries.sort_by(|a, b| a.slug.cmp(&b.slug));
    link_hierarchy(&mut galleries);
    Ok(galleries)
}

async fn build_gallery(
    storage: &dyn Storage,
    content: &ContentConfig,
    prefix: &str,
    slug: &str,
    folder: &Folder,
    listed: &HashSet<&str>,
) -> Result<GalleryEntry> {
    let dir = storage::join(prefix, slug);

    let meta = if folder.has_gallery_meta {
        let key = storage::join(&dir, &content.gallery_meta_file);
        read_text(storage, &key)
            .await?
            .map(|text| metadata::parse_gallery_meta(&key, &text))
            .unwrap_or_default()
    } else {
        Default::default()
    };

    let photos_key = storage::join(&dir, &content.photos_meta_file);
    let declared = if folder.has_photos_meta {
        read_text(storage, &photos_key)
            .await?
            .map(|text| metadata::parse_photos_meta(&photos_key, &text))
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let photos = merge_photos(&photos_key, &declared, &folder.images);

    let cover = meta.cover.as_deref().and_then(|declared_cover| {
        let resolved = photos
            .iter()
            .find(|p| p.filename == declared_cover)
            .map(|p| p.path.clone())
            .or_else(|| {
                storage::normalize_key(declared_cover)
                    .ok()
                    .filter(|key| listed.contains(key.as_str()))
            });
        if resolved.is_none() {
            warn!(gallery = slug, cover = declared_cover, "declared cover not found, falling back");
        }
        resolved
    });

    let title = metadata::resolve(&[meta.title.as_deref(), Some(&naming::display_title(slug))])
        .unwrap_or_else(|| slug.to_string());

    Ok(GalleryEntry {
        slug: slug.to_string(),
        title,
        description: meta.description,
        cover,
        photos,
        order: meta.order,
        tags: meta.tags,
        password: meta.password,
        include_nested_photos: meta.include_nested_photos,
        is_parent_gallery: false,
        is_virtual: false,
        category: meta.category,
        last_modified: folder.last_modified,
    })
}

/// Merge declared photo metadata with the image files actually present.
pub fn merge_photos(source: &str, declared: &[PhotoMeta], images: &[String]) -> Vec<PhotoEntry> {
    let by_name: HashMap<&str, &String> = images
        .iter()
        .map(|path| (storage::file_name(path), path))
        .collect();

    let mut photos: Vec<PhotoEntry> = Vec::with_capacity(images.len());
    let mut used: HashSet<&str> = HashSet::new();

    for meta in declared {
        let Some(&path) = by_name.get(meta.filename.as_str()) else {
            warn!(file = source, filename = %meta.filename, "declared photo not found, dropped");
            continue;
        };
        used.insert(storage::file_name(path));
        photos.push(PhotoEntry {
            filename: meta.filename.clone(),
            path: path.clone(),
            order: meta.order.unwrap_or(photos.len() as i64),
            hidden: meta.hidden,
            tags: meta.tags.clone(),
            title: meta.title.clone(),
            description: meta.description.clone(),
        });
    }

    for path in images {
        if used.contains(storage::file_name(path)) {
            continue;
        }
        let order = photos.len() as i64;
        photos.push(PhotoEntry::discovered(path, order));
    }

    photos.sort_by_key(|p| p.order);
    photos
}

fn add_virtual_ancestors(galleries: &mut Vec<GalleryEntry>) {
    let existing: HashSet<&str> = galleries.iter().map(|g| g.slug.as_str()).collect();
    let missing: BTreeSet<String> = galleries
        .iter()
        .flat_map(|g| ancestor_slugs(&g.slug))
        .filter(|a| !existing.contains(a))
        .map(String::from)
        .collect();
    for slug in missing {
        debug!(gallery = %slug, "synthesizing virtual parent gallery");
        let title = naming::display_title(&slug);
        galleries.push(GalleryEntry::virtual_folder(&slug, title));
    }
}

/// Set parent flags and fill in covers bottom-up. Expects slug order.
fn link_hierarchy(galleries: &mut [GalleryEntry]) {
    let tree = GalleryTree::build(galleries);
    for i in (0..galleries.len()).rev() {
        let slug = galleries[i].slug.clone();
        galleries[i].is_parent_gallery = tree.is_parent(&slug);
        if galleries[i].cover.is_some() {
            continue;
        }
        let own = galleries[i].visible_photos().next().map(|p| p.path.clone());
        let cover = own.or_else(|| {
            tree.children(&slug)
                .into_iter()
                .filter_map(|child| tree.index_of(child))
                .find_map(|c| galleries[c].cover.clone())
        });
        galleries[i].cover = cover;
    }
}

// =============================================================================
// Posts and pages
// =============================================================================

/// Scan Markdown posts. Sorted newest first, undated last, then by slug.
pub async fn scan_posts(storage: &dyn Storage, content: &ContentConfig) -> Result<Vec<PostEntry>> {
    let prefix = storage::normalize_prefix(&content.posts_prefix)?;
    let entries = storage.list(&prefix).await?;

    let mut posts = Vec::new();
    for (slug, entry) in markdown_entries(&entries, &prefix) {
        let Some(text) = read_text(storage, &entry.path).await? else {
            continue;
        };
        let (meta, body): (PostMeta, &str) = metadata::parse_front_matter(&entry.path, &text);
        let heading = metadata::first_heading(body);
        let title = metadata::resolve(&[
            meta.title.as_deref(),
            heading.as_deref(),
            Some(&naming::display_title(&slug)),
        ])
        .unwrap_or_else(|| slug.clone());

        let date = meta.date.as_deref().and_then(|raw| {
            let parsed = metadata::parse_date(raw);
            if parsed.is_none() {
                warn!(file = %entry.path, date = raw, "unparsable post date, ignored");
            }
            parsed
        });

        posts.push(PostEntry {
            cover: meta
                .cover
                .as_deref()
                .and_then(|c| asset_key(storage::parent(&entry.path), c)),
            excerpt: metadata::excerpt(body, content.excerpt_length),
            slug,
            path: entry.path.clone(),
            title,
            date,
            tags: meta.tags,
            draft: meta.draft,
            description: meta.description,
            last_modified: Some(entry.modified),
        });
    }

    posts.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.slug.cmp(&b.slug)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.slug.cmp(&b.slug),
    });
    Ok(posts)
}

/// Scan Markdown pages. Sorted by `order` (unordered last), then slug.
pub async fn scan_pages(storage: &dyn Storage, content: &ContentConfig) -> Result<Vec<PageEntry>> {
    let prefix = storage::normalize_prefix(&content.pages_prefix)?;
    let entries = storage.list(&prefix).await?;

    let mut pages = Vec::new();
    for (slug, entry) in markdown_entries(&entries, &prefix) {
        let Some(text) = read_text(storage, &entry.path).await? else {
            continue;
        };
        let (meta, body): (PageMeta, &str) = metadata::parse_front_matter(&entry.path, &text);
        let heading = metadata::first_heading(body);
        let title = metadata::resolve(&[
            meta.title.as_deref(),
            heading.as_deref(),
            Some(&naming::display_title(&slug)),
        ])
        .unwrap_or_else(|| slug.clone());

        pages.push(PageEntry {
            slug,
            path: entry.path.clone(),
            title,
            order: meta.order,
            show_in_nav: meta.show_in_nav,
            last_modified: Some(entry.modified),
        });
    }

    pages.sort_by(|a, b| {
        (a.order.unwrap_or(i64::MAX), &a.slug).cmp(&(b.order.unwrap_or(i64::MAX), &b.slug))
    });
    Ok(pages)
}

// =============================================================================
// Helpers
// =============================================================================

/// `.md` entries under a prefix, paired with their slug (relative path
/// without the extension).
fn markdown_entries<'a>(
    entries: &'a [StorageEntry],
    prefix: &str,
) -> Vec<(String, &'a StorageEntry)> {
    entries
        .iter()
        .filter_map(|entry| {
            let rel = relative_to(&entry.path, prefix)?;
            if has_hidden_segment(rel) {
                return None;
            }
            let stem_len = rel.len().checked_sub(3)?;
            if !rel.is_char_boundary(stem_len) || !rel[stem_len..].eq_ignore_ascii_case(".md") {
                return None;
            }
            let slug = &rel[..stem_len];
            (!slug.is_empty()).then(|| (slug.to_string(), entry))
        })
        .collect()
}

/// Resolve an asset reference from metadata. Bare names are relative to
/// `dir`; anything with a `/` is a store key; URLs pass through.
fn asset_key(dir: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if reference.contains("://") {
        return Some(reference.to_string());
    }
    let key = if reference.contains('/') {
        reference.to_string()
    } else {
        storage::join(dir, reference)
    };
    storage::normalize_key(&key).ok()
}

fn relative_to<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    path.strip_prefix(prefix)?.strip_prefix('/')
}

fn has_hidden_segment(rel: &str) -> bool {
    rel.split('/').any(|segment| segment.starts_with('.'))
}

/// Read a metadata or Markdown file. Non-UTF-8 content is logged and skipped.
async fn read_text(storage: &dyn Storage, key: &str) -> Result<Option<String>> {
    match storage.get_text(key).await {
        Ok(text) => Ok(text),
        Err(StorageError::NotUtf8(path)) => {
            warn!(file = %path, "file is not valid UTF-8, ignored");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
