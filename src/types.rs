//! Index data model.
//!
//! These types are the persisted content index document. They serialize to
//! camelCase JSON and must round-trip without changing a byte, so partial
//! patches leave untouched entries identical.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bumped whenever the document shape changes. A cached document with a
/// different value is treated as a cache miss.
pub const SCHEMA_VERSION: u32 = 1;

/// Snapshot of all galleries, posts and pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentIndex {
    pub schema_version: u32,
    /// Content hash; changes whenever any entry changes.
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// Sorted by slug, so ancestors precede descendants.
    pub galleries: Vec<GalleryEntry>,
    pub posts: Vec<PostEntry>,
    pub pages: Vec<PageEntry>,
    pub stats: IndexStats,
}

impl ContentIndex {
    pub fn gallery(&self, slug: &str) -> Option<&GalleryEntry> {
        self.galleries.iter().find(|g| g.slug == slug)
    }

    pub fn gallery_mut(&mut self, slug: &str) -> Option<&mut GalleryEntry> {
        self.galleries.iter_mut().find(|g| g.slug == slug)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    /// `/`-separated path relative to the galleries prefix (`trips/japan`).
    pub slug: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Storage key of the cover photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// The gallery's own photos, sorted by `order`.
    pub photos: Vec<PhotoEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub include_nested_photos: bool,
    /// Has at least one child gallery.
    #[serde(default)]
    pub is_parent_gallery: bool,
    /// Synthesized for a folder with no files of its own.
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl GalleryEntry {
    /// An empty, folder-only gallery.
    pub fn virtual_folder(slug: &str, title: String) -> Self {
        Self {
            slug: slug.to_string(),
            title,
            description: None,
            cover: None,
            photos: Vec::new(),
            order: None,
            tags: Vec::new(),
            password: None,
            include_nested_photos: false,
            is_parent_gallery: false,
            is_virtual: true,
            category: None,
            last_modified: None,
        }
    }

    pub fn visible_photos(&self) -> impl Iterator<Item = &PhotoEntry> {
        self.photos.iter().filter(|p| !p.hidden)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoEntry {
    /// Unique within its gallery.
    pub filename: String,
    /// Full storage key of the original.
    pub path: String,
    pub order: i64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PhotoEntry {
    /// An undeclared photo with default metadata.
    pub fn discovered(path: &str, order: i64) -> Self {
        Self {
            filename: crate::storage::file_name(path).to_string(),
            path: path.to_string(),
            order,
            hidden: false,
            tags: Vec::new(),
            title: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEntry {
    pub slug: String,
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub draft: bool,
    /// Storage key of the cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
    pub slug: String,
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default = "default_true")]
    pub show_in_nav: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

/// Aggregate counts over a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub galleries: usize,
    pub parent_galleries: usize,
    pub photos: usize,
    pub hidden_photos: usize,
    pub posts: usize,
    pub draft_posts: usize,
    pub pages: usize,
    /// Distinct tags across galleries, photos and posts.
    pub tags: usize,
}

impl IndexStats {
    pub fn compute(galleries: &[GalleryEntry], posts: &[PostEntry], pages: &[PageEntry]) -> Self {
        let mut tags: BTreeSet<&str> = BTreeSet::new();
        let mut photos = 0;
        let mut hidden_photos = 0;
        for gallery in galleries {
            tags.extend(gallery.tags.iter().map(String::as_str));
            for photo in &gallery.photos {
                photos += 1;
                if photo.hidden {
                    hidden_photos += 1;
                }
                tags.extend(photo.tags.iter().map(String::as_str));
            }
        }
        for post in posts {
            tags.extend(post.tags.iter().map(String::as_str));
        }

        Self {
            galleries: galleries.len(),
            parent_galleries: galleries.iter().filter(|g| g.is_parent_gallery).count(),
            photos,
            hidden_photos,
            posts: posts.len(),
            draft_posts: posts.iter().filter(|p| p.draft).count(),
            pages: pages.len(),
            tags: tags.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(name: &str, hidden: bool, tags: &[&str]) -> PhotoEntry {
        PhotoEntry {
            hidden,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..PhotoEntry::discovered(&format!("galleries/g/{name}"), 0)
        }
    }

    #[test]
    fn discovered_photo_takes_filename_from_path() {
        let p = PhotoEntry::discovered("galleries/trips/dawn.jpg", 3);
        assert_eq!(p.filename, "dawn.jpg");
        assert_eq!(p.order, 3);
        assert!(!p.hidden);
    }

    #[test]
    fn stats_count_everything() {
        let mut parent = GalleryEntry::virtual_folder("trips", "trips".into());
        parent.is_parent_gallery = true;
        parent.tags = vec!["travel".into()];
        let mut child = GalleryEntry::virtual_folder("trips/japan", "japan".into());
        child.photos = vec![
            photo("a.jpg", false, &["travel", "asia"]),
            photo("b.jpg", true, &[]),
        ];
        let posts = vec![PostEntry {
            slug: "hello".into(),
            path: "posts/hello.md".into(),
            title: "Hello".into(),
            date: None,
            tags: vec!["news".into()],
            draft: true,
            cover: None,
            description: None,
            excerpt: None,
            last_modified: None,
        }];

        let stats = IndexStats::compute(&[parent, child], &posts, &[]);
        assert_eq!(
            stats,
            IndexStats {
                galleries: 2,
                parent_galleries: 1,
                photos: 2,
                hidden_photos: 1,
                posts: 1,
                draft_posts: 1,
                pages: 0,
                tags: 3,
            }
        );
    }

    #[test]
    fn gallery_serializes_camel_case_and_skips_empty_options() {
        let g = GalleryEntry::virtual_folder("a/b", "b".into());
        let json = serde_json::to_string(&g).unwrap();
        assert!(json.contains("\"includeNestedPhotos\":false"));
        assert!(json.contains("\"isVirtual\":true"));
        assert!(!json.contains("cover"));
        let back: GalleryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }
}
