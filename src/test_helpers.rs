//! Shared test utilities.
//!
//! Provides an in-memory sample site, lookups that panic with a clear message
//! on miss, and constructors for the index cache and the optimizer wired to
//! a [`MemoryStorage`] and the [`MockCodec`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (store, cache) = setup_cache(sample_store());
//! let index = cache.get().await.unwrap();
//! let family = find_gallery(&index.galleries, "family");
//! assert_eq!(family.title, "Family Album");
//! ```

use std::sync::Arc;

use crate::config::{ContentConfig, ImagesConfig, IndexConfig, OptimizerConfig};
use crate::imaging::codec::tests::{MockCodec, fake_image};
use crate::index::ContentIndexCache;
use crate::optimize::Optimizer;
use crate::storage::MemoryStorage;
use crate::types::GalleryEntry;

// =========================================================================
// Fixture stores
// =========================================================================

/// A small site with every content kind.
///
/// ```text
/// galleries/family/        gallery.yaml, photos.yaml, 3 photos (1 hidden),
///                          one existing variant, a dotfile
/// galleries/trips/japan/   order 2, one photo
/// galleries/trips/italy/   order 1, one photo
/// posts/                   hello-world (cover), older (draft), notes/undated
/// pages/                   about, contact (hidden from nav)
/// ```
///
/// Images carry [`fake_image`] payloads so the mock codec can decode them.
pub fn sample_store() -> MemoryStorage {
    let text = |s: &str| s.as_bytes().to_vec();
    MemoryStorage::with_files([
        (
            "galleries/family/gallery.yaml",
            text("title: Family Album\ntags: [people]\ncover: park.jpg\n"),
        ),
        (
            "galleries/family/photos.yaml",
            text(
                "- filename: dinner.jpg\n  title: Dinner\n- filename: beach.jpg\n  hidden: true\n- filename: ghost.jpg\n",
            ),
        ),
        ("galleries/family/beach.jpg", fake_image(1200, 800)),
        ("galleries/family/dinner.jpg", fake_image(2000, 1333)),
        ("galleries/family/park.jpg", fake_image(3000, 2000)),
        ("galleries/family/beach_800w.webp", b"FAKEWEBP 800x533".to_vec()),
        ("galleries/family/.DS_Store", vec![0u8; 4]),
        ("galleries/trips/japan/gallery.yaml", text("order: 2\n")),
        ("galleries/trips/japan/tokyo.jpg", fake_image(600, 400)),
        ("galleries/trips/italy/gallery.yaml", text("order: 1\n")),
        ("galleries/trips/italy/rome.jpg", fake_image(2400, 1600)),
        (
            "posts/hello-world.md",
            text(
                "---\ntitle: Hello World\ndate: 2024-05-02\ncover: hello.jpg\n---\n# Ignored heading\n\nFirst paragraph here.\n",
            ),
        ),
        ("posts/hello.jpg", fake_image(1000, 500)),
        (
            "posts/older.md",
            text("---\ndate: 2023-01-10\ndraft: true\n---\n# An Older Story\n\nOnce.\n"),
        ),
        ("posts/notes/undated.md", text("Just text.\n")),
        (
            "pages/about.md",
            text("---\ntitle: About\norder: 1\n---\nHi"),
        ),
        ("pages/contact.md", text("---\nshowInNav: false\n---\n# Contact\n")),
    ])
}

/// A store holding only gallery originals: `(path under galleries/, width, height)`.
pub fn gallery_store(files: &[(String, u32, u32)]) -> MemoryStorage {
    MemoryStorage::with_files(
        files
            .iter()
            .map(|(path, w, h)| (format!("galleries/{path}"), fake_image(*w, *h))),
    )
}

// =========================================================================
// Wiring
// =========================================================================

/// Index cache over `store` with default content and index settings.
pub fn setup_cache(store: MemoryStorage) -> (Arc<MemoryStorage>, ContentIndexCache) {
    let store = Arc::new(store);
    let cache = ContentIndexCache::new(
        store.clone(),
        ContentConfig::default(),
        &IndexConfig::default(),
    );
    (store, cache)
}

/// Optimizer over `store` with the default ladder and settings.
pub fn setup_optimizer(store: MemoryStorage) -> (Arc<MemoryStorage>, Optimizer<MockCodec>) {
    setup_optimizer_with(store, ImagesConfig::default(), OptimizerConfig::default())
}

pub fn setup_optimizer_with(
    store: MemoryStorage,
    images: ImagesConfig,
    settings: OptimizerConfig,
) -> (Arc<MemoryStorage>, Optimizer<MockCodec>) {
    let (store, cache) = setup_cache(store);
    let optimizer = Optimizer::new(
        store.clone(),
        Arc::new(cache),
        MockCodec::new(),
        &images,
        &settings,
    );
    (store, optimizer)
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find a gallery by slug. Panics if not found.
pub fn find_gallery<'a>(galleries: &'a [GalleryEntry], slug: &str) -> &'a GalleryEntry {
    galleries.iter().find(|g| g.slug == slug).unwrap_or_else(|| {
        let slugs: Vec<&str> = galleries.iter().map(|g| g.slug.as_str()).collect();
        panic!("gallery '{slug}' not found. Available: {slugs:?}")
    })
}
