//! # Gallery Index
//!
//! Content indexing and image optimization for a photo-gallery site whose
//! content lives in a storage backend (a local directory or an object store).
//! Galleries are folders of images with optional YAML metadata; posts and
//! pages are Markdown files with front matter.
//!
//! # Architecture: Index, then Optimize
//!
//! ```text
//! 1. Scan + Index   storage/  →  _cache/content-index.json   (one snapshot document)
//! 2. Optimize       snapshot  →  <original>_<width>w.webp    (resumable, chunked)
//! ```
//!
//! The index is built once and served from storage until something invalidates
//! it, so page renders never list the store. Small metadata edits patch one
//! gallery in place instead of rescanning.
//!
//! Optimization runs as a sequence of short, independent calls. Each call
//! processes one `offset`/`limit` slice of a stable candidate list and reports
//! the next offset; a durable counter lets any process answer status polls.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`storage`] | Async storage trait, key normalization, local and in-memory backends |
//! | [`naming`] | Variant filename convention and original/variant/dotfile classification |
//! | [`imaging`] | Width planning, the image codec trait, parallel variant rendering |
//! | [`metadata`] | Tolerant parsing of `gallery.yaml`, `photos.yaml` and front matter |
//! | [`types`] | The index snapshot: galleries, photos, posts, pages, stats |
//! | [`tree`] | Gallery hierarchy with explicit parent links |
//! | [`scan`] | Walks storage and produces gallery, post and page entries |
//! | [`index`] | Snapshot build, cache, invalidation and partial gallery patches |
//! | [`optimize`] | Chunked, resumable WebP variant generation and status |
//! | [`api`] | Request router for the three admin image endpoints |
//! | [`config`] | `config.toml` loading, validation and stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Storage Is the Only Shared State
//!
//! Nothing survives between calls in process memory. The index snapshot and
//! the optimization counter are documents in the same store as the content,
//! so several stateless instances can serve the same site. Both are plain
//! read-modify-write: two concurrent runs, or a run racing a metadata edit,
//! can overwrite each other.
//!
//! ## Variants Next to Originals
//!
//! `photo.jpg` gets `photo_800w.webp`, `photo_1600w.webp`, … in the same
//! folder. The name alone says which original and width a variant belongs to,
//! so skipping, cleanup and old-size removal need no extra bookkeeping.
//! Widths at or above the original's width are never generated.
//!
//! ## Codec Behind a Trait
//!
//! [`imaging::ImageCodec`] isolates decode, resize and encode. Production uses
//! the pure-Rust `image` crate; tests use a recording mock that decodes a tiny
//! fake format, so optimizer tests never touch real pixels.

pub mod api;
pub mod config;
pub mod imaging;
pub mod index;
pub mod metadata;
pub mod naming;
pub mod optimize;
pub mod output;
pub mod scan;
pub mod storage;
pub mod tree;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
