//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Index
//!
//! ```text
//! Galleries
//! 001 Family Album (3 photos, 1 hidden)
//!     Slug: family
//!     Cover: galleries/family/park.jpg
//! 002 trips
//!     Slug: trips
//!     001 italy (1 photo)
//!         Slug: trips/italy
//!
//! Posts
//! 001 Hello World (2024-05-02)
//! 002 An Older Story (2023-01-10) [draft]
//!
//! Pages
//! 001 About
//! 002 Contact [not in nav]
//!
//! Index 3f2a9c01d4e5b6a7: 4 galleries, 5 photos (1 hidden), 3 posts (1 draft), 2 pages, 2 tags
//! ```
//!
//! ## Optimization
//!
//! ```text
//! 4/6 (66.7%): processed 3, skipped 1, failed 0, 5 variants
//! ```
//!
//! # Architecture
//!
//! Each result has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::optimize::{BatchCounts, BatchResponse, CleanupResponse, RunSummary, StatusResponse};
use crate::storage::{Permission, PermissionCheck};
use crate::tree::GalleryTree;
use crate::types::{ContentIndex, GalleryEntry};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Gallery header: position, title, photo count and hidden count.
///
/// ```text
/// 001 Family Album (3 photos, 1 hidden)
/// 002 trips
/// ```
fn gallery_header(position: usize, gallery: &GalleryEntry) -> String {
    let total = gallery.photos.len();
    let hidden = gallery.photos.iter().filter(|p| p.hidden).count();
    match (total, hidden) {
        (0, _) => format!("{} {}", format_index(position), gallery.title),
        (n, 0) => format!(
            "{} {} ({})",
            format_index(position),
            gallery.title,
            plural(n, "photo", "photos")
        ),
        (n, h) => format!(
            "{} {} ({}, {} hidden)",
            format_index(position),
            gallery.title,
            plural(n, "photo", "photos"),
            h
        ),
    }
}

fn counts_line(counts: &BatchCounts) -> String {
    format!(
        "processed {}, skipped {}, failed {}, {}",
        counts.processed,
        counts.skipped,
        counts.failed,
        plural(counts.variants_created, "variant", "variants")
    )
}

// ============================================================================
// Gallery tree walker
// ============================================================================

struct GalleryNode<'a> {
    depth: usize,
    position: usize,
    gallery: &'a GalleryEntry,
}

/// Flatten the gallery hierarchy depth-first, numbering siblings from 1.
fn walk_galleries(index: &ContentIndex) -> Vec<GalleryNode<'_>> {
    let tree = GalleryTree::build(&index.galleries);
    let mut nodes = Vec::new();
    walk_level(&tree, index, &tree.roots(), 0, &mut nodes);
    nodes
}

fn walk_level<'a>(
    tree: &GalleryTree,
    index: &'a ContentIndex,
    slugs: &[&str],
    depth: usize,
    nodes: &mut Vec<GalleryNode<'a>>,
) {
    for (i, slug) in slugs.iter().enumerate() {
        let Some(gallery) = index.gallery(slug) else {
            continue;
        };
        nodes.push(GalleryNode {
            depth,
            position: i + 1,
            gallery,
        });
        walk_level(tree, index, &tree.children(slug), depth + 1, nodes);
    }
}

// ============================================================================
// Index
// ============================================================================

/// Format an index snapshot: gallery tree, posts, pages, then totals.
pub fn format_index_summary(index: &ContentIndex) -> Vec<String> {
    let mut lines = vec!["Galleries".to_string()];
    for node in walk_galleries(index) {
        let base = indent(node.depth);
        lines.push(format!("{base}{}", gallery_header(node.position, node.gallery)));
        lines.push(format!("{base}    Slug: {}", node.gallery.slug));
        if let Some(cover) = &node.gallery.cover {
            lines.push(format!("{base}    Cover: {cover}"));
        }
    }

    if !index.posts.is_empty() {
        lines.push(String::new());
        lines.push("Posts".to_string());
        for (i, post) in index.posts.iter().enumerate() {
            let mut line = format!("{} {}", format_index(i + 1), post.title);
            if let Some(date) = post.date {
                line.push_str(&format!(" ({date})"));
            }
            if post.draft {
                line.push_str(" [draft]");
            }
            lines.push(line);
        }
    }

    if !index.pages.is_empty() {
        lines.push(String::new());
        lines.push("Pages".to_string());
        for (i, page) in index.pages.iter().enumerate() {
            let mut line = format!("{} {}", format_index(i + 1), page.title);
            if !page.show_in_nav {
                line.push_str(" [not in nav]");
            }
            lines.push(line);
        }
    }

    let stats = &index.stats;
    lines.push(String::new());
    lines.push(format!(
        "Index {}: {}, {} ({} hidden), {} ({} draft), {}, {}",
        index.version,
        plural(stats.galleries, "gallery", "galleries"),
        plural(stats.photos, "photo", "photos"),
        stats.hidden_photos,
        plural(stats.posts, "post", "posts"),
        stats.draft_posts,
        plural(stats.pages, "page", "pages"),
        plural(stats.tags, "tag", "tags"),
    ));
    lines
}

pub fn print_index_summary(index: &ContentIndex) {
    for line in format_index_summary(index) {
        println!("{}", line);
    }
}

// ============================================================================
// Optimization
// ============================================================================

pub fn format_status(status: &StatusResponse) -> Vec<String> {
    let state = match status.is_running {
        Some(true) => "run in progress",
        Some(false) => "last run complete",
        None => "estimated from a sample",
    };
    vec![
        format!("Images: {}", status.total_images),
        format!(
            "    With variants: {} ({:.1}%)",
            status.images_with_variants, status.percent_optimized
        ),
        format!(
            "    Needing optimization: {}",
            status.images_needing_optimization
        ),
        format!("    State: {state}"),
    ]
}

pub fn print_status(status: &StatusResponse) {
    for line in format_status(status) {
        println!("{}", line);
    }
}

/// One line per chunk.
///
/// ```text
/// 4/6 (66.7%): processed 3, skipped 1, failed 0, 5 variants
/// ```
pub fn format_batch(response: &BatchResponse) -> Vec<String> {
    let progress = &response.progress;
    vec![format!(
        "{}/{} ({:.1}%): {}",
        progress.processed_so_far,
        progress.total_images,
        progress.percent_complete,
        counts_line(&response.batch)
    )]
}

pub fn print_batch(response: &BatchResponse) {
    for line in format_batch(response) {
        println!("{}", line);
    }
}

pub fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    let run = summary
        .run_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    vec![
        format!(
            "Run {run}: {}, {}",
            plural(summary.chunks, "chunk", "chunks"),
            plural(summary.total_images, "image", "images")
        ),
        format!("    {}", counts_line(&summary.totals)),
    ]
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in format_run_summary(summary) {
        println!("{}", line);
    }
}

pub fn format_cleanup(response: &CleanupResponse) -> Vec<String> {
    vec![format!(
        "Deleted {}",
        plural(response.deleted_count, "old variant", "old variants")
    )]
}

pub fn print_cleanup(response: &CleanupResponse) {
    for line in format_cleanup(response) {
        println!("{}", line);
    }
}

// ============================================================================
// Storage
// ============================================================================

pub fn format_permissions(store: &str, checks: &[(Permission, PermissionCheck)]) -> Vec<String> {
    let mut lines = vec![format!("Storage '{store}'")];
    for (permission, check) in checks {
        let answer = match check {
            PermissionCheck::Granted => "granted".to_string(),
            PermissionCheck::Denied { reason } => format!("denied: {reason}"),
        };
        lines.push(format!("    {:<7} {answer}", permission.to_string()));
    }
    lines
}

pub fn print_permissions(store: &str, checks: &[(Permission, PermissionCheck)]) {
    for line in format_permissions(store, checks) {
        println!("{}", line);
    }
}
