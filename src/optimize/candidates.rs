//! Candidate enumeration.
//!
//! The candidate list is every original image the index knows about:
//! gallery photos (galleries in slug order, photos in display order,
//! hidden ones included) followed by post covers. Variants, non-images and
//! external URLs are excluded and duplicates keep their first position.
//!
//! The list does not depend on which variants already exist, so it is stable
//! for a given index snapshot. Chunk offsets index into it and stay valid
//! while earlier chunks create variants.

use crate::naming;
use crate::types::ContentIndex;
use std::collections::HashSet;

pub fn collect_candidates(index: &ContentIndex) -> Vec<String> {
    let gallery_photos = index
        .galleries
        .iter()
        .flat_map(|g| g.photos.iter().map(|p| p.path.as_str()));
    let post_covers = index.posts.iter().filter_map(|p| p.cover.as_deref());

    let mut seen = HashSet::new();
    gallery_photos
        .chain(post_covers)
        .filter(|path| !path.contains("://") && naming::is_original_image(path))
        .filter(|path| seen.insert(*path))
        .map(String::from)
        .collect()
}
