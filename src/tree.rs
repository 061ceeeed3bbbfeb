//! Explicit gallery hierarchy.
//!
//! Gallery slugs are `/`-separated paths, so `trips/japan` is a child of
//! `trips`. [`GalleryTree`] materializes that relation once, as an arena of
//! nodes with parent indices plus a slug lookup table, so parent, child and
//! ancestor queries never rescan the gallery list.
//!
//! Node ids are indices into the gallery slice the tree was built from.
//! A gallery whose direct parent slug is missing attaches to its nearest
//! existing ancestor.

use crate::types::{GalleryEntry, PhotoEntry};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Node {
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct GalleryTree {
    slugs: Vec<String>,
    nodes: Vec<Node>,
    by_slug: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl GalleryTree {
    /// Build the tree. Children are ordered by `(order, slug)`, galleries
    /// without an order last.
    pub fn build(galleries: &[GalleryEntry]) -> Self {
        let slugs: Vec<String> = galleries.iter().map(|g| g.slug.clone()).collect();
        let by_slug: HashMap<String, usize> = slugs
            .iter()
            .enumerate()
            .map(|(i, slug)| (slug.clone(), i))
            .collect();

        let mut nodes: Vec<Node> = galleries
            .iter()
            .map(|g| Node {
                parent: nearest_ancestor(&g.slug, &by_slug),
                children: Vec::new(),
            })
            .collect();

        let mut roots = Vec::new();
        for i in 0..nodes.len() {
            let parent = nodes[i].parent;
            match parent {
                Some(parent) => nodes[parent].children.push(i),
                None => roots.push(i),
            }
        }

        let sort_key = |i: &usize| {
            let g = &galleries[*i];
            (g.order.unwrap_or(i64::MAX), g.slug.clone())
        };
        for node in &mut nodes {
            node.children.sort_by_key(sort_key);
        }
        roots.sort_by_key(sort_key);

        Self {
            slugs,
            nodes,
            by_slug,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node id of a slug.
    pub fn index_of(&self, slug: &str) -> Option<usize> {
        self.by_slug.get(slug).copied()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.by_slug.contains_key(slug)
    }

    pub fn parent(&self, slug: &str) -> Option<&str> {
        let parent = self.nodes[self.index_of(slug)?].parent?;
        Some(&self.slugs[parent])
    }

    pub fn children(&self, slug: &str) -> Vec<&str> {
        self.index_of(slug)
            .map(|i| self.slugs_of(&self.nodes[i].children))
            .unwrap_or_default()
    }

    /// Top-level galleries.
    pub fn roots(&self) -> Vec<&str> {
        self.slugs_of(&self.roots)
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self, slug: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.index_of(slug).and_then(|i| self.nodes[i].parent);
        while let Some(i) = current {
            out.push(self.slugs[i].as_str());
            current = self.nodes[i].parent;
        }
        out
    }

    /// Every descendant in depth-first pre-order, children in tree order.
    pub fn descendants(&self, slug: &str) -> Vec<&str> {
        self.index_of(slug)
            .map(|i| self.slugs_of(&self.descendant_ids(i)))
            .unwrap_or_default()
    }

    pub fn is_parent(&self, slug: &str) -> bool {
        self.index_of(slug)
            .is_some_and(|i| !self.nodes[i].children.is_empty())
    }

    /// Visible photos of a gallery followed by those of all its descendants
    /// in tree order. This is what an `includeNestedPhotos` gallery shows.
    pub fn nested_photos<'a>(
        &self,
        galleries: &'a [GalleryEntry],
        slug: &str,
    ) -> Vec<&'a PhotoEntry> {
        let Some(root) = self.index_of(slug) else {
            return Vec::new();
        };
        std::iter::once(root)
            .chain(self.descendant_ids(root))
            .filter_map(|i| galleries.get(i))
            .flat_map(|g| g.visible_photos())
            .collect()
    }

    fn descendant_ids(&self, id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        out
    }

    fn slugs_of(&self, ids: &[usize]) -> Vec<&str> {
        ids.iter().map(|&i| self.slugs[i].as_str()).collect()
    }
}

/// Proper ancestor prefixes of a slug, nearest first: `a/b/c` → `a/b`, `a`.
pub fn ancestor_slugs(slug: &str) -> impl Iterator<Item = &str> {
    slug.char_indices()
        .filter(|&(_, c)| c == '/')
        .map(move |(pos, _)| &slug[..pos])
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
}

fn nearest_ancestor(slug: &str, by_slug: &HashMap<String, usize>) -> Option<usize> {
    ancestor_slugs(slug).find_map(|a| by_slug.get(a).copied())
}
