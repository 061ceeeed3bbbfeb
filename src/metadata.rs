//! Tolerant parsing of content metadata.
//!
//! Metadata is hand-edited YAML, so every parser here recovers instead of
//! failing: a malformed file logs a `warn!` naming the file and yields
//! defaults, and the scan carries on.
//!
//! ## Sources
//!
//! - **`gallery.yaml`**: gallery-level fields ([`GalleryMeta`]).
//! - **`photos.yaml`**: an ordered list of [`PhotoMeta`], either as a bare
//!   YAML sequence or wrapped as `photos: [...]`.
//! - **Front matter**: YAML between `---` fences at the top of a post or page
//!   ([`PostMeta`], [`PageMeta`]).
//!
//! Unknown keys are ignored everywhere. Content files outlive the code that
//! reads them.
//!
//! ## Title resolution
//!
//! Titles resolve through [`resolve`]: the first non-empty value wins.
//!
//! ```text
//! gallery: resolve(&[gallery.yaml title, folder name])
//! post:    resolve(&[front matter title, first # heading, slug])
//! ```

use chrono::{DateTime, NaiveDate};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use tracing::warn;

/// Resolve a field from multiple sources in priority order.
///
/// Returns the first non-None, non-blank value, trimmed.
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Fields of `gallery.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GalleryMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Filename within the gallery, or a full storage key.
    pub cover: Option<String>,
    pub order: Option<i64>,
    pub tags: Vec<String>,
    pub password: Option<String>,
    #[serde(alias = "include_nested_photos")]
    pub include_nested_photos: bool,
    pub category: Option<String>,
}

/// One entry of `photos.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhotoMeta {
    pub filename: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub order: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PhotosFile {
    List(Vec<PhotoMeta>),
    Wrapped { photos: Vec<PhotoMeta> },
}

/// Front matter of a post.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostMeta {
    pub title: Option<String>,
    /// Raw date text; see [`parse_date`].
    pub date: Option<String>,
    pub tags: Vec<String>,
    pub draft: bool,
    pub cover: Option<String>,
    pub description: Option<String>,
}

/// Front matter of a page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageMeta {
    pub title: Option<String>,
    pub order: Option<i64>,
    #[serde(alias = "show_in_nav")]
    pub show_in_nav: bool,
}

impl Default for PageMeta {
    fn default() -> Self {
        Self {
            title: None,
            order: None,
            show_in_nav: true,
        }
    }
}

/// Parse a YAML document, logging and defaulting on any error.
///
/// Blank documents are silently default.
fn parse_yaml_or_default<T: DeserializeOwned + Default>(source: &str, text: &str) -> T {
    if text.trim().is_empty() {
        return T::default();
    }
    match serde_yaml::from_str::<Option<T>>(text) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            warn!(file = source, error = %e, "malformed metadata, using defaults");
            T::default()
        }
    }
}

/// Parse `gallery.yaml`. Never fails.
pub fn parse_gallery_meta(source: &str, text: &str) -> GalleryMeta {
    parse_yaml_or_default(source, text)
}

/// Parse `photos.yaml`. Never fails.
///
/// Entries without a filename are dropped. When a filename repeats, the
/// first entry wins.
pub fn parse_photos_meta(source: &str, text: &str) -> Vec<PhotoMeta> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let entries = match serde_yaml::from_str::<Option<PhotosFile>>(text) {
        Ok(Some(PhotosFile::List(list))) | Ok(Some(PhotosFile::Wrapped { photos: list })) => list,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(file = source, error = %e, "malformed photo list, ignoring it");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let name = entry.filename.trim();
            if name.is_empty() {
                warn!(file = source, "photo entry without filename, skipped");
                return false;
            }
            if !seen.insert(name.to_string()) {
                warn!(file = source, filename = name, "duplicate photo entry, keeping the first");
                return false;
            }
            true
        })
        .map(|mut entry| {
            entry.filename = entry.filename.trim().to_string();
            entry
        })
        .collect()
}

/// Split YAML front matter off a Markdown document.
///
/// Front matter must start on the first line with `---` and end at the next
/// line that is exactly `---` or `...`. Returns `(None, text)` when the
/// document has no (or unterminated) front matter.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, text)
}

/// Parse front matter into `T`, returning it with the remaining body.
pub fn parse_front_matter<'a, T: DeserializeOwned + Default>(
    source: &str,
    text: &'a str,
) -> (T, &'a str) {
    match split_front_matter(text) {
        (Some(yaml), body) => (parse_yaml_or_default(source, yaml), body),
        (None, body) => (T::default(), body),
    }
}

/// Parse a front matter date: `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Text of the first heading in a Markdown body, any level.
pub fn first_heading(markdown: &str) -> Option<String> {
    let mut in_heading = false;
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => {
                return Some(text.trim().to_string()).filter(|t| !t.is_empty());
            }
            Event::Text(t) | Event::Code(t) if in_heading => text.push_str(&t),
            _ => {}
        }
    }
    None
}

/// Plain text of the first paragraph, cut at `max_chars` with an ellipsis.
pub fn excerpt(markdown: &str, max_chars: usize) -> Option<String> {
    let mut in_paragraph = false;
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Paragraph) => in_paragraph = true,
            Event::End(TagEnd::Paragraph) => {
                if !text.trim().is_empty() {
                    break;
                }
                in_paragraph = false;
            }
            Event::Text(t) | Event::Code(t) if in_paragraph => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_paragraph => text.push(' '),
            _ => {}
        }
    }

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= max_chars {
        return Some(text);
    }
    let cut: String = text.chars().take(max_chars).collect();
    Some(format!("{}…", cut.trim_end()))
}
