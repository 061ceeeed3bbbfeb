//! Filename conventions shared by the scanner and the optimizer.
//!
//! A generated variant is named after its original with the extension
//! stripped and a width suffix appended:
//!
//! ```text
//! galleries/trips/dawn.jpg   →  galleries/trips/dawn_800w.webp
//!                                galleries/trips/dawn_1600w.webp
//! ```
//!
//! Because variants live next to their originals, every listing of a gallery
//! folder contains both. [`is_variant`] is what keeps the scanner from
//! indexing its own derived output as fresh photos, and what keeps the
//! optimizer from generating variants of variants.
//!
//! Two originals that differ only by extension (`dawn.jpg`, `dawn.png`) map
//! to the same variant names. The last one processed wins.

use crate::storage;

/// Extensions treated as original photos. Compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff"];

const VARIANT_EXTENSION: &str = "webp";

/// Result of parsing a variant filename like `dawn_800w.webp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVariant {
    /// Original filename without its extension (`dawn`).
    pub base: String,
    /// Target width encoded in the suffix (`800`).
    pub width: u32,
}

/// Build the variant filename for an original at a target width.
///
/// - `"photo.jpg", 800` → `"photo_800w.webp"`
/// - `"archive.tar.jpg", 800` → `"archive.tar_800w.webp"` (only the last extension goes)
/// - `"noext", 800` → `"noext_800w.webp"`
pub fn variant_filename(original: &str, width: u32) -> String {
    format!("{}_{}w.{}", strip_extension(original), width, VARIANT_EXTENSION)
}

/// Full storage key of a variant, next to its original.
pub fn variant_path(original_path: &str, width: u32) -> String {
    let dir = storage::parent(original_path);
    let name = storage::file_name(original_path);
    storage::join(dir, &variant_filename(name, width))
}

/// Parse a variant filename. Returns `None` for anything that is not
/// `{base}_{digits}w.webp` with a non-empty base.
pub fn parse_variant(filename: &str) -> Option<ParsedVariant> {
    let stem = filename
        .strip_suffix(".webp")
        .or_else(|| filename.strip_suffix(".WEBP"))?;
    let without_w = stem.strip_suffix('w')?;
    let underscore = without_w.rfind('_')?;
    let (base, digits) = (&without_w[..underscore], &without_w[underscore + 1..]);
    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let width = digits.parse::<u32>().ok()?;
    Some(ParsedVariant {
        base: base.to_string(),
        width,
    })
}

/// True if `filename` follows the variant naming pattern.
///
/// Accepts either a bare filename or a full key; only the last segment is
/// inspected.
pub fn is_variant(filename: &str) -> bool {
    parse_variant(storage::file_name(filename)).is_some()
}

/// Dotfiles (`.DS_Store`, `._dawn.jpg`) are never content.
pub fn is_hidden(filename: &str) -> bool {
    storage::file_name(filename).starts_with('.')
}

/// True for a file that can be an original photo: a known image extension,
/// not hidden, and not a generated variant.
pub fn is_original_image(filename: &str) -> bool {
    let name = storage::file_name(filename);
    if is_hidden(name) || is_variant(name) {
        return false;
    }
    extension(name)
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Filename with its last extension removed.
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => filename,
        Some(pos) => &filename[..pos],
    }
}

fn extension(filename: &str) -> Option<&str> {
    match filename.rfind('.') {
        Some(0) | None => None,
        Some(pos) => Some(&filename[pos + 1..]),
    }
}

/// Human title from a filename or slug segment: extension dropped, dashes
/// and underscores to spaces.
///
/// - `"summer-in-rome.jpg"` → `"summer in rome"`
/// - `"trips/japan_2019"` → `"japan 2019"`
pub fn display_title(name: &str) -> String {
    strip_extension(storage::file_name(name))
        .replace(['-', '_'], " ")
        .trim()
        .to_string()
}
