//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top of it
//! key-by-key, so a config file only needs the values it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! root = "site"                 # Local directory backing the object store
//! read_only = false
//!
//! [content]
//! galleries_prefix = "galleries"
//! posts_prefix = "posts"
//! pages_prefix = "pages"
//! gallery_meta_file = "gallery.yaml"
//! photos_meta_file = "photos.yaml"
//! excerpt_length = 200
//!
//! [index]
//! key = "_cache/content-index.json"
//!
//! [images]
//! widths = [800, 1600, 2400]    # Variant width ladder, ascending
//! retired_widths = []           # Old widths cleanup-old-sizes removes
//! quality = 85
//! filter = "lanczos3"
//!
//! [optimizer]
//! concurrency = 4               # Images in flight per chunk (1-10)
//! default_limit = 10            # Images per chunk when the caller omits it
//! max_limit = 100
//! progress_key = "_cache/optimize-progress.json"
//! status_sample_size = 20
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Quality, ResizeFilter, VariantConfig};
use crate::storage::normalize_key;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub storage: StorageConfig,
    pub content: ContentConfig,
    pub index: IndexConfig,
    pub images: ImagesConfig,
    pub optimizer: OptimizerConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let images = &self.images;
        if images.widths.is_empty() {
            return Err(ConfigError::Validation(
                "images.widths must not be empty".into(),
            ));
        }
        if images.widths.contains(&0) {
            return Err(ConfigError::Validation(
                "images.widths must be non-zero".into(),
            ));
        }
        if !images.widths.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::Validation(
                "images.widths must be strictly ascending".into(),
            ));
        }
        if let Some(w) = images.retired_widths.iter().find(|w| images.widths.contains(w)) {
            return Err(ConfigError::Validation(format!(
                "images.retired_widths contains current width {w}"
            )));
        }
        if !(1..=100).contains(&images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }

        let opt = &self.optimizer;
        if !(1..=10).contains(&opt.concurrency) {
            return Err(ConfigError::Validation(
                "optimizer.concurrency must be 1-10".into(),
            ));
        }
        if opt.default_limit == 0 || opt.max_limit == 0 {
            return Err(ConfigError::Validation(
                "optimizer limits must be greater than zero".into(),
            ));
        }
        if opt.default_limit > opt.max_limit {
            return Err(ConfigError::Validation(
                "optimizer.default_limit must not exceed optimizer.max_limit".into(),
            ));
        }
        if opt.status_sample_size == 0 {
            return Err(ConfigError::Validation(
                "optimizer.status_sample_size must be greater than zero".into(),
            ));
        }

        for (name, key) in [
            ("content.galleries_prefix", &self.content.galleries_prefix),
            ("content.posts_prefix", &self.content.posts_prefix),
            ("content.pages_prefix", &self.content.pages_prefix),
            ("index.key", &self.index.key),
            ("optimizer.progress_key", &self.optimizer.progress_key),
        ] {
            if normalize_key(key).is_err() {
                return Err(ConfigError::Validation(format!(
                    "{name} is not a valid storage key: {key:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Where the object store lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Local directory backing the store. Relative paths resolve against the
    /// directory holding `config.toml`.
    pub root: String,
    pub read_only: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "site".to_string(),
            read_only: false,
        }
    }
}

/// Content layout inside the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    pub galleries_prefix: String,
    pub posts_prefix: String,
    pub pages_prefix: String,
    /// Per-gallery metadata file name.
    pub gallery_meta_file: String,
    /// Per-gallery photo list file name.
    pub photos_meta_file: String,
    /// Maximum characters in a post excerpt.
    pub excerpt_length: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            galleries_prefix: "galleries".to_string(),
            posts_prefix: "posts".to_string(),
            pages_prefix: "pages".to_string(),
            gallery_meta_file: "gallery.yaml".to_string(),
            photos_meta_file: "photos.yaml".to_string(),
            excerpt_length: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Storage key of the cached index document.
    pub key: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            key: "_cache/content-index.json".to_string(),
        }
    }
}

/// Variant generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Width ladder, strictly ascending.
    pub widths: Vec<u32>,
    /// Widths of an earlier ladder. When set, `cleanup-old-sizes` removes
    /// only these widths; when empty, every width not in `widths`.
    pub retired_widths: Vec<u32>,
    /// WebP quality (1-100).
    pub quality: u32,
    pub filter: ResizeFilter,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            widths: vec![800, 1600, 2400],
            retired_widths: Vec::new(),
            quality: 85,
            filter: ResizeFilter::default(),
        }
    }
}

impl ImagesConfig {
    pub fn variant_config(&self) -> VariantConfig {
        VariantConfig {
            widths: self.widths.clone(),
            quality: Quality::new(self.quality),
            filter: self.filter,
        }
    }
}

/// Chunked optimization job settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Candidates processed concurrently within one chunk.
    pub concurrency: usize,
    /// Chunk size when a request does not name one.
    pub default_limit: usize,
    /// Larger requested chunks are clamped to this.
    pub max_limit: usize,
    /// Storage key of the persisted progress counter.
    pub progress_key: String,
    /// Candidates probed by a cold status query.
    pub status_sample_size: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            default_limit: 10,
            max_limit: 100,
            progress_key: "_cache/optimize-progress.json".to_string(),
            status_sample_size: 20,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, falling back to stock defaults when it is absent.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Resolve `storage.root` against the directory holding the config file.
pub fn storage_root(config: &SiteConfig, config_path: &Path) -> PathBuf {
    let root = Path::new(&config.storage.root);
    if root.is_absolute() {
        return root.to_path_buf();
    }
    config_path
        .parent()
        .map(|dir| dir.join(root))
        .unwrap_or_else(|| root.to_path_buf())
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Gallery Index Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Object store
# ---------------------------------------------------------------------------
[storage]
# Local directory holding galleries, posts, pages and caches.
# Relative to the directory containing this file.
root = "site"

# Refuse every write, delete and move. Index builds and optimizer runs fail.
read_only = false

# ---------------------------------------------------------------------------
# Content layout
# ---------------------------------------------------------------------------
[content]
galleries_prefix = "galleries"
posts_prefix = "posts"
pages_prefix = "pages"

# Optional per-gallery files: gallery-level fields and the ordered photo list.
gallery_meta_file = "gallery.yaml"
photos_meta_file = "photos.yaml"

# Maximum characters kept from a post's first paragraph.
excerpt_length = 200

# ---------------------------------------------------------------------------
# Content index cache
# ---------------------------------------------------------------------------
[index]
key = "_cache/content-index.json"

# ---------------------------------------------------------------------------
# Variant images
# ---------------------------------------------------------------------------
[images]
# Target widths in pixels, strictly ascending. An original never gets a
# variant at or above its own width.
widths = [800, 1600, 2400]

# Widths from an earlier ladder. When set, cleanup-old-sizes removes only
# variants at these widths. When empty, it removes every width not in `widths`.
retired_widths = []

# WebP quality (1 = worst, 100 = best).
quality = 85

# Resampling filter: "nearest", "triangle", "catmull-rom" or "lanczos3".
filter = "lanczos3"

# ---------------------------------------------------------------------------
# Optimization job
# ---------------------------------------------------------------------------
[optimizer]
# Images processed at once inside a chunk (1-10).
concurrency = 4

# Images per chunk when the request has no limit. Tune so one chunk finishes
# well inside the platform's request time budget.
default_limit = 10
max_limit = 100

# Durable progress counter shared by chunk calls and status polls.
progress_key = "_cache/optimize-progress.json"

# Random candidates probed when no progress counter exists yet.
status_sample_size = 20
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        SiteConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let toml = r#"
[images]
widths = [640, 1280]
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.images.widths, vec![640, 1280]);
        assert_eq!(config.images.quality, 85);
        assert_eq!(config.optimizer.default_limit, 10);
        assert_eq!(config.content.galleries_prefix, "galleries");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
[images]
sizes = [800]
"#;
        assert!(toml::from_str::<SiteConfig>(toml).is_err());
    }

    #[test]
    fn variant_config_clamps_quality() {
        let images = ImagesConfig {
            quality: 100,
            ..ImagesConfig::default()
        };
        let vc = images.variant_config();
        assert_eq!(vc.quality.value(), 100);
        assert_eq!(vc.widths, vec![800, 1600, 2400]);
        assert_eq!(vc.filter, ResizeFilter::Lanczos3);
    }

    // =========================================================================
    // validation
    // =========================================================================

    fn invalid(mutate: impl FnOnce(&mut SiteConfig)) -> bool {
        let mut config = SiteConfig::default();
        mutate(&mut config);
        matches!(config.validate(), Err(ConfigError::Validation(_)))
    }

    #[test]
    fn ladder_must_be_non_empty_and_ascending() {
        assert!(invalid(|c| c.images.widths.clear()));
        assert!(invalid(|c| c.images.widths = vec![1600, 800]));
        assert!(invalid(|c| c.images.widths = vec![800, 800]));
        assert!(invalid(|c| c.images.widths = vec![0, 800]));
    }

    #[test]
    fn retired_widths_cannot_overlap_current() {
        assert!(invalid(|c| c.images.retired_widths = vec![1600]));
        assert!(!invalid(|c| c.images.retired_widths = vec![1400, 2080]));
    }

    #[test]
    fn ranges_are_enforced() {
        assert!(invalid(|c| c.images.quality = 0));
        assert!(invalid(|c| c.images.quality = 101));
        assert!(invalid(|c| c.optimizer.concurrency = 0));
        assert!(invalid(|c| c.optimizer.concurrency = 11));
        assert!(invalid(|c| c.optimizer.default_limit = 0));
        assert!(invalid(|c| c.optimizer.default_limit = 200));
        assert!(invalid(|c| c.optimizer.status_sample_size = 0));
    }

    #[test]
    fn keys_must_be_valid_storage_keys() {
        assert!(invalid(|c| c.index.key = "../outside.json".into()));
        assert!(invalid(|c| c.optimizer.progress_key = String::new()));
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[images]\nquality = 85\nwidths = [800]").unwrap();
        let overlay: toml::Value = toml::from_str("[images]\nquality = 70").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["images"]["quality"].as_integer(), Some(70));
        assert!(merged["images"]["widths"].is_array());
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("w = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("w = [4]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["w"].as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[optimizer]
concurrency = 8

[index]
key = "cache/index.json"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.optimizer.concurrency, 8);
        assert_eq!(config.index.key, "cache/index.json");
        assert_eq!(config.optimizer.max_limit, 100);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[optimizer]\nconcurrency = 50\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn storage_root_is_relative_to_config_file() {
        let config = SiteConfig::default();
        let root = storage_root(&config, Path::new("/srv/blog/config.toml"));
        assert_eq!(root, PathBuf::from("/srv/blog/site"));

        let mut absolute = SiteConfig::default();
        absolute.storage.root = "/data/store".into();
        assert_eq!(
            storage_root(&absolute, Path::new("config.toml")),
            PathBuf::from("/data/store")
        );
    }

    // =========================================================================
    // stock_config_toml
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        for section in ["storage", "content", "index", "images", "optimizer"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }
}
