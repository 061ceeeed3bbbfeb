//! Parameter types for codec operations.
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`ResizeFilter`]: resampling kernel handed to [`ImageCodec::resize`](super::ImageCodec::resize).
//! - [`VariantConfig`]: width ladder + quality + filter, everything needed to
//!   render one original's variants.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Resampling kernel used when shrinking an original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    #[default]
    Lanczos3,
}

/// Everything [`render_variants`](super::render_variants) needs besides the bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantConfig {
    /// Target widths, ascending.
    pub widths: Vec<u32>,
    pub quality: Quality,
    pub filter: ResizeFilter,
}

impl VariantConfig {
    pub fn new(widths: Vec<u32>, quality: Quality) -> Self {
        Self {
            widths,
            quality,
            filter: ResizeFilter::default(),
        }
    }
}
