//! High-level image operations.
//!
//! These functions combine calculations with codec execution: decode once,
//! plan the ladder, then resize and encode every planned width.

use super::calculations::{VariantSize, plan_variant_sizes};
use super::codec::{CodecError, Dimensions, ImageCodec};
use super::params::VariantConfig;
use rayon::prelude::*;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// One encoded variant, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedVariant {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Everything produced from one original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub original: Dimensions,
    /// Ascending by width. Empty when the original is narrower than every
    /// ladder width.
    pub variants: Vec<RenderedVariant>,
}

/// Decode an original and report its dimensions.
pub fn probe_dimensions<C: ImageCodec>(codec: &C, bytes: &[u8]) -> Result<Dimensions> {
    let image = codec.decode(bytes)?;
    Ok(codec.dimensions(&image))
}

/// Render every applicable WebP variant of an original.
///
/// The decoded image is shared across rayon workers, one per planned width.
/// Any failing width fails the whole original.
pub fn render_variants<C: ImageCodec>(
    codec: &C,
    bytes: &[u8],
    config: &VariantConfig,
) -> Result<RenderOutcome> {
    let image = codec.decode(bytes)?;
    let original = codec.dimensions(&image);
    let sizes = plan_variant_sizes((original.width, original.height), &config.widths);

    let variants = sizes
        .par_iter()
        .map(|&VariantSize { width, height }| -> Result<RenderedVariant> {
            let resized = codec.resize(&image, width, height, config.filter)?;
            let bytes = codec.encode_webp(&resized, config.quality)?;
            Ok(RenderedVariant {
                width,
                height,
                bytes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RenderOutcome { original, variants })
}
