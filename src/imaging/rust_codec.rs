//! Pure Rust codec on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` |
//! | Resize | `DynamicImage::resize_exact` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` |
//!
//! The `image` crate's WebP encoder is lossless only. [`Quality`] is accepted
//! for interface parity and has no effect on the output.

use super::codec::{CodecError, Dimensions, ImageCodec};
use super::params::{Quality, ResizeFilter};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder};

/// Codec backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

fn filter_type(filter: ResizeFilter) -> FilterType {
    match filter {
        ResizeFilter::Nearest => FilterType::Nearest,
        ResizeFilter::Triangle => FilterType::Triangle,
        ResizeFilter::CatmullRom => FilterType::CatmullRom,
        ResizeFilter::Lanczos3 => FilterType::Lanczos3,
    }
}

impl ImageCodec for RustCodec {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        let (width, height) = image.dimensions();
        Dimensions { width, height }
    }

    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        filter: ResizeFilter,
    ) -> Result<DynamicImage, CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::Resize(format!(
                "invalid target size {width}x{height}"
            )));
        }
        Ok(image.resize_exact(width, height, filter_type(filter)))
    }

    fn encode_webp(&self, image: &DynamicImage, _quality: Quality) -> Result<Vec<u8>, CodecError> {
        // The WebP encoder takes 8-bit RGB(A) only.
        let rgba = image.to_rgba8();
        let mut out = Vec::new();
        WebPEncoder::new_lossless(&mut out)
            .write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(out)
    }
}
