//! Variant rendering.
//!
//! | Operation | Where |
//! |---|---|
//! | **Plan widths** | [`plan_variant_sizes`]: ladder filtered by the no-upscale rule |
//! | **Decode / resize / encode** | [`ImageCodec`] trait, [`RustCodec`] on the `image` crate |
//! | **Render one original** | [`render_variants`]: decode once, rayon over widths |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Quality, resize filter, per-run variant config
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Operations**: High-level functions combining calculations + codec

mod calculations;
pub mod codec;
pub mod operations;
mod params;
pub mod rust_codec;

pub use calculations::{VariantSize, plan_variant_sizes, representative_width, scaled_height};
pub use codec::{CodecError, Dimensions, ImageCodec};
pub use operations::{RenderOutcome, RenderedVariant, probe_dimensions, render_variants};
pub use params::{Quality, ResizeFilter, VariantConfig};
pub use rust_codec::RustCodec;
