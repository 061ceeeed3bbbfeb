//! The image codec capability.
//!
//! [`ImageCodec`] is the seam between variant planning and pixel work. It
//! covers the four things the optimizer needs from a codec: decode bytes,
//! report dimensions, resize, and encode to WebP. Decoded images are owned
//! values of the codec's associated [`Image`](ImageCodec::Image) type and are
//! released when dropped.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec). Tests use the recording
//! [`MockCodec`](tests::MockCodec), which understands a tiny text format so
//! fixtures can declare dimensions without real image files.

use super::params::{Quality, ResizeFilter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("resize failed: {0}")]
    Resize(String),
    #[error("WebP encode failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Decode/resize/encode capability.
///
/// Implementations must be `Sync`: [`render_variants`](super::render_variants)
/// resizes one decoded image into several widths in parallel.
pub trait ImageCodec: Send + Sync {
    type Image: Send + Sync;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, CodecError>;

    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Resize to exactly `width` × `height`.
    fn resize(
        &self,
        image: &Self::Image,
        width: u32,
        height: u32,
        filter: ResizeFilter,
    ) -> Result<Self::Image, CodecError>;

    fn encode_webp(&self, image: &Self::Image, quality: Quality) -> Result<Vec<u8>, CodecError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Bytes the mock codec decodes as a `width` × `height` image.
    pub fn fake_image(width: u32, height: u32) -> Vec<u8> {
        format!("FAKEIMG {width}x{height}").into_bytes()
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FakeImage {
        pub width: u32,
        pub height: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode {
            width: u32,
            height: u32,
        },
        Resize {
            from: (u32, u32),
            to: (u32, u32),
            filter: ResizeFilter,
        },
        EncodeWebp {
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    /// Codec that records operations and never touches pixels.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockCodec {
        pub operations: Mutex<Vec<RecordedOp>>,
        pub fail_encode: bool,
    }

    impl MockCodec {
        pub fn new() -> Self {
            Self::default()
        }

        /// A codec whose every encode fails.
        pub fn failing_encode() -> Self {
            Self {
                fail_encode: true,
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn decode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Decode { .. }))
                .count()
        }
    }

    fn parse_fake(bytes: &[u8]) -> Option<FakeImage> {
        let text = std::str::from_utf8(bytes).ok()?;
        let dims = text.strip_prefix("FAKEIMG ")?;
        let (w, h) = dims.trim().split_once('x')?;
        Some(FakeImage {
            width: w.parse().ok()?,
            height: h.parse().ok()?,
        })
    }

    impl ImageCodec for MockCodec {
        type Image = FakeImage;

        fn decode(&self, bytes: &[u8]) -> Result<FakeImage, CodecError> {
            let image = parse_fake(bytes)
                .ok_or_else(|| CodecError::Decode("not a FAKEIMG payload".to_string()))?;
            self.operations.lock().unwrap().push(RecordedOp::Decode {
                width: image.width,
                height: image.height,
            });
            Ok(image)
        }

        fn dimensions(&self, image: &FakeImage) -> Dimensions {
            Dimensions {
                width: image.width,
                height: image.height,
            }
        }

        fn resize(
            &self,
            image: &FakeImage,
            width: u32,
            height: u32,
            filter: ResizeFilter,
        ) -> Result<FakeImage, CodecError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                from: (image.width, image.height),
                to: (width, height),
                filter,
            });
            Ok(FakeImage { width, height })
        }

        fn encode_webp(&self, image: &FakeImage, quality: Quality) -> Result<Vec<u8>, CodecError> {
            if self.fail_encode {
                return Err(CodecError::Encode("mock encode failure".to_string()));
            }
            self.operations.lock().unwrap().push(RecordedOp::EncodeWebp {
                width: image.width,
                height: image.height,
                quality: quality.value(),
            });
            Ok(format!("FAKEWEBP {}x{}", image.width, image.height).into_bytes())
        }
    }

    #[test]
    fn mock_decodes_fake_payload() {
        let codec = MockCodec::new();
        let image = codec.decode(&fake_image(2000, 1500)).unwrap();
        assert_eq!(
            codec.dimensions(&image),
            Dimensions {
                width: 2000,
                height: 1500
            }
        );
        assert_eq!(codec.decode_count(), 1);
    }

    #[test]
    fn mock_rejects_other_bytes() {
        let codec = MockCodec::new();
        assert!(matches!(
            codec.decode(b"\xff\xd8 real jpeg"),
            Err(CodecError::Decode(_))
        ));
        assert!(codec.get_operations().is_empty());
    }

    #[test]
    fn mock_records_resize_and_encode() {
        let codec = MockCodec::new();
        let image = FakeImage {
            width: 1000,
            height: 500,
        };
        let small = codec
            .resize(&image, 800, 400, ResizeFilter::Lanczos3)
            .unwrap();
        let bytes = codec.encode_webp(&small, Quality::new(70)).unwrap();
        assert_eq!(bytes, b"FAKEWEBP 800x400");
        assert_eq!(
            codec.get_operations(),
            vec![
                RecordedOp::Resize {
                    from: (1000, 500),
                    to: (800, 400),
                    filter: ResizeFilter::Lanczos3
                },
                RecordedOp::EncodeWebp {
                    width: 800,
                    height: 400,
                    quality: 70
                },
            ]
        );
    }
}
