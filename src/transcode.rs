//! Decode, bound-resize, re-encode.
//!
//! The resize policy bounds exactly one axis, preserves aspect ratio, and
//! never upscales. Encoding behavior per format lives in a policy table
//! rather than branches scattered through the engine — adding a format is a
//! table entry.
//!
//! | Format | Encoder behavior |
//! |---|---|
//! | JPEG | quality-driven, alpha flattened to RGB |
//! | PNG | best-compression (quality ignored; format is lossless) |
//! | WebP | lossless (the `image` crate ships no lossy WebP encoder) |
//! | GIF, TIFF, BMP, ICO | default encoder settings |
//! | JPEG 2000 | detected by the sniffer, but no pure-Rust codec: decode fails |

use std::io::{BufRead, Cursor, Seek};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;

use crate::sniff::{DetectedFormat, FormatCode};

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// The single bound a caller may request; the other axis follows the
/// original aspect ratio with floor rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeSpec {
    Width(u32),
    Height(u32),
}

impl ResizeSpec {
    /// Target dimensions for an original, or `None` when the bound meets or
    /// exceeds the original on its axis (no upscaling).
    pub fn target(&self, orig_w: u32, orig_h: u32) -> Option<(u32, u32)> {
        match *self {
            ResizeSpec::Width(w) if w < orig_w => {
                Some((w, (w as u64 * orig_h as u64 / orig_w as u64) as u32))
            }
            ResizeSpec::Height(h) if h < orig_h => {
                Some(((h as u64 * orig_w as u64 / orig_h as u64) as u32, h))
            }
            _ => None,
        }
    }
}

/// One row of the encode-policy table.
struct EncodePolicy {
    format: ImageFormat,
    /// Flatten alpha before encoding; JPEG rejects RGBA input outright.
    strip_alpha: bool,
}

/// Codec mapping per sniffed format. `None` means the format is recognized
/// by the sniffer but carries no codec in this engine (JPEG 2000).
fn encode_policy(code: FormatCode) -> Option<EncodePolicy> {
    let row = |format, strip_alpha| Some(EncodePolicy {
        format,
        strip_alpha,
    });
    match code {
        FormatCode::Png => row(ImageFormat::Png, false),
        FormatCode::Jpeg => row(ImageFormat::Jpeg, true),
        FormatCode::Gif => row(ImageFormat::Gif, false),
        FormatCode::Tiff => row(ImageFormat::Tiff, false),
        FormatCode::Bmp => row(ImageFormat::Bmp, false),
        FormatCode::WebP => row(ImageFormat::WebP, false),
        FormatCode::Ico => row(ImageFormat::Ico, false),
        FormatCode::Jpeg2000 => None,
    }
}

/// Decode → resize (when the bound is below the original) → re-encode.
///
/// `quality` is forwarded to the codec unmodified; values the codec cannot
/// accept surface as [`TransformError::Encode`]. All intermediate pixel
/// buffers are scoped to this call.
pub fn transcode<R: BufRead + Seek>(
    reader: R,
    format: &DetectedFormat,
    quality: i64,
    resize: ResizeSpec,
) -> Result<Vec<u8>, TransformError> {
    let policy = encode_policy(format.code).ok_or_else(|| {
        TransformError::Decode(format!("no codec for {}", format.content_type))
    })?;

    let img = ImageReader::with_format(reader, policy.format)
        .decode()
        .map_err(|e| TransformError::Decode(e.to_string()))?;

    let img = match resize.target(img.width(), img.height()) {
        Some((w, h)) => {
            tracing::debug!(width = w, height = h, "resizing image");
            img.resize_exact(w, h, FilterType::Lanczos3)
        }
        None => img,
    };

    encode(&img, &policy, quality)
}

fn encode(
    img: &DynamicImage,
    policy: &EncodePolicy,
    quality: i64,
) -> Result<Vec<u8>, TransformError> {
    let flattened;
    let img = if policy.strip_alpha && img.color().has_alpha() {
        flattened = DynamicImage::ImageRgb8(img.to_rgb8());
        &flattened
    } else {
        img
    };

    let mut out = Cursor::new(Vec::new());
    match policy.format {
        ImageFormat::Jpeg => {
            let q = u8::try_from(quality)
                .ok()
                .filter(|q| *q <= 100)
                .ok_or_else(|| {
                    TransformError::Encode(format!("quality {quality} outside JPEG range"))
                })?;
            img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, q))
        }
        ImageFormat::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            &mut out,
            CompressionType::Best,
            PngFilterType::Adaptive,
        )),
        other => img.write_to(&mut out, other),
    }
    .map_err(|e| TransformError::Encode(e.to_string()))?;

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::sniff;
    use image::RgbaImage;
    use std::io::Cursor;

    fn detected(code: FormatCode, content_type: &'static str) -> DetectedFormat {
        DetectedFormat { content_type, code }
    }

    /// Encode a synthetic gradient image to bytes in the given format.
    fn sample_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn width_bound_preserves_aspect_ratio() {
        assert_eq!(ResizeSpec::Width(100).target(300, 300), Some((100, 100)));
        assert_eq!(ResizeSpec::Width(150).target(300, 200), Some((150, 100)));
    }

    #[test]
    fn height_bound_preserves_aspect_ratio() {
        assert_eq!(ResizeSpec::Height(100).target(300, 300), Some((100, 100)));
        assert_eq!(ResizeSpec::Height(100).target(300, 200), Some((150, 100)));
    }

    #[test]
    fn computed_dimension_uses_floor() {
        // 100 * 200 / 300 = 66.67 → 66
        assert_eq!(ResizeSpec::Width(100).target(300, 200), Some((100, 66)));
        assert_eq!(ResizeSpec::Height(100).target(200, 300), Some((66, 100)));
    }

    #[test]
    fn bound_at_or_above_original_never_upscales() {
        assert_eq!(ResizeSpec::Width(400).target(300, 300), None);
        assert_eq!(ResizeSpec::Width(300).target(300, 300), None);
        assert_eq!(ResizeSpec::Height(500).target(300, 300), None);
    }

    #[test]
    fn resizes_png_to_requested_width() {
        let bytes = sample_image(300, 300, ImageFormat::Png);
        let out = transcode(
            Cursor::new(bytes),
            &detected(FormatCode::Png, "image/png"),
            80,
            ResizeSpec::Width(100),
        )
        .unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 100));
    }

    #[test]
    fn quality_100_roundtrip_keeps_target_dimensions() {
        let bytes = sample_image(300, 200, ImageFormat::Jpeg);
        let out = transcode(
            Cursor::new(bytes),
            &detected(FormatCode::Jpeg, "image/jpeg"),
            100,
            ResizeSpec::Height(100),
        )
        .unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 100));
    }

    #[test]
    fn oversized_bound_leaves_original_dimensions() {
        let bytes = sample_image(300, 300, ImageFormat::Png);
        let out = transcode(
            Cursor::new(bytes),
            &detected(FormatCode::Png, "image/png"),
            80,
            ResizeSpec::Width(400),
        )
        .unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
    }

    #[test]
    fn jpeg_alpha_input_is_flattened_not_rejected() {
        // Decoded PNGs commonly carry alpha; re-encoding as JPEG must not
        // fail on the color mode.
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            64,
            64,
            image::Rgba([200, 10, 10, 128]),
        ));
        let policy = encode_policy(FormatCode::Jpeg).unwrap();
        let out = encode(&img, &policy, 80).unwrap();
        assert_eq!(sniff(&mut Cursor::new(out)).unwrap().code, FormatCode::Jpeg);
    }

    #[test]
    fn out_of_range_quality_is_an_encode_error() {
        let bytes = sample_image(50, 50, ImageFormat::Jpeg);
        for q in [-1, 101, 9999] {
            let err = transcode(
                Cursor::new(bytes.clone()),
                &detected(FormatCode::Jpeg, "image/jpeg"),
                q,
                ResizeSpec::Width(25),
            )
            .unwrap_err();
            assert!(matches!(err, TransformError::Encode(_)), "quality {q}");
        }
    }

    #[test]
    fn jpeg2000_has_no_codec() {
        let err = transcode(
            Cursor::new(vec![0u8; 64]),
            &detected(FormatCode::Jpeg2000, "image/jpx"),
            80,
            ResizeSpec::Width(100),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
        assert!(err.to_string().contains("image/jpx"));
    }

    #[test]
    fn corrupt_data_is_a_decode_error() {
        // Valid PNG magic, garbage body: sniffing would pass, decoding must not.
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&[0xAB; 100]);
        let err = transcode(
            Cursor::new(bytes),
            &detected(FormatCode::Png, "image/png"),
            80,
            ResizeSpec::Width(100),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    #[test]
    fn reencodes_gif_and_bmp() {
        for (format, code) in [
            (ImageFormat::Gif, FormatCode::Gif),
            (ImageFormat::Bmp, FormatCode::Bmp),
        ] {
            let bytes = sample_image(120, 80, format);
            let out = transcode(
                Cursor::new(bytes),
                &detected(code, "image/test"),
                70,
                ResizeSpec::Width(60),
            )
            .unwrap();
            let decoded = image::load_from_memory(&out).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (60, 40), "{code:?}");
        }
    }
}
