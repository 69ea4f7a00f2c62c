//! Byte-level image format detection.
//!
//! Transport-declared content types are advisory at best: objects uploaded
//! to storage frequently carry `application/octet-stream` or nothing at all,
//! and remote servers lie. The leading bytes of the retrieved buffer are the
//! authority, checked against the magic signatures of every format the
//! transform engine knows about.

use std::io::{Read, Seek, SeekFrom};
use thiserror::Error;

/// Bytes inspected from the front of the buffer. The longest signatures are
/// the 12-byte WebP RIFF header and the JPEG 2000 signature box.
pub const SNIFF_WINDOW: usize = 16;

#[derive(Error, Debug)]
#[error("unsupported image format")]
pub struct SniffError;

/// Short format code, named after the codec each format maps to.
///
/// Two codes are rewritten from their raw signature names for codec
/// compatibility: the JPEG 2000 family's raw `jpx` becomes `jpeg2000`, and
/// the icon format's raw `x-icon` becomes `ico`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatCode {
    Png,
    Jpeg,
    Jpeg2000,
    Gif,
    Tiff,
    Bmp,
    WebP,
    Ico,
}

impl FormatCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Jpeg2000 => "jpeg2000",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::WebP => "webp",
            Self::Ico => "ico",
        }
    }
}

/// Authoritative format derived from byte inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFormat {
    /// Canonical MIME type, returned to the caller as `Content-Type`.
    pub content_type: &'static str,
    /// Code the transform engine uses to pick decoder and encode policy.
    pub code: FormatCode,
}

/// Match the leading window against known signatures.
///
/// Returns `None` when nothing matches; the two-byte BMP signature is
/// checked last since it is the least specific.
fn match_signature(header: &[u8]) -> Option<DetectedFormat> {
    let detected = |content_type, code| Some(DetectedFormat { content_type, code });

    if header.starts_with(b"\x89PNG\r\n\x1a\n") {
        return detected("image/png", FormatCode::Png);
    }
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return detected("image/jpeg", FormatCode::Jpeg);
    }
    // JPEG 2000 signature box: 12 fixed bytes shared by jp2/jpx/j2k containers.
    if header.starts_with(&[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A])
    {
        return detected("image/jpx", FormatCode::Jpeg2000);
    }
    if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        return detected("image/gif", FormatCode::Gif);
    }
    if header.starts_with(b"II*\x00") || header.starts_with(b"MM\x00*") {
        return detected("image/tiff", FormatCode::Tiff);
    }
    if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP" {
        return detected("image/webp", FormatCode::WebP);
    }
    if header.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return detected("image/x-icon", FormatCode::Ico);
    }
    if header.starts_with(b"BM") {
        return detected("image/bmp", FormatCode::Bmp);
    }
    None
}

/// Determine the authoritative format of the buffered image.
///
/// Seeks to the start of the buffer itself; the position afterwards is
/// unspecified, so callers rewind before decoding.
pub fn sniff<R: Read + Seek>(buffer: &mut R) -> Result<DetectedFormat, SniffError> {
    buffer.seek(SeekFrom::Start(0)).map_err(|_| SniffError)?;

    let mut header = [0u8; SNIFF_WINDOW];
    let mut filled = 0;
    // Short reads are fine; a short file just yields a short window.
    while filled < header.len() {
        match buffer.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => return Err(SniffError),
        }
    }

    match_signature(&header[..filled]).ok_or(SniffError)
}
