//! Asset metadata probing
//!
//! Images and scripts are checked with a HEAD request. Raster images that
//! answer 2xx additionally get a partial GET so their pixel dimensions can be
//! read from the file header.

use crate::crawler::fetcher::{FetchError, Fetcher, ResourceInfo};
use crate::storage::AssetMetadata;
use crate::url::AssetKind;
use url::Url;

/// Bytes requested when sniffing image dimensions
pub const DIMENSION_SNIFF_BYTES: usize = 32 * 1024;

/// Collects response metadata for assets
#[derive(Debug, Clone)]
pub struct AssetProber {
    fetcher: Fetcher,
}

impl AssetProber {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Probes an asset, never failing
    ///
    /// Transport errors are logged and leave the status unset.
    pub async fn probe(&self, url: &Url, kind: AssetKind) -> AssetMetadata {
        match self.try_probe(url, kind).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Asset probe failed");
                AssetMetadata::default()
            }
        }
    }

    async fn try_probe(&self, url: &Url, kind: AssetKind) -> Result<AssetMetadata, FetchError> {
        let head = self.fetcher.fetch_head(url).await?;

        // Some servers refuse HEAD; a one-byte range GET gives the same headers.
        let info = if matches!(head.status_code, 405 | 501) {
            self.fetcher.fetch_range(url, 1).await?.info
        } else {
            head
        };

        let mut metadata = metadata_from_info(&info);

        if kind == AssetKind::Image && is_sniffable_image(&info) {
            let partial = self.fetcher.fetch_range(url, DIMENSION_SNIFF_BYTES).await?;
            if let Some((width, height)) = image_dimensions(&partial.bytes) {
                metadata.width = Some(width);
                metadata.height = Some(height);
            }
            if metadata.file_size.is_none() {
                metadata.file_size = partial.info.content_length;
            }
        }

        Ok(metadata)
    }
}

fn metadata_from_info(info: &ResourceInfo) -> AssetMetadata {
    AssetMetadata {
        status_code: Some(info.status_code),
        content_type: info.content_type.clone(),
        file_size: info.content_length,
        redirect_count: info.redirect_count,
        width: None,
        height: None,
    }
}

/// Raster images with a successful status; SVG has no fixed pixel size
fn is_sniffable_image(info: &ResourceInfo) -> bool {
    if !(200..300).contains(&info.status_code) {
        return false;
    }

    match &info.content_type {
        Some(content_type) => {
            let content_type = content_type.to_ascii_lowercase();
            content_type.starts_with("image/") && !content_type.contains("svg")
        }
        None => false,
    }
}

/// Reads pixel dimensions from the start of a PNG, GIF, JPEG, BMP or WebP file
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        png_dimensions(bytes)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        gif_dimensions(bytes)
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        jpeg_dimensions(bytes)
    } else if bytes.starts_with(b"BM") {
        bmp_dimensions(bytes)
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        webp_dimensions(bytes)
    } else {
        None
    }
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]) as u32)
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]) as u32)
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u24(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 3)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // IHDR is always the first chunk.
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    Some((be_u32(bytes, 16)?, be_u32(bytes, 20)?))
}

fn gif_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    Some((le_u16(bytes, 6)?, le_u16(bytes, 8)?))
}

fn bmp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let b = bytes.get(18..26)?;
    let width = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    // Negative height marks a top-down bitmap.
    let height = i32::from_le_bytes([b[4], b[5], b[6], b[7]]);
    Some((width.unsigned_abs(), height.unsigned_abs()))
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;

    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }

        let marker = bytes[pos + 1];
        match marker {
            // Fill bytes
            0xFF => {
                pos += 1;
                continue;
            }
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            // Start of scan or end of image before any frame header
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = be_u16(bytes, pos + 2)? as usize;

        // SOFn frame headers, excluding DHT (C4), JPG (C8) and DAC (CC)
        if matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            let height = be_u16(bytes, pos + 5)?;
            let width = be_u16(bytes, pos + 7)?;
            return Some((width, height));
        }

        if length < 2 {
            return None;
        }
        pos += 2 + length;
    }

    None
}

fn webp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    match bytes.get(12..16)? {
        b"VP8 " => {
            // Lossy: frame tag, then start code 9D 01 2A, then 14-bit sizes.
            if bytes.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            Some((le_u16(bytes, 26)? & 0x3FFF, le_u16(bytes, 28)? & 0x3FFF))
        }
        b"VP8L" => {
            if *bytes.get(20)? != 0x2F {
                return None;
            }
            let b = bytes.get(21..25)?;
            let bits = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            Some(((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1))
        }
        b"VP8X" => Some((le_u24(bytes, 24)? + 1, le_u24(bytes, 27)? + 1)),
        _ => None,
    }
}
