/// Texture decoding
///
/// JPEG and PNG payloads are decoded to tightly packed RGBA8. Other
/// containers (KTX2 and unknown mime types) are recognised but not decoded:
/// they yield `None` and the caller substitutes a fallback texture.

use image::ImageFormat;
use crate::error::{Error, Result};
use crate::engine_warn;

const SOURCE: &str = "cluster3d::TextureDecode";

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major
    pub pixels: Vec<u8>,
}

impl TextureImage {
    /// Image filled with one RGBA colour
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat((width * height) as usize);
        Self { width, height, pixels }
    }

    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Image container tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageMime {
    Jpeg,
    Png,
    Ktx2,
    Other(String),
}

impl ImageMime {
    pub fn from_mime_type(mime_type: &str) -> Self {
        match mime_type {
            "image/jpeg" | "image/jpg" => ImageMime::Jpeg,
            "image/png" => ImageMime::Png,
            "image/ktx2" => ImageMime::Ktx2,
            other => ImageMime::Other(other.to_string()),
        }
    }

    /// Sniff the container from its magic bytes
    pub fn sniff(bytes: &[u8]) -> Self {
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        const JPEG: &[u8] = &[0xff, 0xd8, 0xff];
        const KTX2: &[u8] = &[0xab, b'K', b'T', b'X', b' ', b'2', b'0', 0xbb];
        if bytes.starts_with(PNG) {
            ImageMime::Png
        } else if bytes.starts_with(JPEG) {
            ImageMime::Jpeg
        } else if bytes.starts_with(KTX2) {
            ImageMime::Ktx2
        } else {
            ImageMime::Other("unknown".to_string())
        }
    }

    /// Guess from a file name extension
    pub fn from_extension(path: &str) -> Option<Self> {
        let extension = path.rsplit('.').next()?.to_ascii_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" => Some(ImageMime::Jpeg),
            "png" => Some(ImageMime::Png),
            "ktx2" => Some(ImageMime::Ktx2),
            _ => None,
        }
    }
}

/// Decode an image payload to RGBA8
///
/// # Returns
///
/// `Ok(None)` for containers without a decoder.
///
/// # Errors
///
/// `AssetError` when a JPEG/PNG payload is corrupt.
pub fn decode_texture(bytes: &[u8], mime: &ImageMime) -> Result<Option<TextureImage>> {
    let format = match mime {
        ImageMime::Jpeg => ImageFormat::Jpeg,
        ImageMime::Png => ImageFormat::Png,
        ImageMime::Ktx2 => {
            engine_warn!(SOURCE, "KTX2 textures are not decoded, using fallback");
            return Ok(None);
        }
        ImageMime::Other(name) => {
            engine_warn!(SOURCE, "unsupported image type '{}', using fallback", name);
            return Ok(None);
        }
    };

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::AssetError(format!("failed to decode {:?} image: {}", mime, e)))?;
    let rgba = decoded.to_rgba8();
    Ok(Some(TextureImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    }))
}

#[cfg(test)]
#[path = "texture_decode_tests.rs"]
mod tests;
