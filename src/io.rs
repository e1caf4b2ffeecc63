// ============================================================================
// IMAGE DATA - encoded image values, data-URI helpers and export encoding
// ============================================================================
//
// Every image that crosses the editor boundary (uploads, model results, masks,
// history snapshots) is an `EncodedImage`: a base64 payload kept in prefixed
// data-URI form so it can be handed straight to a renderer. Pixels are only
// decoded when something actually needs them (mask import, download export).

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, GrayImage, ImageError, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use crate::components::tools::{DownloadFormat, DownloadOptions};

/// MIME type assumed for bare base64 payloads.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// Errors raised while parsing, decoding or encoding image data.
#[derive(Debug, thiserror::Error)]
pub enum ImageDataError {
    #[error("image data is empty")]
    Empty,
    #[error("malformed data URI header")]
    InvalidDataUri,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("image codec error: {0}")]
    Codec(#[from] ImageError),
    #[error("no image to export")]
    NoImage,
}

// ============================================================================
// ENCODED IMAGE
// ============================================================================

/// An immutable, cheaply clonable encoded image.
///
/// Stored as `data:<mime>;base64,<payload>`. Clones share the same buffer.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EncodedImage {
    data_uri: Arc<str>,
    payload_start: usize,
}

impl EncodedImage {
    /// Parse a prefixed data URI or a bare base64 payload.
    pub fn parse(input: &str) -> Result<Self, ImageDataError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ImageDataError::Empty);
        }

        let (mime, payload) = if input.starts_with(DATA_PREFIX) {
            let (header, payload) = input.split_once(',').ok_or(ImageDataError::InvalidDataUri)?;
            if !header.ends_with(BASE64_MARKER) {
                return Err(ImageDataError::InvalidDataUri);
            }
            let mime = detect_mime_type(input).ok_or(ImageDataError::InvalidDataUri)?;
            (mime, payload)
        } else {
            (DEFAULT_MIME_TYPE, strip_data_uri(input))
        };

        if payload.is_empty() {
            return Err(ImageDataError::Empty);
        }
        if !is_base64_alphabet(payload) {
            return Err(ImageDataError::InvalidBase64);
        }

        Ok(Self::from_parts(mime, payload))
    }

    /// Wrap raw encoded file bytes (PNG, JPEG, ...) with the given MIME type.
    pub fn from_bytes(bytes: &[u8], mime: &str) -> Self {
        Self::from_parts(mime, &BASE64.encode(bytes))
    }

    /// Encode an RGBA raster as PNG.
    pub fn from_rgba(image: &RgbaImage) -> Result<Self, ImageDataError> {
        Ok(Self::from_bytes(&encode_png(image)?, DEFAULT_MIME_TYPE))
    }

    /// Encode a single-channel raster as an opaque grayscale RGBA PNG.
    pub fn from_gray(mask: &GrayImage) -> Result<Self, ImageDataError> {
        let rgba = DynamicImage::ImageLuma8(mask.clone()).to_rgba8();
        Self::from_rgba(&rgba)
    }

    fn from_parts(mime: &str, payload: &str) -> Self {
        let data_uri = to_data_uri(payload, mime);
        let payload_start = data_uri.len() - payload.len();
        Self { data_uri: Arc::from(data_uri), payload_start }
    }

    /// The prefixed form, suitable for direct rendering.
    pub fn as_data_uri(&self) -> &str {
        &self.data_uri
    }

    /// The bare base64 payload.
    pub fn payload(&self) -> &str {
        &self.data_uri[self.payload_start..]
    }

    pub fn mime_type(&self) -> &str {
        let header = &self.data_uri[DATA_PREFIX.len()..self.payload_start - 1];
        header.strip_suffix(BASE64_MARKER).unwrap_or(header)
    }

    /// Bytes held by this value (used for history memory accounting).
    pub fn memory_size(&self) -> usize {
        self.data_uri.len()
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, ImageDataError> {
        BASE64
            .decode(self.payload())
            .map_err(|_| ImageDataError::InvalidBase64)
    }

    pub fn decode_rgba(&self) -> Result<RgbaImage, ImageDataError> {
        let bytes = self.decode_bytes()?;
        Ok(image::load_from_memory(&bytes)?.into_rgba8())
    }

    /// Pixel dimensions read from the image header without a full decode.
    pub fn dimensions(&self) -> Result<(u32, u32), ImageDataError> {
        let bytes = self.decode_bytes()?;
        let reader = image::io::Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(ImageError::IoError)?;
        Ok(reader.into_dimensions()?)
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime_type())
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

impl From<EncodedImage> for String {
    fn from(image: EncodedImage) -> Self {
        image.data_uri.to_string()
    }
}

impl TryFrom<String> for EncodedImage {
    type Error = ImageDataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

// ============================================================================
// DATA-URI HELPERS
// ============================================================================

/// Return the base64 payload of a data URI, or the input unchanged when bare.
pub fn strip_data_uri(data: &str) -> &str {
    data.split_once(',').map_or(data, |(_, payload)| payload)
}

/// Prefix a bare base64 payload with a data-URI header.
pub fn to_data_uri(base64: &str, mime_type: &str) -> String {
    if base64.starts_with(DATA_PREFIX) {
        return base64.to_string();
    }
    format!("{DATA_PREFIX}{mime_type}{BASE64_MARKER},{base64}")
}

/// Extract `image/<subtype>` from a `data:image/<subtype>;base64,` header.
pub fn detect_mime_type(data_uri: &str) -> Option<&str> {
    let rest = data_uri.strip_prefix(DATA_PREFIX)?;
    let (mime, _) = rest.split_once(";base64,")?;
    let subtype = mime.strip_prefix("image/")?;
    let valid = !subtype.is_empty() && subtype.bytes().all(|b| b.is_ascii_lowercase() || b == b'+');
    valid.then_some(mime)
}

/// HEIC/HEIF containers carry `ftyp` at byte offset 4.
pub fn is_heic_base64(data: &str) -> bool {
    let raw = strip_data_uri(data).as_bytes();
    let head = &raw[..raw.len().min(20) / 4 * 4];
    BASE64
        .decode(head)
        .is_ok_and(|bytes| bytes.get(4..8) == Some(b"ftyp".as_slice()))
}

/// Base64 alphabet with at most two trailing `=` pads.
pub fn is_base64_alphabet(payload: &str) -> bool {
    let body = payload.trim_end_matches('=');
    payload.len() - body.len() <= 2
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// MIME type for an upload file extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

// ============================================================================
// ENCODING & DOWNLOAD EXPORT
// ============================================================================

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageDataError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    #[allow(deprecated)]
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf)
}

/// JPEG has no alpha channel; transparent pixels keep their stored RGB.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ImageDataError> {
    let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode(
        rgb_image.as_raw(),
        rgb_image.width(),
        rgb_image.height(),
        image::ColorType::Rgb8,
    )?;
    Ok(buf)
}

/// A finished download: encoded file bytes plus the suggested file name.
#[derive(Debug, Clone)]
pub struct DownloadArtifact {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Render `image` at `(width, height) * options.scale` in the chosen format.
///
/// A zero `width`/`height` falls back to the decoded image size.
pub fn export_download(
    image: &EncodedImage,
    width: u32,
    height: u32,
    options: &DownloadOptions,
) -> Result<DownloadArtifact, ImageDataError> {
    let decoded = image.decode_rgba()?;
    let base_w = if width == 0 { decoded.width() } else { width };
    let base_h = if height == 0 { decoded.height() } else { height };
    let target_w = ((base_w as f32 * options.scale).round() as u32).max(1);
    let target_h = ((base_h as f32 * options.scale).round() as u32).max(1);

    let rendered = if decoded.dimensions() == (target_w, target_h) {
        decoded
    } else {
        image::imageops::resize(
            &decoded,
            target_w,
            target_h,
            image::imageops::FilterType::Triangle,
        )
    };

    let bytes = match options.format {
        DownloadFormat::Png => encode_png(&rendered)?,
        DownloadFormat::Jpeg => encode_jpeg(&rendered, options.quality)?,
    };

    Ok(DownloadArtifact {
        file_name: options.format.file_name(),
        mime_type: options.format.mime_type(),
        bytes,
    })
}

#[cfg(test)]
#[path = "io_test.rs"]
mod tests;
