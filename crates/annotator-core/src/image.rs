//! Signature image decoding
//!
//! Signatures arrive as `data:image/png;base64,...` URIs from the signature
//! pad or an uploaded file. They are decoded into 8-bit RGB samples plus an
//! optional alpha plane, which is what a PDF image XObject and its soft mask
//! need.

use crate::error::AnnotatorError;
use base64::Engine;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Interleaved RGB, 3 bytes per pixel
    pub rgb: Vec<u8>,
    /// One byte per pixel when the source had transparency
    pub alpha: Option<Vec<u8>>,
}

/// Split a `data:` URI into its media type and base64 payload
fn split_data_uri(uri: &str) -> Result<(&str, &str), AnnotatorError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| AnnotatorError::ImageDecode("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AnnotatorError::ImageDecode("data URI has no payload".to_string()))?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| AnnotatorError::ImageDecode("data URI is not base64 encoded".to_string()))?;
    Ok((media_type, payload))
}

/// Decode a signature data URI into raw samples
pub fn decode_data_uri(uri: &str) -> Result<RasterImage, AnnotatorError> {
    let (media_type, payload) = split_data_uri(uri)?;
    if !media_type.eq_ignore_ascii_case("image/png") {
        return Err(AnnotatorError::ImageDecode(format!(
            "unsupported image type: {}",
            media_type
        )));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AnnotatorError::ImageDecode(format!("Invalid base64: {}", e)))?;

    decode_png(&bytes)
}

pub fn decode_png(bytes: &[u8]) -> Result<RasterImage, AnnotatorError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| AnnotatorError::ImageDecode(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| AnnotatorError::ImageDecode(e.to_string()))?;
    let samples = &buf[..frame.buffer_size()];
    let (color_type, _) = reader.output_color_type();

    let pixel_count = (frame.width as usize) * (frame.height as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::new();

    match color_type {
        png::ColorType::Rgb => rgb.extend_from_slice(samples),
        png::ColorType::Rgba => {
            alpha.reserve(pixel_count);
            for px in samples.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
        }
        png::ColorType::Grayscale => {
            for &g in samples {
                rgb.extend_from_slice(&[g, g, g]);
            }
        }
        png::ColorType::GrayscaleAlpha => {
            alpha.reserve(pixel_count);
            for px in samples.chunks_exact(2) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                alpha.push(px[1]);
            }
        }
        png::ColorType::Indexed => {
            return Err(AnnotatorError::ImageDecode(
                "indexed PNG was not expanded".to_string(),
            ))
        }
    }

    if rgb.len() != pixel_count * 3 {
        return Err(AnnotatorError::ImageDecode(format!(
            "truncated image data: expected {} bytes, got {}",
            pixel_count * 3,
            rgb.len()
        )));
    }

    Ok(RasterImage {
        width: frame.width,
        height: frame.height,
        rgb,
        alpha: if alpha.is_empty() { None } else { Some(alpha) },
    })
}

/// Encode RGBA pixels as a PNG data URI
pub fn encode_png_data_uri(width: u32, height: u32, rgba: &[u8]) -> Result<String, AnnotatorError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| AnnotatorError::ImageDecode(e.to_string()))?;
        writer
            .write_image_data(rgba)
            .map_err(|e| AnnotatorError::ImageDecode(e.to_string()))?;
    }
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(out)
    ))
}
