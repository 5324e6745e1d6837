use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ImageFormat, RgbImage, RgbaImage};
use thiserror::Error;

pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Flip left ↔ right so the sent image matches what a self-viewer sees.
pub fn mirror_horizontal(frame: &mut RgbImage) {
    imageops::flip_horizontal_in_place(frame);
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(64 * 1024);
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    frame.write_with_encoder(encoder)?;
    Ok(buf)
}

/// JPEG-encode and wrap as `data:image/jpeg;base64,...`.
pub fn encode_jpeg_data_uri(frame: &RgbImage, quality: u8) -> Result<String, CodecError> {
    let jpeg = encode_jpeg(frame, quality)?;
    let mut uri = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    uri.push_str(JPEG_DATA_URI_PREFIX);
    STANDARD.encode_string(&jpeg, &mut uri);
    Ok(uri)
}

/// Decode a base64 JPEG, with or without the data-URI prefix.
pub fn decode_jpeg_base64(payload: &str) -> Result<RgbaImage, CodecError> {
    let b64 = payload.strip_prefix(JPEG_DATA_URI_PREFIX).unwrap_or(payload);
    let bytes = STANDARD.decode(b64.trim())?;
    let img = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)?;
    Ok(img.to_rgba8())
}

/// Decode and shrink to at most `max_width` pixels wide, keeping aspect.
pub fn decode_thumbnail(payload: &str, max_width: u32) -> Result<RgbaImage, CodecError> {
    let img = decode_jpeg_base64(payload)?;
    if img.width() <= max_width || img.width() == 0 {
        return Ok(img);
    }
    let height = ((img.height() as u64 * max_width as u64) / img.width() as u64).max(1) as u32;
    Ok(imageops::thumbnail(&img, max_width, height))
}
