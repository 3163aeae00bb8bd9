//! Frame payload decoding
//!
//! Frames arrive as base64 JPEG, usually wrapped in a data URI
//! (`data:image/jpeg;base64,...`). This is the only place that touches the
//! encoded image.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use image::RgbImage;

use crate::session::SessionError;

/// Drop a `data:<mime>;base64,` prefix if there is one
pub fn strip_data_uri(payload: &str) -> Result<&str, SessionError> {
    let payload = payload.trim();
    if !payload.starts_with("data:") {
        return Ok(payload);
    }
    payload
        .split_once(',')
        .map(|(_, body)| body)
        .ok_or_else(|| SessionError::Decode("data URI without payload".into()))
}

/// base64 → raw encoded bytes
pub fn decode_payload(payload: &str) -> Result<Bytes, SessionError> {
    let body = strip_data_uri(payload)?;
    if body.is_empty() {
        return Err(SessionError::Decode("empty frame".into()));
    }
    STANDARD
        .decode(body)
        .map(Bytes::from)
        .map_err(|e| SessionError::Decode(format!("invalid base64: {}", e)))
}

/// Encoded bytes → RGB pixels. CPU bound, call from a blocking context.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, SessionError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| SessionError::Decode(format!("invalid image: {}", e)))
}

/// Full frame decode: data URI → pixels
pub fn decode_frame(payload: &str) -> Result<RgbImage, SessionError> {
    let bytes = decode_payload(payload)?;
    decode_image(&bytes)
}
