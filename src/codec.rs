//! Decoding of browser-captured image payloads.
//!
//! Browsers send `canvas.toDataURL()` output: `data:image/png;base64,<data>`.
//! Raw base64 without the data URI header is accepted as well.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::error::{Result, StoreError};

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Strip an optional `data:<mime>;base64,` header
fn strip_data_uri(input: &str) -> Result<&str> {
    let Some(rest) = input.strip_prefix("data:") else {
        return Ok(input);
    };
    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| StoreError::InvalidInput("data URI has no payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(StoreError::InvalidInput("data URI is not base64 encoded".to_string()));
    }
    Ok(body)
}

/// Decode one submitted image into raw bytes
pub fn decode_image(input: &str) -> Result<Vec<u8>> {
    let encoded = strip_data_uri(input.trim())?.trim();
    if encoded.is_empty() {
        return Err(StoreError::InvalidInput("empty image payload".to_string()));
    }

    let bytes = LENIENT_STANDARD
        .decode(encoded)
        .map_err(|e| StoreError::InvalidInput(format!("invalid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(StoreError::InvalidInput("empty image payload".to_string()));
    }
    Ok(bytes)
}
