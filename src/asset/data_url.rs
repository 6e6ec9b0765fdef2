//! Data URL encoding and decoding

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::asset::ImagePayload;
use crate::error::{AppError, Result};

/// Encode binary data to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a bare base64 string to binary data
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::Decode(format!("Invalid base64 data: {}", e)))
}

/// Create a data URL from binary image data
pub fn create_data_url(data: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, encode(data))
}

/// Parse a `data:<mime>;base64,<body>` URL into a payload.
///
/// The MIME type is mandatory: a payload without one cannot be resubmitted.
pub fn parse(data_url: &str) -> Result<ImagePayload> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| AppError::Decode("Not a data URL".to_string()))?;

    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| AppError::Decode("Data URL has no payload".to_string()))?;

    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if mime.is_empty() {
        return Err(AppError::Decode(
            "Invalid data URL: missing MIME type".to_string(),
        ));
    }
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(AppError::Decode(format!(
            "Data URL for {} is not base64 encoded",
            mime
        )));
    }

    let bytes = decode(body)?;
    Ok(ImagePayload::new(mime, bytes))
}
