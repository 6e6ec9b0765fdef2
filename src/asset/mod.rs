//! Asset module - Image references, data URLs, file storage, and source resolution

pub mod data_url;
pub mod file;
pub mod resolver;

use std::fmt;

use crate::error::Result;

pub use resolver::ImageSourceResolver;

/// Raw image bytes together with their MIME type
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Build a payload from bytes, sniffing the MIME type from magic bytes
    pub fn sniffed(bytes: Vec<u8>) -> Self {
        let mime = detect_mime(&bytes).unwrap_or("image/png");
        Self::new(mime, bytes)
    }

    /// Displayable data URL for this payload
    pub fn to_data_url(&self) -> String {
        data_url::create_data_url(&self.bytes, &self.mime)
    }

    /// Base64 body without the data URL prefix
    pub fn to_base64(&self) -> String {
        data_url::encode(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Keep image bytes out of debug logs.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Canonical handle for an image
#[derive(Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// Bytes already held in memory, e.g. from a file upload
    Binary(ImagePayload),
    /// A `data:` URL produced by a generation, or a remote `http(s)` URL
    Uri(String),
}

impl AssetRef {
    pub fn binary(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        AssetRef::Binary(ImagePayload::new(mime, bytes))
    }

    pub fn uri(uri: impl Into<String>) -> Self {
        AssetRef::Uri(uri.into())
    }

    /// A URI the presentation layer can display directly
    pub fn preview_uri(&self) -> String {
        match self {
            AssetRef::Binary(payload) => payload.to_data_url(),
            AssetRef::Uri(uri) => uri.clone(),
        }
    }

    pub fn is_data_url(&self) -> bool {
        matches!(self, AssetRef::Uri(uri) if uri.starts_with("data:"))
    }

    /// Convert to a binary payload without touching the network.
    ///
    /// Returns `Ok(None)` for remote URLs, which need [`ImageSourceResolver`].
    pub fn to_local_payload(&self) -> Result<Option<ImagePayload>> {
        match self {
            AssetRef::Binary(payload) => Ok(Some(payload.clone())),
            AssetRef::Uri(uri) if uri.starts_with("data:") => data_url::parse(uri).map(Some),
            AssetRef::Uri(_) => Ok(None),
        }
    }
}

impl fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRef::Binary(payload) => f.debug_tuple("Binary").field(payload).finish(),
            AssetRef::Uri(uri) if uri.starts_with("data:") => {
                let head = uri.split(',').next().unwrap_or_default();
                write!(f, "Uri({},<{} chars>)", head, uri.len())
            }
            AssetRef::Uri(uri) => f.debug_tuple("Uri").field(uri).finish(),
        }
    }
}

impl From<ImagePayload> for AssetRef {
    fn from(payload: ImagePayload) -> Self {
        AssetRef::Binary(payload)
    }
}

/// Detect the image MIME type from binary data using magic bytes
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    if data.starts_with(b"BM") {
        return Some("image/bmp");
    }

    None
}

/// File extension for a MIME type
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

/// MIME type guessed from a file extension
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}
