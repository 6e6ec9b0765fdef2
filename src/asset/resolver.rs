//! Image source resolution: uploads in, submission payloads out

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::asset::file::FileHandler;
use crate::asset::{data_url, detect_mime, AssetRef, ImagePayload};
use crate::error::{AppError, Result};

/// Turns user-provided images into [`AssetRef`]s and back into payloads
#[derive(Clone)]
pub struct ImageSourceResolver {
    client: Client,
}

impl ImageSourceResolver {
    /// Create a resolver with its own HTTP client
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a resolver sharing an existing HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Resolve an uploaded file into an asset
    pub async fn resolve_file(&self, path: &Path) -> Result<AssetRef> {
        let payload = FileHandler::read_upload(path).await?;
        Ok(AssetRef::Binary(payload))
    }

    /// Resolve in-memory upload bytes into an asset
    pub fn resolve_bytes(&self, bytes: Vec<u8>, mime: Option<&str>) -> Result<AssetRef> {
        if bytes.is_empty() {
            return Err(AppError::Decode("Uploaded image is empty".to_string()));
        }
        let payload = match mime {
            Some(mime) => ImagePayload::new(mime, bytes),
            None => ImagePayload::sniffed(bytes),
        };
        Ok(AssetRef::Binary(payload))
    }

    /// Produce the binary payload for submitting an asset to a generation call
    pub async fn payload(&self, asset: &AssetRef) -> Result<ImagePayload> {
        match asset {
            AssetRef::Binary(payload) => Ok(payload.clone()),
            AssetRef::Uri(uri) if uri.starts_with("data:") => data_url::parse(uri),
            AssetRef::Uri(uri) if uri.starts_with("http://") || uri.starts_with("https://") => {
                self.fetch(uri).await
            }
            AssetRef::Uri(uri) => Err(AppError::Decode(format!(
                "Unsupported image URI scheme: {}",
                uri.split(':').next().unwrap_or_default()
            ))),
        }
    }

    async fn fetch(&self, url: &str) -> Result<ImagePayload> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Backend(format!(
                "Fetching {} returned {}",
                url,
                response.status()
            )));
        }

        let header_mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"));

        let bytes = response.bytes().await?.to_vec();
        let mime = header_mime
            .or_else(|| detect_mime(&bytes).map(String::from))
            .ok_or_else(|| AppError::Decode(format!("{} did not return an image", url)))?;

        debug!(url = %url, mime = %mime, bytes = bytes.len(), "Fetched remote image");
        Ok(ImagePayload::new(mime, bytes))
    }
}
