//! File handling for uploaded and downloaded images

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::asset::{detect_mime, extension_for_mime, mime_for_extension, ImagePayload};
use crate::error::{AppError, Result};

/// Handler for reading uploads and writing downloaded results
pub struct FileHandler {
    download_dir: PathBuf,
}

impl FileHandler {
    /// Create a new file handler
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    /// Ensure the download directory exists
    pub async fn ensure_download_dir(&self) -> Result<()> {
        if !self.download_dir.exists() {
            fs::create_dir_all(&self.download_dir).await?;
            debug!(path = ?self.download_dir, "Created download directory");
        }
        Ok(())
    }

    /// Read an image file picked by the user
    pub async fn read_upload(path: &Path) -> Result<ImagePayload> {
        let bytes = fs::read(path).await?;
        if bytes.is_empty() {
            return Err(AppError::Decode(format!("{} is empty", path.display())));
        }

        let mime = detect_mime(&bytes)
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .and_then(mime_for_extension)
            })
            .ok_or_else(|| {
                AppError::Decode(format!("{} is not a recognised image", path.display()))
            })?;

        debug!(path = ?path, mime = %mime, bytes = bytes.len(), "Read uploaded image");
        Ok(ImagePayload::new(mime, bytes))
    }

    /// Save an image payload under a timestamped name and return its path
    pub async fn save_payload(&self, payload: &ImagePayload, stem: &str) -> Result<PathBuf> {
        self.ensure_download_dir().await?;

        let filename = format!(
            "{}-{}-{}.{}",
            stem,
            chrono::Utc::now().format("%Y%m%d-%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8],
            extension_for_mime(&payload.mime)
        );
        let file_path = self.download_dir.join(filename);

        fs::write(&file_path, &payload.bytes).await?;

        debug!(path = ?file_path, size = payload.len(), "Saved image file");

        Ok(file_path)
    }
}
