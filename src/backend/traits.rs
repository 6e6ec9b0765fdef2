//! Common traits and types for the generation service boundary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::asset::{data_url, AssetRef, ImagePayload};
use crate::error::Result;

/// Image returned by a generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Displayable `data:` URL
    pub data_url: String,

    /// Any text the model returned alongside the image
    pub text: Option<String>,
}

impl GeneratedImage {
    pub fn from_payload(payload: &ImagePayload, text: Option<String>) -> Self {
        Self {
            data_url: payload.to_data_url(),
            text,
        }
    }

    /// Decode back into bytes so the image can be saved or resubmitted
    pub fn payload(&self) -> Result<ImagePayload> {
        data_url::parse(&self.data_url)
    }

    pub fn into_asset(self) -> AssetRef {
        AssetRef::Uri(self.data_url)
    }
}

/// Trait for the external generative image service.
///
/// Every call is independent and safe to repeat at the caller's discretion.
/// Failures carry a message fit for showing to the user.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Get the service name
    fn name(&self) -> &str;

    /// Redraw the character in the pose shown by the reference image
    async fn generate_pose_image(
        &self,
        character: &AssetRef,
        pose_reference: &AssetRef,
        modifier: Option<&str>,
        background: Option<&AssetRef>,
        apparel: Option<&AssetRef>,
    ) -> Result<GeneratedImage>;

    /// Apply free-text instructions and/or apparel to the character
    async fn edit_image(
        &self,
        character: &AssetRef,
        instructions: Option<&str>,
        apparel: Option<&AssetRef>,
    ) -> Result<GeneratedImage>;

    async fn generate_character_from_text(&self, description: &str) -> Result<GeneratedImage>;

    async fn generate_background_from_text(&self, description: &str) -> Result<GeneratedImage>;

    /// Generate a background matching the style image
    async fn generate_background_from_image(
        &self,
        style: &AssetRef,
        description: &str,
    ) -> Result<GeneratedImage>;
}
