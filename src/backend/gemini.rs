//! Gemini backend client implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::asset::{data_url, AssetRef, ImagePayload, ImageSourceResolver};
use crate::backend::traits::{GeneratedImage, ImageGenerator};
use crate::config::GeminiConfig;
use crate::error::{AppError, Result};

/// Image generation through the Gemini `generateContent` endpoint
pub struct GeminiBackend {
    client: Client,
    resolver: ImageSourceResolver,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerateRequest {
    contents: Vec<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: &'static str,
    parts: Vec<ApiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiRequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: ApiInlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerateResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "inline_data")]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ApiRequestPart {
    fn text(text: impl Into<String>) -> Self {
        ApiRequestPart::Text { text: text.into() }
    }

    fn image(payload: &ImagePayload) -> Self {
        ApiRequestPart::Inline {
            inline_data: ApiInlineData {
                mime_type: payload.mime.clone(),
                data: payload.to_base64(),
            },
        }
    }
}

impl GeminiBackend {
    /// Create a new Gemini backend from configuration
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| {
                AppError::Config(::config::ConfigError::Message(
                    "Gemini API key is not configured".to_string(),
                ))
            })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            resolver: ImageSourceResolver::with_client(client.clone()),
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Resolve the image inputs, send one request, and pull the image out of the reply
    async fn generate(
        &self,
        operation: &str,
        images: &[&AssetRef],
        prompt: String,
    ) -> Result<GeneratedImage> {
        let mut parts = Vec::with_capacity(images.len() + 1);
        for asset in images {
            let payload = self.resolver.payload(asset).await?;
            parts.push(ApiRequestPart::image(&payload));
        }
        parts.push(ApiRequestPart::text(prompt));

        let api_request = ApiGenerateRequest {
            contents: vec![ApiContent { role: "user", parts }],
            generation_config: ApiGenerationConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        };

        let url = self.endpoint();
        debug!(
            operation = %operation,
            model = %self.model,
            images = images.len(),
            "Sending generate request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Backend("The image service timed out".to_string())
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(operation = %operation, status = %status, "Image service returned an error");
            return Err(AppError::Backend(format!(
                "Image service returned {}: {}",
                status, message
            )));
        }

        let api_response = response
            .json::<ApiGenerateResponse>()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to parse response: {}", e)))?;

        extract_image(api_response)
    }
}

/// Take the first inline image from the response, keeping any text for context
fn extract_image(response: ApiGenerateResponse) -> Result<GeneratedImage> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AppError::Backend(format!(
            "The request was blocked: {}",
            reason
        )));
    }

    let mut texts = Vec::new();
    let mut finish_reason = None;

    for candidate in response.candidates {
        if finish_reason.is_none() {
            finish_reason = candidate.finish_reason;
        }
        let Some(content) = candidate.content else {
            continue;
        };
        for part in content.parts {
            if let Some(inline) = part.inline_data {
                if inline.mime_type.is_empty() {
                    return Err(AppError::Decode(
                        "Image in response has no MIME type".to_string(),
                    ));
                }
                let text = if texts.is_empty() {
                    None
                } else {
                    Some(texts.join("\n"))
                };
                let bytes = data_url::decode(&inline.data).map_err(|e| {
                    AppError::Backend(format!("Image in response is unreadable: {}", e))
                })?;
                if bytes.is_empty() {
                    return Err(AppError::Backend("Image in response is empty".to_string()));
                }
                let payload = ImagePayload::new(inline.mime_type, bytes);
                return Ok(GeneratedImage::from_payload(&payload, text));
            }
            if let Some(text) = part.text.filter(|t| !t.trim().is_empty()) {
                texts.push(text);
            }
        }
    }

    let detail = if !texts.is_empty() {
        texts.join(" ")
    } else if let Some(reason) = finish_reason {
        format!("finish reason {}", reason)
    } else {
        "empty response".to_string()
    };
    Err(AppError::Backend(format!(
        "The model did not return an image ({})",
        detail
    )))
}

fn pose_prompt(modifier: Option<&str>, has_background: bool, has_apparel: bool) -> String {
    let mut prompt = String::from(
        "The first image is a character. The second image shows a target pose. \
         Redraw the character from the first image in exactly the pose of the second image. \
         Keep the character's face, body proportions, hair, clothing and art style consistent.",
    );
    let mut next = 3;
    if has_background {
        prompt.push_str(&format!(
            " Place the character in the scene shown by image {}.",
            next
        ));
        next += 1;
    }
    if has_apparel {
        prompt.push_str(&format!(
            " Dress the character in the apparel shown by image {}.",
            next
        ));
    }
    if let Some(modifier) = modifier {
        prompt.push_str(" Additional instructions: ");
        prompt.push_str(modifier);
    }
    prompt
}

fn edit_prompt(instructions: Option<&str>, has_apparel: bool) -> String {
    let mut prompt = String::from(
        "Edit the character in the first image. Keep their identity and art style unchanged.",
    );
    if has_apparel {
        prompt.push_str(" Dress the character in the apparel shown by the second image.");
    }
    if let Some(instructions) = instructions {
        prompt.push_str(" Instructions: ");
        prompt.push_str(instructions);
    }
    prompt
}

#[async_trait]
impl ImageGenerator for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_pose_image(
        &self,
        character: &AssetRef,
        pose_reference: &AssetRef,
        modifier: Option<&str>,
        background: Option<&AssetRef>,
        apparel: Option<&AssetRef>,
    ) -> Result<GeneratedImage> {
        let mut images = vec![character, pose_reference];
        images.extend(background);
        images.extend(apparel);
        let prompt = pose_prompt(modifier, background.is_some(), apparel.is_some());
        self.generate("pose", &images, prompt).await
    }

    async fn edit_image(
        &self,
        character: &AssetRef,
        instructions: Option<&str>,
        apparel: Option<&AssetRef>,
    ) -> Result<GeneratedImage> {
        let mut images = vec![character];
        images.extend(apparel);
        let prompt = edit_prompt(instructions, apparel.is_some());
        self.generate("edit", &images, prompt).await
    }

    async fn generate_character_from_text(&self, description: &str) -> Result<GeneratedImage> {
        let prompt = format!(
            "Create a full-body character illustration on a plain neutral background, \
             standing in a neutral pose and facing the viewer. Character: {}",
            description
        );
        self.generate("character", &[], prompt).await
    }

    async fn generate_background_from_text(&self, description: &str) -> Result<GeneratedImage> {
        let prompt = format!(
            "Create a background scene with no people or characters in it. Scene: {}",
            description
        );
        self.generate("background", &[], prompt).await
    }

    async fn generate_background_from_image(
        &self,
        style: &AssetRef,
        description: &str,
    ) -> Result<GeneratedImage> {
        let prompt = format!(
            "Create a new background scene with no people in it, painted in the same visual \
             style, palette and lighting as the image provided. Scene: {}",
            description
        );
        self.generate("background_style", &[style], prompt).await
    }
}
