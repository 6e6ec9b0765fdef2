//! Generation request builder

use serde::Serialize;

use crate::asset::AssetRef;
use crate::backend::traits::{GeneratedImage, ImageGenerator};
use crate::error::{AppError, Result};
use crate::session::pose::Pose;
use crate::session::state::SessionState;

/// The external operation a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    PoseTransfer,
    Edit,
    CharacterFromText,
    BackgroundFromText,
    BackgroundFromStyle,
}

impl Operation {
    /// Main generation edits in place for the edit pose, otherwise transfers the pose
    pub fn for_main(pose: &Pose) -> Self {
        if pose.is_edit() {
            Operation::Edit
        } else {
            Operation::PoseTransfer
        }
    }

    /// Background generation follows the style image when one is set
    pub fn for_background(state: &SessionState) -> Self {
        if state.background_style().is_some() {
            Operation::BackgroundFromStyle
        } else {
            Operation::BackgroundFromText
        }
    }
}

/// Exactly the inputs one external operation needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    PoseTransfer {
        character: AssetRef,
        pose_reference: AssetRef,
        modifier: Option<String>,
        background: Option<AssetRef>,
        apparel: Option<AssetRef>,
    },
    Edit {
        character: AssetRef,
        instructions: Option<String>,
        apparel: Option<AssetRef>,
    },
    CharacterFromText {
        description: String,
    },
    BackgroundFromText {
        description: String,
    },
    BackgroundFromStyle {
        style: AssetRef,
        description: String,
    },
}

impl GenerationRequest {
    pub fn operation(&self) -> Operation {
        match self {
            GenerationRequest::PoseTransfer { .. } => Operation::PoseTransfer,
            GenerationRequest::Edit { .. } => Operation::Edit,
            GenerationRequest::CharacterFromText { .. } => Operation::CharacterFromText,
            GenerationRequest::BackgroundFromText { .. } => Operation::BackgroundFromText,
            GenerationRequest::BackgroundFromStyle { .. } => Operation::BackgroundFromStyle,
        }
    }

    /// Send this request to the generation service
    pub async fn execute(&self, generator: &dyn ImageGenerator) -> Result<GeneratedImage> {
        match self {
            GenerationRequest::PoseTransfer {
                character,
                pose_reference,
                modifier,
                background,
                apparel,
            } => {
                generator
                    .generate_pose_image(
                        character,
                        pose_reference,
                        modifier.as_deref(),
                        background.as_ref(),
                        apparel.as_ref(),
                    )
                    .await
            }
            GenerationRequest::Edit {
                character,
                instructions,
                apparel,
            } => {
                generator
                    .edit_image(character, instructions.as_deref(), apparel.as_ref())
                    .await
            }
            GenerationRequest::CharacterFromText { description } => {
                generator.generate_character_from_text(description).await
            }
            GenerationRequest::BackgroundFromText { description } => {
                generator.generate_background_from_text(description).await
            }
            GenerationRequest::BackgroundFromStyle { style, description } => {
                generator
                    .generate_background_from_image(style, description)
                    .await
            }
        }
    }
}

/// Trimmed text, or `None` when blank
fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Build the request for `operation` from the current session state
pub fn build(state: &SessionState, operation: Operation) -> Result<GenerationRequest> {
    match operation {
        Operation::PoseTransfer => {
            let pose = state.selected_pose();
            if pose.is_edit() {
                return Err(AppError::Validation(
                    "Please select a target pose to generate.".to_string(),
                ));
            }
            Ok(GenerationRequest::PoseTransfer {
                character: state.character().clone(),
                pose_reference: pose.reference(),
                modifier: non_blank(state.prompt()),
                background: state.background().cloned(),
                apparel: state.apparel().cloned(),
            })
        }
        Operation::Edit => {
            let instructions = non_blank(state.prompt());
            let apparel = state.apparel().cloned();
            if instructions.is_none() && apparel.is_none() {
                return Err(AppError::Validation(
                    "Please provide editing instructions or an apparel image when using 'Edit Original'."
                        .to_string(),
                ));
            }
            Ok(GenerationRequest::Edit {
                character: state.character().clone(),
                instructions,
                apparel,
            })
        }
        Operation::CharacterFromText => {
            let description = non_blank(state.character_prompt()).ok_or_else(|| {
                AppError::Validation("Please enter a description for your character.".to_string())
            })?;
            Ok(GenerationRequest::CharacterFromText { description })
        }
        Operation::BackgroundFromText => {
            let description = non_blank(state.background_prompt()).ok_or_else(|| {
                AppError::Validation("Please enter a description for the background.".to_string())
            })?;
            Ok(GenerationRequest::BackgroundFromText { description })
        }
        Operation::BackgroundFromStyle => {
            let style = state.background_style().cloned().ok_or_else(|| {
                AppError::Validation(
                    "Please upload a style image to generate a background from.".to_string(),
                )
            })?;
            let description = non_blank(state.background_prompt()).ok_or_else(|| {
                AppError::Validation(
                    "Please describe the background to generate in this style.".to_string(),
                )
            })?;
            Ok(GenerationRequest::BackgroundFromStyle { style, description })
        }
    }
}
