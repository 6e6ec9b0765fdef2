//! Pose catalogue

use serde::{Deserialize, Serialize};

use crate::asset::AssetRef;

/// Whether a pose redraws the character or edits it in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseKind {
    /// Redraw the character in the pose of the reference image
    #[default]
    Transfer,
    /// Free-form edit driven by instructions and apparel
    Edit,
}

/// A target pose or the special edit mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    pub id: String,
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub kind: PoseKind,
}

impl Pose {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image_url: impl Into<String>,
        kind: PoseKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: image_url.into(),
            kind,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.kind == PoseKind::Edit
    }

    pub fn reference(&self) -> AssetRef {
        AssetRef::uri(self.image_url.clone())
    }
}

const POSE_IMAGE_BASE: &str = "https://storage.googleapis.com/character-studio-assets/poses";

/// Built-in catalogue; the edit pose comes first so it is the initial selection
pub fn default_poses() -> Vec<Pose> {
    let pose = |id: &str, name: &str, kind| {
        Pose::new(id, name, format!("{}/{}.png", POSE_IMAGE_BASE, id), kind)
    };
    vec![
        pose("edit", "Edit Original", PoseKind::Edit),
        pose("standing", "Standing", PoseKind::Transfer),
        pose("sitting", "Sitting", PoseKind::Transfer),
        pose("walking", "Walking", PoseKind::Transfer),
        pose("running", "Running", PoseKind::Transfer),
        pose("jumping", "Jumping", PoseKind::Transfer),
        pose("arms-crossed", "Arms Crossed", PoseKind::Transfer),
    ]
}
