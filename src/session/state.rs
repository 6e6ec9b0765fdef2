//! Session state read by the presentation layer

use serde::Serialize;
use std::fmt;

use crate::asset::AssetRef;
use crate::orchestrator::builder::Operation;
use crate::session::pose::Pose;

/// One of the three independent generation operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Character,
    Background,
    Main,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Character, Slot::Background, Slot::Main];

    fn index(self) -> usize {
        match self {
            Slot::Character => 0,
            Slot::Background => 1,
            Slot::Main => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Character => "character",
            Slot::Background => "background",
            Slot::Main => "main",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the current background came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundOrigin {
    Uploaded,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Background {
    pub asset: AssetRef,
    pub origin: BackgroundOrigin,
}

/// Which image the full-screen viewer shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerTarget {
    Character,
    Background,
    BackgroundStyle,
    Apparel,
    Output,
}

/// Handed out when a slot starts; completions carry it back.
///
/// A completion whose epoch no longer matches its slot is stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub slot: Slot,
    pub epoch: u64,
    pub operation: Operation,
}

/// Per-slot flag/counter storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PerSlot<T>([T; 3]);

impl<T: Copy> PerSlot<T> {
    pub(crate) fn get(&self, slot: Slot) -> T {
        self.0[slot.index()]
    }

    pub(crate) fn set(&mut self, slot: Slot, value: T) {
        self.0[slot.index()] = value;
    }
}

/// Everything the presentation layer renders
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) character: AssetRef,
    pub(crate) background: Option<Background>,
    pub(crate) background_style: Option<AssetRef>,
    pub(crate) apparel: Option<AssetRef>,
    pub(crate) poses: Vec<Pose>,
    pub(crate) selected_pose: usize,
    pub(crate) prompt: String,
    pub(crate) background_prompt: String,
    pub(crate) character_prompt: String,
    pub(crate) output: Option<AssetRef>,
    pub(crate) error: Option<String>,
    pub(crate) viewer: Option<ViewerTarget>,
    pub(crate) busy: PerSlot<bool>,
    pub(crate) epochs: PerSlot<u64>,
}

impl SessionState {
    pub fn character(&self) -> &AssetRef {
        &self.character
    }

    pub fn background(&self) -> Option<&AssetRef> {
        self.background.as_ref().map(|b| &b.asset)
    }

    pub fn background_origin(&self) -> Option<BackgroundOrigin> {
        self.background.as_ref().map(|b| b.origin)
    }

    pub fn background_style(&self) -> Option<&AssetRef> {
        self.background_style.as_ref()
    }

    pub fn apparel(&self) -> Option<&AssetRef> {
        self.apparel.as_ref()
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn selected_pose(&self) -> &Pose {
        &self.poses[self.selected_pose]
    }

    /// Edit instructions, or the optional modifier for a pose transfer
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn background_prompt(&self) -> &str {
        &self.background_prompt
    }

    pub fn character_prompt(&self) -> &str {
        &self.character_prompt
    }

    pub fn output(&self) -> Option<&AssetRef> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_busy(&self, slot: Slot) -> bool {
        self.busy.get(slot)
    }

    /// True while any slot is generating
    pub fn any_busy(&self) -> bool {
        Slot::ALL.iter().any(|s| self.busy.get(*s))
    }

    pub fn viewer(&self) -> Option<ViewerTarget> {
        self.viewer
    }

    /// The asset shown by the full-screen viewer, if open
    pub fn viewer_asset(&self) -> Option<&AssetRef> {
        self.viewer.and_then(|t| self.asset_for(t))
    }

    pub fn asset_for(&self, target: ViewerTarget) -> Option<&AssetRef> {
        match target {
            ViewerTarget::Character => Some(&self.character),
            ViewerTarget::Background => self.background(),
            ViewerTarget::BackgroundStyle => self.background_style(),
            ViewerTarget::Apparel => self.apparel(),
            ViewerTarget::Output => self.output(),
        }
    }

    pub(crate) fn epoch(&self, slot: Slot) -> u64 {
        self.epochs.get(slot)
    }

    pub(crate) fn bump_epoch(&mut self, slot: Slot) {
        self.epochs.set(slot, self.epochs.get(slot) + 1);
    }

    /// A new character invalidates everything derived from the old one
    pub(crate) fn replace_character(&mut self, asset: AssetRef) {
        self.character = asset;
        self.background = None;
        self.background_style = None;
        self.apparel = None;
        self.output = None;
        self.bump_epoch(Slot::Background);
        self.bump_epoch(Slot::Main);
    }

    pub(crate) fn close_stale_viewer(&mut self) {
        if let Some(target) = self.viewer {
            if self.asset_for(target).is_none() {
                self.viewer = None;
            }
        }
    }
}
