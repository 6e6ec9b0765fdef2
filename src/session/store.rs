//! Session store: the single place session state is changed

use tracing::{debug, info, warn};

use crate::asset::AssetRef;
use crate::backend::traits::GeneratedImage;
use crate::error::{AppError, Result};
use crate::orchestrator::builder::{self, GenerationRequest, Operation};
use crate::session::pose::Pose;
use crate::session::state::{
    Background, BackgroundOrigin, PerSlot, SessionState, Slot, Ticket, ViewerTarget,
};

/// User actions the presentation layer can trigger
#[derive(Debug, Clone)]
pub enum Action {
    UploadCharacter(AssetRef),
    SetCharacterPrompt(String),
    UploadBackground(AssetRef),
    UploadBackgroundStyle(AssetRef),
    UploadApparel(AssetRef),
    ClearBackground,
    ClearBackgroundStyle,
    ClearApparel,
    ClearOutput,
    SelectPose(String),
    SetPrompt(String),
    SetBackgroundPrompt(String),
    ViewFullScreen(ViewerTarget),
    CloseFullScreen,
    DismissError,
}

/// Work the store asks its owner to perform
#[derive(Debug, Clone)]
pub enum Effect {
    Call {
        ticket: Ticket,
        request: GenerationRequest,
    },
}

/// What happened to a finished call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Applied(GeneratedImage),
    /// The call failed; the message is in the error slot
    Failed,
    /// The slot was invalidated while the call ran; the result was dropped
    Stale,
}

/// Holds the session state; mutated only through actions and slot transitions
#[derive(Debug)]
pub struct SessionStore {
    state: SessionState,
}

impl SessionStore {
    /// Create a store with the given starting character and pose catalogue
    pub fn new(default_character: AssetRef, poses: Vec<Pose>) -> Result<Self> {
        if poses.is_empty() {
            return Err(AppError::Validation("Pose catalogue is empty".to_string()));
        }

        Ok(Self {
            state: SessionState {
                character: default_character,
                background: None,
                background_style: None,
                apparel: None,
                poses,
                selected_pose: 0,
                prompt: String::new(),
                background_prompt: String::new(),
                character_prompt: String::new(),
                output: None,
                error: None,
                viewer: None,
                busy: PerSlot::default(),
                epochs: PerSlot::default(),
            },
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply a user action
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        debug!(action = action_name(&action), "Dispatching action");
        let s = &mut self.state;

        match action {
            Action::UploadCharacter(asset) => {
                s.replace_character(asset);
                s.character_prompt.clear();
                // A pending character generation would overwrite the upload.
                s.bump_epoch(Slot::Character);
            }
            Action::SetCharacterPrompt(text) => s.character_prompt = text,
            Action::UploadBackground(asset) => {
                s.background = Some(Background {
                    asset,
                    origin: BackgroundOrigin::Uploaded,
                });
                s.background_style = None;
                s.bump_epoch(Slot::Background);
            }
            Action::UploadBackgroundStyle(asset) => {
                s.background_style = Some(asset);
                if s.background.as_ref().map(|b| b.origin) == Some(BackgroundOrigin::Uploaded) {
                    s.background = None;
                }
                s.bump_epoch(Slot::Background);
            }
            Action::UploadApparel(asset) => s.apparel = Some(asset),
            Action::ClearBackground => {
                s.background = None;
                s.bump_epoch(Slot::Background);
            }
            Action::ClearBackgroundStyle => s.background_style = None,
            Action::ClearApparel => s.apparel = None,
            Action::ClearOutput => s.output = None,
            Action::SelectPose(id) => {
                let index = s
                    .poses
                    .iter()
                    .position(|p| p.id == id)
                    .ok_or(AppError::UnknownPose(id))?;
                s.selected_pose = index;
            }
            Action::SetPrompt(text) => s.prompt = text,
            Action::SetBackgroundPrompt(text) => s.background_prompt = text,
            Action::ViewFullScreen(target) => {
                if s.asset_for(target).is_none() {
                    return Err(AppError::Validation("There is no image to show".to_string()));
                }
                s.viewer = Some(target);
            }
            Action::CloseFullScreen => s.viewer = None,
            Action::DismissError => s.error = None,
        }

        s.close_stale_viewer();
        Ok(())
    }

    /// Move a slot from Idle to Busy and hand back the call to make.
    ///
    /// Validation failures are recorded in the error slot and leave the slot idle.
    pub(crate) fn begin(&mut self, slot: Slot) -> Result<Effect> {
        if self.state.busy.get(slot) {
            return Err(AppError::SlotBusy(slot));
        }

        let operation = match slot {
            Slot::Character => Operation::CharacterFromText,
            Slot::Background => Operation::for_background(&self.state),
            Slot::Main => Operation::for_main(self.state.selected_pose()),
        };

        // The previous main result goes away even when the new request is rejected.
        if slot == Slot::Main {
            self.state.output = None;
            self.state.close_stale_viewer();
        }

        let request = match builder::build(&self.state, operation) {
            Ok(request) => request,
            Err(e) => {
                debug!(slot = %slot, error = %e, "Rejected generation request");
                self.state.error = Some(e.to_string());
                return Err(e);
            }
        };

        self.state.error = None;
        if slot == Slot::Character {
            self.state.output = None;
            self.state.close_stale_viewer();
        }
        self.state.busy.set(slot, true);

        let ticket = Ticket {
            slot,
            epoch: self.state.epoch(slot),
            operation,
        };
        info!(slot = %slot, epoch = ticket.epoch, operation = ?operation, "Generation started");

        Ok(Effect::Call { ticket, request })
    }

    /// Move a slot back to Idle and apply the result if it is still current
    pub(crate) fn finish(
        &mut self,
        ticket: Ticket,
        outcome: std::result::Result<GeneratedImage, String>,
    ) -> Completion {
        let slot = ticket.slot;
        self.state.busy.set(slot, false);

        if ticket.epoch != self.state.epoch(slot) {
            debug!(
                slot = %slot,
                epoch = ticket.epoch,
                current = self.state.epoch(slot),
                "Dropping stale completion"
            );
            return Completion::Stale;
        }

        let image = match outcome {
            Ok(image) => image,
            Err(message) => {
                warn!(slot = %slot, error = %message, "Generation failed");
                self.state.error = Some(message);
                return Completion::Failed;
            }
        };

        let asset = image.clone().into_asset();
        match slot {
            Slot::Character => self.state.replace_character(asset),
            Slot::Background => {
                if ticket.operation != Operation::BackgroundFromStyle {
                    self.state.background_style = None;
                }
                self.state.background = Some(Background {
                    asset,
                    origin: BackgroundOrigin::Generated,
                });
            }
            Slot::Main => self.state.output = Some(asset),
        }
        self.state.close_stale_viewer();

        info!(slot = %slot, "Generation applied");
        Completion::Applied(image)
    }

    /// Return a slot to Idle when its call never reported back
    pub(crate) fn abandon(&mut self, ticket: Ticket) {
        if self.state.busy.get(ticket.slot) {
            warn!(slot = %ticket.slot, "Generation abandoned before completing");
            self.state.busy.set(ticket.slot, false);
        }
    }

    /// Surface an error raised outside a generation call
    pub(crate) fn record_error(&mut self, message: String) {
        self.state.error = Some(message);
    }
}

fn action_name(action: &Action) -> &'static str {
    match action {
        Action::UploadCharacter(_) => "upload_character",
        Action::SetCharacterPrompt(_) => "set_character_prompt",
        Action::UploadBackground(_) => "upload_background",
        Action::UploadBackgroundStyle(_) => "upload_background_style",
        Action::UploadApparel(_) => "upload_apparel",
        Action::ClearBackground => "clear_background",
        Action::ClearBackgroundStyle => "clear_background_style",
        Action::ClearApparel => "clear_apparel",
        Action::ClearOutput => "clear_output",
        Action::SelectPose(_) => "select_pose",
        Action::SetPrompt(_) => "set_prompt",
        Action::SetBackgroundPrompt(_) => "set_background_prompt",
        Action::ViewFullScreen(_) => "view_full_screen",
        Action::CloseFullScreen => "close_full_screen",
        Action::DismissError => "dismiss_error",
    }
}
