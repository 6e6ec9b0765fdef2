//! Functional tests for generation orchestration across the three slots

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

use character_studio::asset::{file::FileHandler, AssetRef};
use character_studio::backend::{GeneratedImage, ImageGenerator};
use character_studio::orchestrator::Orchestrator;
use character_studio::session::{pose, Action, BackgroundOrigin, Completion, SessionStore, Slot};
use character_studio::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Pose {
        pose_reference: String,
        modifier: Option<String>,
        background: bool,
        apparel: bool,
    },
    Edit {
        instructions: Option<String>,
        apparel: bool,
    },
    Character(String),
    BackgroundText(String),
    BackgroundStyle(String),
}

/// Records every call; optionally fails or waits for a release signal
#[derive(Default)]
struct RecordingGenerator {
    calls: Mutex<Vec<Call>>,
    failure: Option<String>,
    gate: Option<Arc<Notify>>,
}

impl RecordingGenerator {
    fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    async fn record(&self, call: Call) -> Result<GeneratedImage> {
        let tag = format!("{:?}", call).len();
        self.calls.lock().push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.failure {
            Some(message) => Err(AppError::Backend(message.clone())),
            None => Ok(GeneratedImage {
                data_url: format!("data:image/png;base64,{}", base64_of(tag)),
                text: None,
            }),
        }
    }
}

fn base64_of(n: usize) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(n.to_string())
}

#[async_trait]
impl ImageGenerator for RecordingGenerator {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate_pose_image(
        &self,
        _character: &AssetRef,
        pose_reference: &AssetRef,
        modifier: Option<&str>,
        background: Option<&AssetRef>,
        apparel: Option<&AssetRef>,
    ) -> Result<GeneratedImage> {
        self.record(Call::Pose {
            pose_reference: pose_reference.preview_uri(),
            modifier: modifier.map(String::from),
            background: background.is_some(),
            apparel: apparel.is_some(),
        })
        .await
    }

    async fn edit_image(
        &self,
        _character: &AssetRef,
        instructions: Option<&str>,
        apparel: Option<&AssetRef>,
    ) -> Result<GeneratedImage> {
        self.record(Call::Edit {
            instructions: instructions.map(String::from),
            apparel: apparel.is_some(),
        })
        .await
    }

    async fn generate_character_from_text(&self, description: &str) -> Result<GeneratedImage> {
        self.record(Call::Character(description.to_string())).await
    }

    async fn generate_background_from_text(&self, description: &str) -> Result<GeneratedImage> {
        self.record(Call::BackgroundText(description.to_string())).await
    }

    async fn generate_background_from_image(
        &self,
        _style: &AssetRef,
        description: &str,
    ) -> Result<GeneratedImage> {
        self.record(Call::BackgroundStyle(description.to_string())).await
    }
}

fn studio(generator: Arc<RecordingGenerator>) -> Orchestrator {
    let store = SessionStore::new(
        AssetRef::uri("https://example.com/default.png"),
        pose::default_poses(),
    )
    .unwrap();
    Orchestrator::new(store, generator)
}

fn upload(tag: &str) -> AssetRef {
    AssetRef::binary("image/png", tag.as_bytes().to_vec())
}

async fn wait_for_calls(generator: &RecordingGenerator, count: usize) {
    while generator.calls().len() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_pose_scenario_issues_single_call() {
    let generator = Arc::new(RecordingGenerator::default());
    let studio = studio(generator.clone());

    studio.dispatch(Action::UploadCharacter(upload("hero"))).unwrap();
    studio.dispatch(Action::SelectPose("standing".into())).unwrap();
    let completion = studio.generate_main().await.unwrap();

    assert!(matches!(completion, Completion::Applied(_)));
    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        Call::Pose {
            pose_reference,
            modifier,
            background,
            apparel,
        } => {
            assert!(pose_reference.ends_with("/standing.png"));
            assert!(modifier.is_none());
            assert!(!background);
            assert!(!apparel);
        }
        other => panic!("unexpected call {:?}", other),
    }

    let state = studio.state();
    assert!(state.output().is_some());
    assert!(!state.is_busy(Slot::Main));
    assert!(state.error().is_none());
}

#[tokio::test]
async fn test_edit_with_apparel_and_no_instructions_proceeds() {
    let generator = Arc::new(RecordingGenerator::default());
    let studio = studio(generator.clone());

    studio.dispatch(Action::SelectPose("edit".into())).unwrap();
    studio.dispatch(Action::UploadApparel(upload("jacket"))).unwrap();
    studio.generate_main().await.unwrap();

    assert_eq!(
        generator.calls(),
        vec![Call::Edit {
            instructions: None,
            apparel: true
        }]
    );
}

#[tokio::test]
async fn test_empty_edit_never_calls_backend() {
    let generator = Arc::new(RecordingGenerator::default());
    let studio = studio(generator.clone());

    studio.dispatch(Action::SelectPose("edit".into())).unwrap();
    let err = studio.generate_main().await.unwrap_err();

    assert!(err.is_validation());
    assert!(generator.calls().is_empty());
    let state = studio.state();
    assert!(!state.is_busy(Slot::Main));
    assert_eq!(state.error(), Some(err.to_string().as_str()));
}

#[tokio::test]
async fn test_style_background_without_description_is_rejected() {
    let generator = Arc::new(RecordingGenerator::default());
    let studio = studio(generator.clone());

    studio.dispatch(Action::UploadBackgroundStyle(upload("style"))).unwrap();
    assert!(studio.generate_background().await.is_err());

    assert!(generator.calls().is_empty());
    assert!(studio.state().error().unwrap().contains("describe the background"));
    assert!(!studio.state().is_busy(Slot::Background));
}

#[tokio::test]
async fn test_failure_is_surfaced_and_prior_state_kept() {
    let generator = Arc::new(RecordingGenerator::failing("quota exhausted"));
    let studio = studio(generator.clone());

    studio.dispatch(Action::UploadApparel(upload("hat"))).unwrap();
    studio.dispatch(Action::SetCharacterPrompt("a wizard".into())).unwrap();
    let err = studio.generate_character().await.unwrap_err();

    assert!(err.to_string().contains("quota exhausted"));
    let state = studio.state();
    assert!(state.error().unwrap().contains("quota exhausted"));
    assert!(!state.is_busy(Slot::Character));
    assert_eq!(state.character(), &AssetRef::uri("https://example.com/default.png"));
    assert!(state.apparel().is_some());
    assert_eq!(studio.stats().failed, 1);
}

#[tokio::test]
async fn test_next_run_clears_previous_error() {
    let generator = Arc::new(RecordingGenerator::default());
    let studio = studio(generator.clone());

    studio.dispatch(Action::SelectPose("edit".into())).unwrap();
    assert!(studio.generate_main().await.is_err());
    assert!(studio.state().error().is_some());

    studio.dispatch(Action::SetPrompt("add a red scarf".into())).unwrap();
    studio.generate_main().await.unwrap();
    assert!(studio.state().error().is_none());
}

#[tokio::test]
async fn test_generated_character_clears_background_and_apparel() {
    let generator = Arc::new(RecordingGenerator::default());
    let studio = studio(generator.clone());

    studio.dispatch(Action::UploadBackground(upload("beach"))).unwrap();
    studio.dispatch(Action::UploadApparel(upload("armor"))).unwrap();
    studio.dispatch(Action::SetCharacterPrompt("a robot chef".into())).unwrap();
    studio.generate_character().await.unwrap();

    let state = studio.state();
    assert!(state.character().is_data_url());
    assert!(state.background().is_none());
    assert!(state.apparel().is_none());
    assert_eq!(state.character_prompt(), "a robot chef");
}

#[tokio::test]
async fn test_background_upload_after_generated_background_clears_style() {
    let generator = Arc::new(RecordingGenerator::default());
    let studio = studio(generator.clone());

    studio.dispatch(Action::UploadBackgroundStyle(upload("watercolour"))).unwrap();
    studio.dispatch(Action::SetBackgroundPrompt("a mountain village".into())).unwrap();
    studio.generate_background().await.unwrap();
    assert_eq!(studio.state().background_origin(), Some(BackgroundOrigin::Generated));
    assert!(studio.state().background_style().is_some());

    studio.dispatch(Action::UploadBackground(upload("photo"))).unwrap();
    let state = studio.state();
    assert!(state.background_style().is_none());
    assert_eq!(state.background_origin(), Some(BackgroundOrigin::Uploaded));

    studio.dispatch(Action::UploadBackgroundStyle(upload("ink"))).unwrap();
    assert!(studio.state().background().is_none());

    assert_eq!(
        generator.calls(),
        vec![Call::BackgroundStyle("a mountain village".into())]
    );
}

#[tokio::test]
async fn test_busy_flag_held_during_call_and_cleared_after() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(RecordingGenerator::gated(gate.clone()));
    let studio = studio(generator.clone());

    studio.dispatch(Action::SetCharacterPrompt("a pirate".into())).unwrap();
    let handle = studio.spawn(Slot::Character);
    wait_for_calls(&generator, 1).await;

    assert!(studio.state().is_busy(Slot::Character));
    assert!(matches!(
        studio.generate_character().await,
        Err(AppError::SlotBusy(Slot::Character))
    ));

    gate.notify_one();
    handle.await.unwrap().unwrap();
    assert!(!studio.state().is_busy(Slot::Character));
    assert_eq!(generator.calls().len(), 1);
}

#[tokio::test]
async fn test_slots_run_concurrently() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(RecordingGenerator::gated(gate.clone()));
    let studio = studio(generator.clone());

    studio.dispatch(Action::SelectPose("jumping".into())).unwrap();
    studio.dispatch(Action::SetBackgroundPrompt("a neon alley".into())).unwrap();

    let main = studio.spawn(Slot::Main);
    let background = studio.spawn(Slot::Background);
    wait_for_calls(&generator, 2).await;

    let state = studio.state();
    assert!(state.is_busy(Slot::Main));
    assert!(state.is_busy(Slot::Background));
    assert!(!state.is_busy(Slot::Character));

    gate.notify_waiters();
    assert!(matches!(main.await.unwrap().unwrap(), Completion::Applied(_)));
    assert!(matches!(background.await.unwrap().unwrap(), Completion::Applied(_)));

    let state = studio.state();
    assert!(!state.any_busy());
    assert!(state.output().is_some());
    assert!(state.background().is_some());
}

#[tokio::test]
async fn test_character_upload_discards_in_flight_pose() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(RecordingGenerator::gated(gate.clone()));
    let studio = studio(generator.clone());

    studio.dispatch(Action::SelectPose("walking".into())).unwrap();
    let handle = studio.spawn(Slot::Main);
    wait_for_calls(&generator, 1).await;

    studio.dispatch(Action::UploadCharacter(upload("new hero"))).unwrap();
    gate.notify_one();

    assert_eq!(handle.await.unwrap().unwrap(), Completion::Stale);
    let state = studio.state();
    assert!(state.output().is_none());
    assert!(!state.is_busy(Slot::Main));
    assert_eq!(studio.stats().stale, 1);
}

#[tokio::test]
async fn test_aborted_call_releases_busy_flag() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(RecordingGenerator::gated(gate));
    let studio = studio(generator.clone());

    studio.dispatch(Action::SetBackgroundPrompt("a snowy forest".into())).unwrap();
    let handle = studio.spawn(Slot::Background);
    wait_for_calls(&generator, 1).await;
    assert!(studio.state().is_busy(Slot::Background));

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert!(!studio.state().is_busy(Slot::Background));
}

#[tokio::test]
async fn test_download_output() {
    let generator = Arc::new(RecordingGenerator::default());
    let studio = studio(generator);
    let dir = tempfile::tempdir().unwrap();
    let files = FileHandler::new(dir.path());

    assert!(studio.download_output(&files).await.is_err());
    assert!(studio.state().error().unwrap().contains("no generated image"));

    studio.dispatch(Action::SelectPose("sitting".into())).unwrap();
    studio.generate_main().await.unwrap();
    let path = studio.download_output(&files).await.unwrap();

    let expected = studio.state().output().unwrap().to_local_payload().unwrap().unwrap();
    assert_eq!(std::fs::read(path).unwrap(), expected.bytes);
}
