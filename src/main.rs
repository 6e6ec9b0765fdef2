//! Command line front end for the character studio

use anyhow::Context;
use character_studio::{
    asset::{file::FileHandler, AssetRef, ImageSourceResolver},
    backend::GeminiBackend,
    config::Settings,
    orchestrator::Orchestrator,
    session::{Action, Completion, SessionStore, Slot},
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Generate consistent character art: new poses, edits, characters and backgrounds.
#[derive(Parser, Debug)]
#[command(name = "character-studio", version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config/default.toml", env = "CHARACTER_STUDIO_CONFIG")]
    config: PathBuf,

    /// Directory for generated images (overrides storage.download_dir)
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available poses
    Poses,
    /// Generate a character from a description
    Character {
        /// Character description
        prompt: String,
    },
    /// Redraw a character in one of the catalogue poses
    Pose(PoseArgs),
    /// Edit a character with instructions and/or apparel
    Edit(EditArgs),
    /// Generate a background from a description, optionally in the style of an image
    Background {
        /// Background description
        prompt: String,
        /// Style reference image
        #[arg(long)]
        style: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CharacterSource {
    /// Character image; the configured default character is used when omitted
    #[arg(long, conflicts_with = "character_prompt")]
    character: Option<PathBuf>,

    /// Generate the character from this description first
    #[arg(long)]
    character_prompt: Option<String>,

    /// Apparel image to dress the character in
    #[arg(long)]
    apparel: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PoseArgs {
    /// Pose id (see `poses`)
    pose: String,

    #[command(flatten)]
    source: CharacterSource,

    /// Extra instructions for the generation
    #[arg(long)]
    prompt: Option<String>,

    /// Background image to place the character in
    #[arg(long, conflicts_with_all = ["background_prompt", "background_style"])]
    background: Option<PathBuf>,

    /// Generate a background from this description first
    #[arg(long)]
    background_prompt: Option<String>,

    /// Style image for the generated background
    #[arg(long, requires = "background_prompt")]
    background_style: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EditArgs {
    #[command(flatten)]
    source: CharacterSource,

    /// Editing instructions
    #[arg(long)]
    instructions: Option<String>,
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    // Logs go to stderr so stdout carries only command output.
    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = Settings::load_from_path(&cli.config)?;
    if let Some(out) = &cli.out {
        settings.storage.download_dir = out.to_string_lossy().to_string();
    }
    settings.validate()?;
    init_logging(&settings);

    let poses = settings.pose_catalogue();
    if let Command::Poses = cli.command {
        for pose in &poses {
            let kind = if pose.is_edit() { "edit" } else { "pose" };
            println!("{:<14} {:<16} {}", pose.id, pose.name, kind);
        }
        return Ok(());
    }

    info!(model = %settings.gemini.model, "Starting character studio");

    let backend = GeminiBackend::new(&settings.gemini)?;
    let resolver = ImageSourceResolver::new(settings.gemini.timeout_ms)?;
    let files = FileHandler::new(&settings.storage.download_dir);
    let default_character = AssetRef::uri(settings.session.default_character.clone());
    let store = SessionStore::new(default_character, poses)?;
    let studio = Orchestrator::new(store, Arc::new(backend));

    let saved = execute(&studio, &resolver, &files, cli.command).await?;

    let stats = studio.stats();
    info!(applied = stats.applied, failed = stats.failed, "Finished");
    println!("{}", saved.display());
    Ok(())
}

/// Drive the session through one command and save what it produced
async fn execute(
    studio: &Orchestrator,
    resolver: &ImageSourceResolver,
    files: &FileHandler,
    command: Command,
) -> anyhow::Result<PathBuf> {
    let saved = match command {
        Command::Poses => anyhow::bail!("listing poses does not generate an image"),
        Command::Character { prompt } => {
            studio.dispatch(Action::SetCharacterPrompt(prompt))?;
            run(studio, Slot::Character).await?;
            let character = studio.with_state(|s| s.character().clone());
            save_asset(files, &character, "character").await?
        }
        Command::Background { prompt, style } => {
            if let Some(path) = style {
                let asset = upload(resolver, &path).await?;
                studio.dispatch(Action::UploadBackgroundStyle(asset))?;
            }
            studio.dispatch(Action::SetBackgroundPrompt(prompt))?;
            run(studio, Slot::Background).await?;
            let background = studio
                .with_state(|s| s.background().cloned())
                .context("no background was generated")?;
            save_asset(files, &background, "background").await?
        }
        Command::Pose(args) => {
            prepare_character(studio, resolver, &args.source).await?;
            studio.dispatch(Action::SelectPose(args.pose))?;
            if let Some(prompt) = args.prompt {
                studio.dispatch(Action::SetPrompt(prompt))?;
            }
            if let Some(path) = args.background {
                let asset = upload(resolver, &path).await?;
                studio.dispatch(Action::UploadBackground(asset))?;
            }
            if let Some(prompt) = args.background_prompt {
                if let Some(path) = args.background_style {
                    let asset = upload(resolver, &path).await?;
                    studio.dispatch(Action::UploadBackgroundStyle(asset))?;
                }
                studio.dispatch(Action::SetBackgroundPrompt(prompt))?;
                run(studio, Slot::Background).await?;
            }
            if studio.with_state(|s| s.selected_pose().is_edit()) {
                anyhow::bail!("use the `edit` command for free-form edits");
            }
            run(studio, Slot::Main).await?;
            studio.download_output(files).await?
        }
        Command::Edit(args) => {
            prepare_character(studio, resolver, &args.source).await?;
            let edit_pose = studio
                .with_state(|s| s.poses().iter().find(|p| p.is_edit()).map(|p| p.id.clone()))
                .context("pose catalogue has no edit pose")?;
            studio.dispatch(Action::SelectPose(edit_pose))?;
            if let Some(instructions) = args.instructions {
                studio.dispatch(Action::SetPrompt(instructions))?;
            }
            run(studio, Slot::Main).await?;
            studio.download_output(files).await?
        }
    };
    Ok(saved)
}

/// Set up the character, then apparel, so the character change does not clear it
async fn prepare_character(
    studio: &Orchestrator,
    resolver: &ImageSourceResolver,
    source: &CharacterSource,
) -> anyhow::Result<()> {
    if let Some(path) = &source.character {
        let asset = upload(resolver, path).await?;
        studio.dispatch(Action::UploadCharacter(asset))?;
    } else if let Some(prompt) = &source.character_prompt {
        studio.dispatch(Action::SetCharacterPrompt(prompt.clone()))?;
        run(studio, Slot::Character).await?;
    }

    if let Some(path) = &source.apparel {
        let asset = upload(resolver, path).await?;
        studio.dispatch(Action::UploadApparel(asset))?;
    }
    Ok(())
}

async fn upload(resolver: &ImageSourceResolver, path: &Path) -> anyhow::Result<AssetRef> {
    resolver
        .resolve_file(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn run(studio: &Orchestrator, slot: Slot) -> anyhow::Result<()> {
    match studio.generate(slot).await? {
        Completion::Applied(image) => {
            if let Some(text) = image.text {
                info!(slot = %slot, "Model says: {}", text);
            }
            Ok(())
        }
        other => {
            warn!(slot = %slot, completion = ?other, "Generation result was not applied");
            anyhow::bail!("{} generation did not produce a result", slot)
        }
    }
}

async fn save_asset(files: &FileHandler, asset: &AssetRef, stem: &str) -> anyhow::Result<PathBuf> {
    let payload = asset
        .to_local_payload()?
        .context("image is not held locally")?;
    Ok(files.save_payload(&payload, stem).await?)
}
