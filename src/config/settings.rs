//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::session::pose::{self, Pose};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub gemini: GeminiConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// Overrides the built-in pose catalogue when non-empty
    #[serde(default)]
    pub poses: Vec<Pose>,
}

/// Generation service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash-image-preview".to_string()
}

fn default_timeout() -> u64 {
    120000
}

impl GeminiConfig {
    /// The configured key, falling back to `GEMINI_API_KEY`
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_ms: default_timeout(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_character")]
    pub default_character: String,
}

fn default_character() -> String {
    "https://storage.googleapis.com/character-studio-assets/default-character.png".to_string()
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
}

fn default_download_dir() -> String {
    "./downloads".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .set_default("gemini.base_url", default_base_url())?
            .set_default("gemini.model", default_model())?
            .set_default("gemini.timeout_ms", default_timeout())?
            .set_default("session.default_character", default_character())?
            .set_default("storage.download_dir", default_download_dir())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with CHARACTER_STUDIO_)
            .add_source(
                Environment::with_prefix("CHARACTER_STUDIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.gemini.model.trim().is_empty() {
            return Err(invalid("Gemini model cannot be empty"));
        }
        if self.gemini.timeout_ms == 0 {
            return Err(invalid("Gemini timeout must be greater than 0"));
        }
        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(invalid(&format!(
                "Invalid log format '{}'. Must be 'json' or 'pretty'",
                self.logging.format
            )));
        }

        if !self.poses.is_empty() {
            let mut seen = HashSet::new();
            for pose in &self.poses {
                if !seen.insert(pose.id.as_str()) {
                    return Err(invalid(&format!("Duplicate pose id '{}'", pose.id)));
                }
            }
            if !self.poses.iter().any(Pose::is_edit) {
                return Err(invalid("Pose catalogue must contain an edit pose"));
            }
        }

        Ok(())
    }

    /// The configured pose catalogue, or the built-in one
    pub fn pose_catalogue(&self) -> Vec<Pose> {
        if self.poses.is_empty() {
            pose::default_poses()
        } else {
            self.poses.clone()
        }
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            session: SessionConfig {
                default_character: default_character(),
            },
            storage: StorageConfig {
                download_dir: default_download_dir(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            poses: vec![],
        }
    }
}
