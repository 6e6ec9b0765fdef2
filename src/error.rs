//! Common error types for the character studio

use thiserror::Error;

use crate::session::Slot;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Raised locally before any external call is made
    #[error("{0}")]
    Validation(String),

    /// The generation service failed or returned something unusable
    #[error("Generation failed: {0}")]
    Backend(String),

    /// Malformed image data, usually a bad data URL
    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("The {0} generation is already running")]
    SlotBusy(Slot),

    #[error("Unknown pose: {0}")]
    UnknownPose(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error was raised before reaching the generation service
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::UnknownPose(_))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
