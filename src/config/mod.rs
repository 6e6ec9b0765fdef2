//! Configuration module

pub mod settings;

pub use settings::{GeminiConfig, LoggingConfig, SessionConfig, Settings, StorageConfig};
